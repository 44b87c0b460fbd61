//! Core domain types for EventFeed: search hits, events, sessions.
//!
//! [`Event`] and friends double as the structured-output contract handed to
//! the language model, so they derive `JsonSchema` as well as serde traits.

use chrono::NaiveDate;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EventFeedError, Result};

/// Sentinel venue used when a hit names no venue.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Date formats accepted for session dates, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 identifier for one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Closed label sets
// ---------------------------------------------------------------------------

/// Event category. The set is closed; anything unmatched is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Concert,
    Exhibition,
    Performance,
    Festival,
    Other,
}

/// Label of the site an event was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SourceLabel {
    #[serde(rename = "KKTIX")]
    Kktix,
    #[serde(rename = "Accupass")]
    Accupass,
    #[serde(rename = "tixcraft")]
    Tixcraft,
    #[serde(rename = "BILLBOARD LIVE TAIPEI")]
    BillboardLiveTaipei,
    #[serde(rename = "other")]
    Other,
}

impl SourceLabel {
    /// The label exactly as it appears in the published JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kktix => "KKTIX",
            Self::Accupass => "Accupass",
            Self::Tixcraft => "tixcraft",
            Self::BillboardLiveTaipei => "BILLBOARD LIVE TAIPEI",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search depth requested from the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

// ---------------------------------------------------------------------------
// RawHit
// ---------------------------------------------------------------------------

/// One search result. `link` is the identity key across sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHit {
    pub link: String,
    pub title: String,
    pub snippet: String,
}

// ---------------------------------------------------------------------------
// SessionDates
// ---------------------------------------------------------------------------

/// One day (`[day]`) or an inclusive range (`[start, end]`).
///
/// Deserialization rejects any other length, so a value of this type always
/// holds one or two strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct SessionDates(Vec<String>);

impl SessionDates {
    /// A single-day session.
    pub fn single(day: impl Into<String>) -> Self {
        Self(vec![day.into()])
    }

    /// A multi-day session.
    pub fn range(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self(vec![start.into(), end.into()])
    }

    /// The leading date string.
    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// The trailing date string (same as [`first`](Self::first) for one day).
    pub fn last(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Parsed inclusive `(start, end)`, or `None` if either end is unparsable.
    pub fn parsed_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = parse_event_date(self.first())?;
        let end = parse_event_date(self.last())?;
        Some((start, end.max(start)))
    }
}

impl TryFrom<Vec<String>> for SessionDates {
    type Error = EventFeedError;

    fn try_from(dates: Vec<String>) -> Result<Self> {
        match dates.len() {
            1 | 2 => Ok(Self(dates)),
            n => Err(EventFeedError::validation(format!(
                "session date must hold 1 or 2 entries, got {n}"
            ))),
        }
    }
}

impl From<SessionDates> for Vec<String> {
    fn from(dates: SessionDates) -> Self {
        dates.0
    }
}

impl JsonSchema for SessionDates {
    fn schema_name() -> String {
        "SessionDates".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::Array.into()),
            ..Default::default()
        };
        let array = schema.array();
        array.items = Some(generator.subschema_for::<String>().into());
        array.min_items = Some(1);
        array.max_items = Some(2);
        Schema::Object(schema)
    }
}

/// Parse a session date string (`YYYY-MM-DD`, `YYYY/MM/DD` or `YYYY.MM.DD`).
///
/// A trailing time component (`2026-11-02T19:30`) is ignored.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let candidates = [Some(raw), raw.get(..10)];
    candidates.into_iter().flatten().find_map(|s| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    })
}

// ---------------------------------------------------------------------------
// QueryPlan
// ---------------------------------------------------------------------------

/// Search window and keyword set for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// First day of the window (inclusive).
    pub window_start: NaiveDate,
    /// Last day of the window (inclusive).
    pub window_end: NaiveDate,
    /// Disjunctive month keywords, e.g. `"2026 10月" OR "2026 11月" OR "2026 12月"`.
    pub keywords: String,
}

impl QueryPlan {
    /// Window start as `YYYY/MM/DD`.
    pub fn start_label(&self) -> String {
        self.window_start.format("%Y/%m/%d").to_string()
    }

    /// Window end as `YYYY/MM/DD`.
    pub fn end_label(&self) -> String {
        self.window_end.format("%Y/%m/%d").to_string()
    }

    /// Whether the inclusive range `[start, end]` overlaps the window.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.window_end && end >= self.window_start
    }
}

// ---------------------------------------------------------------------------
// Session / Event
// ---------------------------------------------------------------------------

/// One venue/date/ticket-link combination of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Session {
    /// Venue name, or [`UNKNOWN_LOCATION`].
    pub location: String,
    /// Single day or `[start, end]`, ISO dates.
    pub date: SessionDates,
    /// Ticket purchase link.
    pub link: String,
}

/// One semantically distinct happening, possibly spanning several venues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Canonical title without city or venue decorations.
    pub title: String,
    pub description: String,
    /// Poster or cover image URL.
    #[serde(default)]
    pub image: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Canonical event page.
    pub link: String,
    pub source: SourceLabel,
    #[schemars(length(min = 1))]
    pub sessions: Vec<Session>,
}

impl Event {
    /// Check invariants serde cannot express (non-empty title, at least one session).
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(EventFeedError::validation("event title is empty"));
        }
        if self.sessions.is_empty() {
            return Err(EventFeedError::validation(format!(
                "event '{}' has no sessions",
                self.title
            )));
        }
        Ok(())
    }

    /// Leading date of the first session, if parsable.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.sessions
            .first()
            .and_then(|s| parse_event_date(s.date.first()))
    }
}

/// The published artifact: `{ "events": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCollection {
    pub events: Vec<Event>,
}

impl EventCollection {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn category() -> impl Strategy<Value = Category> {
        prop::sample::select(vec![
            Category::Concert,
            Category::Exhibition,
            Category::Performance,
            Category::Festival,
            Category::Other,
        ])
    }

    fn source() -> impl Strategy<Value = SourceLabel> {
        prop::sample::select(vec![
            SourceLabel::Kktix,
            SourceLabel::Accupass,
            SourceLabel::Tixcraft,
            SourceLabel::BillboardLiveTaipei,
            SourceLabel::Other,
        ])
    }

    fn dates() -> impl Strategy<Value = SessionDates> {
        prop_oneof![
            "\\PC{0,12}".prop_map(SessionDates::single),
            ("\\PC{0,12}", "\\PC{0,12}").prop_map(|(start, end)| SessionDates::range(start, end)),
        ]
    }

    fn session() -> impl Strategy<Value = Session> {
        ("\\PC{0,20}", dates(), "https://[a-z]{1,10}\\.tw/[a-z0-9]{0,8}")
            .prop_map(|(location, date, link)| Session { location, date, link })
    }

    fn event() -> impl Strategy<Value = Event> {
        (
            "\\PC{1,24}",
            "\\PC{0,40}",
            prop::option::of("https://img\\.tw/[a-z]{1,8}\\.jpg"),
            category(),
            prop::collection::vec("[a-z]{1,6}", 0..4),
            "https://[a-z]{1,10}\\.tw/[a-z0-9]{0,8}",
            source(),
            prop::collection::vec(session(), 1..4),
        )
            .prop_map(|(title, description, image, category, tags, link, source, sessions)| Event {
                title,
                description,
                image,
                category,
                tags,
                link,
                source,
                sessions,
            })
    }

    proptest! {
        /// Whatever is published parses back to the same collection.
        #[test]
        fn collection_survives_publish_format(events in prop::collection::vec(event(), 0..6)) {
            let collection = EventCollection::new(events);
            let json = serde_json::to_string_pretty(&collection).unwrap();
            let parsed: EventCollection = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, collection);
        }
    }
}
