//! Local clean-up of extracted events before publishing.
//!
//! The model is asked to follow the same rules, but its output is not
//! trusted to: venue fallback, window filtering, tour consolidation and
//! date ordering are all enforced here.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use eventfeed_shared::{Event, QueryPlan, SourceLabel, UNKNOWN_LOCATION};

/// Trailing city stop decoration, e.g. ` 台北站`, `-高雄場`, `（臺中場）`.
static CITY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\s\-–|/]*[（(\[]?\s*(台北|臺北|新北|基隆|桃園|新竹|苗栗|台中|臺中|彰化|南投|雲林|嘉義|台南|臺南|高雄|屏東|宜蘭|花蓮|台東|臺東|澎湖|金門|馬祖)\s*(站|場)\s*[）)\]]?$",
    )
    .expect("valid regex")
});

/// Run every normalization step in order.
pub fn normalize(events: Vec<Event>, plan: &QueryPlan, enforce_window: bool) -> Vec<Event> {
    let mut events = events;
    apply_venue_fallback(&mut events);

    if enforce_window {
        let before = events.len();
        retain_in_window(&mut events, plan);
        debug!(dropped = before - events.len(), "window filter applied");
    }

    let before = events.len();
    let mut events = consolidate(events);
    debug!(merged = before - events.len(), "events consolidated");

    sort_events(&mut events);
    events
}

/// Give BILLBOARD LIVE TAIPEI sessions without a venue the club as venue.
pub fn apply_venue_fallback(events: &mut [Event]) {
    let venue = SourceLabel::BillboardLiveTaipei.as_str();
    for event in events
        .iter_mut()
        .filter(|e| e.source == SourceLabel::BillboardLiveTaipei)
    {
        for session in &mut event.sessions {
            let location = session.location.trim();
            if location.is_empty() || location.eq_ignore_ascii_case(UNKNOWN_LOCATION) {
                session.location = venue.to_string();
            }
        }
    }
}

/// Keep events with at least one session overlapping the window.
///
/// Sessions with unparsable dates never count, so an event with no usable
/// date is dropped.
pub fn retain_in_window(events: &mut Vec<Event>, plan: &QueryPlan) {
    events.retain(|event| {
        event.sessions.iter().any(|session| {
            session
                .date
                .parsed_range()
                .is_some_and(|(start, end)| plan.overlaps(start, end))
        })
    });
}

/// Strip trailing city stop decorations from a title.
pub fn canonical_title(title: &str) -> String {
    let mut current = title.trim();
    while let Some(m) = CITY_SUFFIX_RE.find(current) {
        let stripped = current[..m.start()].trim_end();
        if stripped.is_empty() {
            break;
        }
        current = stripped;
    }
    current.to_string()
}

/// Merge events sharing a canonical title.
///
/// The first occurrence keeps its fields and position; sessions of later
/// occurrences are appended unless an identical session is already present.
pub fn consolidate(events: Vec<Event>) -> Vec<Event> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(events.len());
    let mut merged: Vec<Event> = Vec::with_capacity(events.len());

    for mut event in events {
        let title = canonical_title(&event.title);
        match slots.get(&title) {
            Some(&slot) => {
                let target = &mut merged[slot];
                for session in event.sessions {
                    if !target.sessions.contains(&session) {
                        target.sessions.push(session);
                    }
                }
            }
            None => {
                slots.insert(title.clone(), merged.len());
                event.title = title;
                merged.push(event);
            }
        }
    }

    merged
}

/// Stable sort by the first session's leading date; unparsable dates go last.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|event| {
        let date = event.first_date();
        (date.is_none(), date)
    });
}
