//! End-to-end refresh: plan → search → dedupe → context → extract → normalize → publish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{Instrument, info, info_span};

use eventfeed_extraction::{ExtractionSettings, OpenRouterClient, StructuredModel, extract_events};
use eventfeed_search::{CollectOptions, SearchProvider, TavilyClient, collect, dedupe_hits};
use eventfeed_shared::{
    ApiKeys, AppConfig, EventCollection, EventFeedError, Result, RetryPolicy, RunId, SourceLabel,
};

use crate::context::assemble_context;
use crate::normalize::normalize;
use crate::planner::plan_queries;
use crate::publish::{PublishReport, publish};

/// Everything a run needs. Cheap to clone; safe to share across requests.
#[derive(Clone)]
pub struct PipelineDeps {
    pub config: Arc<AppConfig>,
    pub search: Arc<dyn SearchProvider>,
    pub model: Arc<dyn StructuredModel>,
}

impl PipelineDeps {
    /// Build the hosted search and language-model clients from config and keys.
    pub fn from_config(config: AppConfig, keys: &ApiKeys) -> Result<Self> {
        let search = TavilyClient::new(&keys.search, &config.search.base_url, config.search_timeout())?;
        let model = OpenRouterClient::new(&keys.llm, &config.llm.base_url, config.llm_timeout())?;

        Ok(Self {
            config: Arc::new(config),
            search: Arc::new(search),
            model: Arc::new(model),
        })
    }
}

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Hits returned across all sources, before deduplication.
    pub raw_hits: usize,
    pub unique_hits: usize,
    /// Sources whose search failed and contributed nothing.
    pub failed_sources: Vec<SourceLabel>,
    /// Events returned by the model.
    pub extracted: usize,
    /// Events left after normalization.
    pub events: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub elapsed: Duration,
    /// Set once the collection has been written.
    pub published: Option<PublishReport>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per source after the search fan-out.
    fn source_searched(&self, label: SourceLabel, hits: usize, failed: bool);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
    /// Called instead of `done` when the run fails.
    fn failed(&self, error: &EventFeedError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_searched(&self, _label: SourceLabel, _hits: usize, _failed: bool) {}
    fn done(&self, _report: &RunReport) {}
    fn failed(&self, _error: &EventFeedError) {}
}

/// Run every step up to (not including) publishing.
pub async fn collect_events(
    deps: &PipelineDeps,
    today: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<(EventCollection, RunReport)> {
    let run_id = RunId::new();
    let span = info_span!("collect_events", %run_id, %today);
    run(deps, today, run_id, progress)
        .instrument(span)
        .await
        .inspect(|(_, report)| progress.done(report))
        .inspect_err(|e| progress.failed(e))
}

/// Run the whole pipeline and publish to `config.output.path`.
///
/// The previous file is only replaced after every earlier step succeeded.
pub async fn refresh_events(
    deps: &PipelineDeps,
    today: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let run_id = RunId::new();
    let span = info_span!("refresh_events", %run_id, %today);

    async {
        let (collection, mut report) = run(deps, today, run_id, progress).await?;

        progress.phase("Publishing");
        let published = publish(&collection, &deps.config.output.path)?;
        info!(path = %published.path.display(), events = published.event_count, "refresh complete");
        report.published = Some(published);

        Ok::<_, EventFeedError>(report)
    }
    .instrument(span)
    .await
    .inspect(|report| progress.done(report))
    .inspect_err(|e| progress.failed(e))
}

async fn run(
    deps: &PipelineDeps,
    today: NaiveDate,
    run_id: RunId,
    progress: &dyn ProgressReporter,
) -> Result<(EventCollection, RunReport)> {
    let start = Instant::now();
    let config = deps.config.as_ref();
    let retry = RetryPolicy::from(&config.retry);

    // --- Phase 1: Plan ---
    progress.phase("Planning queries");
    let plan = plan_queries(today);
    info!(
        window_start = %plan.window_start,
        window_end = %plan.window_end,
        keywords = %plan.keywords,
        "query plan ready"
    );

    // --- Phase 2: Search ---
    progress.phase("Searching sources");
    let options = CollectOptions {
        max_results: config.search.max_results,
        timeout: config.search_timeout(),
        retry,
    };
    let outcome = collect(Arc::clone(&deps.search), &config.sources, &plan.keywords, &options).await;
    for source in &outcome.sources {
        progress.source_searched(source.label, source.hits, source.error.is_some());
    }
    let failed_sources: Vec<SourceLabel> = outcome
        .sources
        .iter()
        .filter(|s| s.error.is_some())
        .map(|s| s.label)
        .collect();
    if !config.sources.is_empty() && outcome.failed_sources() == config.sources.len() {
        return Err(EventFeedError::Search(format!(
            "all {} sources failed; keeping the previous events",
            config.sources.len()
        )));
    }

    // --- Phase 3: Dedupe + context ---
    let raw_hits = outcome.hits.len();
    let hits = dedupe_hits(outcome.hits);
    info!(raw_hits, unique_hits = hits.len(), "hits deduplicated");
    let context = assemble_context(&hits, config.pipeline.snippet_chars);

    // --- Phase 4: Extract ---
    progress.phase("Extracting events");
    let settings = ExtractionSettings {
        model: &config.llm.model,
        sources: &config.sources,
        retry,
    };
    let extraction = extract_events(deps.model.as_ref(), &settings, &plan, &context).await?;
    let extracted = extraction.events.len();

    // --- Phase 5: Normalize ---
    progress.phase("Normalizing events");
    let events = normalize(extraction.events, &plan, config.pipeline.enforce_window);
    info!(extracted, events = events.len(), "events normalized");

    let report = RunReport {
        run_id,
        window_start: plan.window_start,
        window_end: plan.window_end,
        raw_hits,
        unique_hits: hits.len(),
        failed_sources,
        extracted,
        events: events.len(),
        tokens_in: extraction.tokens_in,
        tokens_out: extraction.tokens_out,
        elapsed: start.elapsed(),
        published: None,
    };

    Ok((EventCollection::new(events), report))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use eventfeed_extraction::{StructuredCompletion, StructuredPrompt};
    use eventfeed_search::SearchOptions;
    use eventfeed_shared::RawHit;

    use super::*;

    /// Returns canned hits per domain; domains in `failing` error.
    struct FakeSearch {
        hits: Vec<(&'static str, RawHit)>,
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str, _options: &SearchOptions) -> Result<Vec<RawHit>> {
            let domain = query.trim_start_matches("site:").split_whitespace().next().unwrap_or_default();
            if self.failing.contains(&domain) {
                return Err(EventFeedError::Search(format!("{domain} unavailable")));
            }
            Ok(self
                .hits
                .iter()
                .filter(|(d, _)| *d == domain)
                .map(|(_, h)| h.clone())
                .collect())
        }
    }

    /// Rejects every query, like a search API with a revoked key.
    struct Unauthorized;

    #[async_trait]
    impl SearchProvider for Unauthorized {
        async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<Vec<RawHit>> {
            Err(EventFeedError::Search("HTTP 401: invalid API key".into()))
        }
    }

    /// Records which progress callbacks fired.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.events.lock().unwrap().push(format!("phase:{name}"));
        }
        fn source_searched(&self, label: SourceLabel, _hits: usize, failed: bool) {
            self.events.lock().unwrap().push(format!("source:{label}:{failed}"));
        }
        fn done(&self, _report: &RunReport) {
            self.events.lock().unwrap().push("done".into());
        }
        fn failed(&self, _error: &EventFeedError) {
            self.events.lock().unwrap().push("failed".into());
        }
    }

    /// Replies with a fixed result and records the user prompt.
    struct FakeModel {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StructuredModel for FakeModel {
        async fn complete_structured(&self, prompt: &StructuredPrompt) -> Result<StructuredCompletion> {
            self.seen.lock().unwrap().push(prompt.user.clone());
            match &self.reply {
                Ok(content) => Ok(StructuredCompletion {
                    content: content.clone(),
                    model: prompt.model.clone(),
                    tokens_in: 500,
                    tokens_out: 50,
                }),
                Err(message) => Err(EventFeedError::Extraction(message.clone())),
            }
        }
    }

    fn hit(link: &str, title: &str, snippet: &str) -> RawHit {
        RawHit {
            link: link.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn deps(search: impl SearchProvider + 'static, model: Arc<FakeModel>, output: &std::path::Path) -> PipelineDeps {
        let mut config = AppConfig::default();
        config.output.path = output.to_path_buf();
        PipelineDeps {
            config: Arc::new(config),
            search: Arc::new(search),
            model,
        }
    }

    /// Model output covering the tour, venue and dateless scenarios.
    const REPLY: &str = r#"{"events":[
        {"title": "Artist X 高雄場", "description": "Kaohsiung stop", "image": null, "category": "concert",
         "tags": [], "link": "https://tixcraft.com/x-khh", "source": "tixcraft",
         "sessions": [{"location": "Kaohsiung Arena", "date": ["2026-11-08"], "link": "https://tixcraft.com/x-khh"}]},
        {"title": "Artist X 台北站", "description": "Taipei stop", "image": null, "category": "concert",
         "tags": ["pop"], "link": "https://kktix.com/x-tpe", "source": "KKTIX",
         "sessions": [{"location": "Taipei Arena", "date": ["2026-11-02"], "link": "https://kktix.com/x-tpe"}]},
        {"title": "Jazz Night", "description": "", "image": null, "category": "concert",
         "tags": [], "link": "https://billboardlivetaipei.tw/jazz", "source": "BILLBOARD LIVE TAIPEI",
         "sessions": [{"location": "unknown", "date": ["2026-10-25"], "link": "https://billboardlivetaipei.tw/jazz"}]},
        {"title": "Mystery Expo", "description": "", "image": null, "category": "exhibition",
         "tags": [], "link": "https://accupass.com/mystery", "source": "Accupass",
         "sessions": [{"location": "unknown", "date": ["TBA"], "link": "https://accupass.com/mystery"}]}
    ]}"#;

    fn search() -> FakeSearch {
        FakeSearch {
            hits: vec![
                ("kktix.com", hit("https://kktix.com/x-tpe", "Artist X 台北站", "2026/11/02 Taipei Arena")),
                ("accupass.com", hit("https://accupass.com/mystery", "Mystery Expo", "Coming soon")),
                ("tixcraft.com", hit("https://tixcraft.com/x-khh", "Artist X 高雄場", "2026/11/08")),
                ("tixcraft.com", hit("https://kktix.com/x-tpe", "Artist X 台北站 (resale)", "late copy")),
                ("billboardlivetaipei.tw", hit("https://billboardlivetaipei.tw/jazz", "Jazz Night", "10/25")),
            ],
            failing: Vec::new(),
        }
    }

    #[tokio::test]
    async fn collect_applies_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(FakeModel::ok(REPLY));
        let deps = deps(search(), model.clone(), &dir.path().join("events.json"));

        let (collection, report) = collect_events(&deps, today(), &SilentProgress).await.unwrap();

        let titles: Vec<_> = collection.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Jazz Night", "Artist X"]);

        let jazz = &collection.events[0];
        assert_eq!(jazz.sessions[0].location, "BILLBOARD LIVE TAIPEI");

        let tour = &collection.events[1];
        assert_eq!(tour.sessions.len(), 2);
        assert_eq!(tour.source, SourceLabel::Tixcraft);

        assert_eq!(report.raw_hits, 5);
        assert_eq!(report.unique_hits, 4);
        assert_eq!(report.extracted, 4);
        assert_eq!(report.events, 2);
        assert_eq!(report.tokens_in, 500);
        assert!(report.failed_sources.is_empty());
        assert!(report.published.is_none());

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].contains("Title: Artist X 台北站 (resale)"));
        assert!(seen[0].contains("[#4]"));
        assert!(!seen[0].contains("[#5]"));
    }

    #[tokio::test]
    async fn refresh_publishes_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public").join("data").join("events.json");
        let deps = deps(search(), Arc::new(FakeModel::ok(REPLY)), &path);

        let report = refresh_events(&deps, today(), &SilentProgress).await.unwrap();

        let published = report.published.unwrap();
        assert_eq!(published.event_count, 2);
        let written: EventCollection = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.events.iter().all(|e| e.first_date().is_some()));
    }

    #[tokio::test]
    async fn failing_source_does_not_abort_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = search();
        search.failing = vec!["accupass.com"];
        let deps = deps(search, Arc::new(FakeModel::ok(REPLY)), &dir.path().join("events.json"));

        let (collection, report) = collect_events(&deps, today(), &SilentProgress).await.unwrap();
        assert_eq!(report.failed_sources, vec![SourceLabel::Accupass]);
        assert_eq!(collection.len(), 2);
    }

    #[tokio::test]
    async fn no_hits_publishes_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        let model = Arc::new(FakeModel::ok(REPLY));
        let search = FakeSearch {
            hits: Vec::new(),
            failing: Vec::new(),
        };
        let deps = deps(search, model.clone(), &path);

        let report = refresh_events(&deps, today(), &SilentProgress).await.unwrap();
        assert_eq!(report.events, 0);
        assert!(model.seen.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\n  \"events\": []\n}");
    }

    #[tokio::test]
    async fn extraction_failure_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "previous").unwrap();
        let deps = deps(search(), Arc::new(FakeModel::failing("HTTP 429 quota")), &path);

        let err = refresh_events(&deps, today(), &SilentProgress).await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
    }

    #[tokio::test]
    async fn all_sources_failing_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "previous").unwrap();
        let model = Arc::new(FakeModel::ok(REPLY));
        let deps = deps(Unauthorized, model.clone(), &path);

        let err = refresh_events(&deps, today(), &SilentProgress).await.unwrap_err();

        assert!(matches!(err, EventFeedError::Search(_)));
        assert!(!err.is_quota());
        assert!(model.seen.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
    }

    #[tokio::test]
    async fn progress_hears_about_failures() {
        let dir = tempfile::tempdir().unwrap();
        let deps = deps(search(), Arc::new(FakeModel::failing("model returned garbage")), &dir.path().join("events.json"));
        let progress = RecordingProgress::default();

        collect_events(&deps, today(), &progress).await.unwrap_err();

        let events = progress.events.lock().unwrap();
        assert_eq!(events.last().map(String::as_str), Some("failed"));
        assert!(!events.iter().any(|e| e == "done"));
    }

    #[tokio::test]
    async fn progress_hears_about_completion() {
        let dir = tempfile::tempdir().unwrap();
        let deps = deps(search(), Arc::new(FakeModel::ok(REPLY)), &dir.path().join("events.json"));
        let progress = RecordingProgress::default();

        refresh_events(&deps, today(), &progress).await.unwrap();

        let events = progress.events.lock().unwrap();
        assert_eq!(events.last().map(String::as_str), Some("done"));
        assert!(events.iter().any(|e| e == "phase:Publishing"));
        assert_eq!(events.iter().filter(|e| e.starts_with("source:")).count(), 4);
    }
}
