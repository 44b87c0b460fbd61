//! Instruction and user messages for event extraction.

use std::fmt::Write;

use eventfeed_shared::{QueryPlan, SourceConfig, SourceLabel, UNKNOWN_LOCATION};

/// Keyword to category mapping, in priority order.
const CATEGORY_RULES: [(&str, &str); 4] = [
    ("演唱會, Live, 巡演, 音樂會", "concert"),
    ("展, 特展, 展覽, 博覽會", "exhibition"),
    ("音樂劇, 舞台劇, 戲劇, 舞蹈, 脫口秀", "performance"),
    ("音樂節, 祭, 市集, 嘉年華", "festival"),
];

/// Build the system message for one run.
///
/// `sources` decides the domain to `source` label table the model is given.
pub fn system_prompt(plan: &QueryPlan, sources: &[SourceConfig]) -> String {
    let start = plan.start_label();
    let end = plan.end_label();
    let billboard = SourceLabel::BillboardLiveTaipei.as_str();

    let mut out = String::new();
    out.push_str(
        "You extract upcoming local events in Taiwan from web search results.\n\
         Use only the numbered search results supplied by the user. Never invent events, \
         dates, venues, links or images.\n\n",
    );

    let _ = writeln!(out, "## Date window");
    let _ = writeln!(
        out,
        "- Keep an event only if at least one of its dates falls between {start} and {end} (inclusive)."
    );
    let _ = writeln!(out, "- Drop any search result that mentions no date at all.");
    let _ = writeln!(
        out,
        "- Write dates as YYYY-MM-DD. A session date is [day] for a single day or [start, end] for a run of days.\n"
    );

    let _ = writeln!(out, "## Merging");
    let _ = writeln!(
        out,
        "- Results describing the same tour, exhibition or show at different cities or venues \
         are ONE event with one session per venue and date."
    );
    let _ = writeln!(
        out,
        "- Remove city or venue suffixes from the title, e.g. \"Artist X 台北站\" and \
         \"Artist X 高雄場\" both become \"Artist X\".\n"
    );

    let _ = writeln!(out, "## Venues");
    let _ = writeln!(out, "- Use \"{UNKNOWN_LOCATION}\" when a result names no venue.");
    let _ = writeln!(
        out,
        "- Exception: results from {billboard} always use the venue \"{billboard}\".\n"
    );

    let _ = writeln!(out, "## Categories");
    for (keywords, category) in CATEGORY_RULES {
        let _ = writeln!(out, "- {keywords} => {category}");
    }
    let _ = writeln!(out, "- anything else => other\n");

    let _ = writeln!(out, "## Sources");
    for source in sources {
        let _ = writeln!(out, "- links on {} => \"{}\"", source.domain, source.label);
    }
    let _ = writeln!(out, "- any other site => \"{}\"\n", SourceLabel::Other);

    out.push_str(
        "## Output\n\
         Answer with a JSON object {\"events\": [...]} matching the provided schema. \
         Use null for a missing image and [] for missing tags. \
         Every event needs at least one session.",
    );

    out
}

/// Build the user message carrying the search context.
pub fn user_prompt(plan: &QueryPlan, context: &str) -> String {
    format!(
        "Today is {start}. Extract every event held between {start} and {end} from these search results:\n\n{context}",
        start = plan.start_label(),
        end = plan.end_label(),
    )
}
