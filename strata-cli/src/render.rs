//! Console presentation of comparison reports.

use std::fmt;

use strata_rag::{ComparisonReport, RetrievalResult, StrategyRun};

const PREVIEW_CHARS: usize = 120;

/// How a strategy's latency compares to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyClass {
    Fast,
    Acceptable,
    TooSlow,
}

impl LatencyClass {
    /// `fast` up to 2x the baseline, `acceptable` up to 5x, `too slow` beyond.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 2.0 {
            Self::Fast
        } else if ratio <= 5.0 {
            Self::Acceptable
        } else {
            Self::TooSlow
        }
    }
}

impl fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Acceptable => "acceptable",
            Self::TooSlow => "too slow",
        })
    }
}

fn rule(title: &str) -> String {
    format!("{}\n{title}\n{}", "=".repeat(80), "=".repeat(80))
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    if flat.chars().count() > PREVIEW_CHARS {
        cut.push_str("...");
    }
    cut
}

pub fn documents(result: &RetrievalResult) -> String {
    if result.is_empty() {
        return "  (no documents)\n".to_string();
    }
    let mut out = String::new();
    for (i, doc) in result.documents.iter().enumerate() {
        let meta = &doc.metadata;
        out.push_str(&format!("  {}. [{:.4}] {}\n", i + 1, doc.score, preview(&doc.text)));
        out.push_str(&format!(
            "     key={} type={} level={} source={}\n",
            doc.key, meta.document_type, meta.technical_level, meta.source_file
        ));
    }
    out
}

fn timing(run: &StrategyRun, is_baseline: bool) -> String {
    let elapsed = format!("{:.1} ms", run.elapsed_ms());
    match (is_baseline, run.ratio_to_baseline) {
        (true, _) => elapsed,
        (false, Some(ratio)) => format!("{elapsed} ({ratio:.2}x baseline, {})", LatencyClass::from_ratio(ratio)),
        (false, None) => format!("{elapsed} (baseline too fast to compare)"),
    }
}

/// Full results view of one report.
pub fn report(index: usize, report: &ComparisonReport) -> String {
    let mut out = format!("TEST QUERY {index}: '{}' (k={})\n", report.query, report.k);
    for (i, run) in report.runs().enumerate() {
        let result = &run.result;
        out.push('\n');
        out.push_str(&rule(&format!("[{}] {}", result.strategy, timing(run, i == 0))));
        out.push('\n');
        if let Some(reason) = result.reason {
            out.push_str(&format!("  degraded: {reason}\n"));
        }
        out.push_str(&format!("  {} result(s)\n", result.len()));
        out.push_str(&documents(result));
    }
    out
}

/// Explanation of what the non-baseline strategies do for `query`.
pub fn behavior(query: &str, variants: usize, fan_out: usize, parent_size: usize, child_size: usize) -> String {
    let mut out = String::new();
    out.push_str(&rule("[multi_query] behavior"));
    out.push_str(&format!(
        "\n  Asks the LLM for {variants} rephrasings of '{query}',\n  \
         searches the original and each rephrasing, and keeps the union\n  \
         of hits with each document's best score.\n\n"
    ));
    out.push_str(&rule("[self_query] behavior"));
    out.push_str(
        "\n  Asks the LLM to split the question into a metadata filter\n  \
         (document_type, technical_level, has_code, ...) and a shorter\n  \
         semantic query, then runs one filtered search.\n\n",
    );
    out.push_str(&rule("[parent_document] behavior"));
    out.push_str(&format!(
        "\n  Searches small {child_size}-char children ({fan_out}x k candidates),\n  \
         collapses them onto their {parent_size}-char parents, and returns the\n  \
         parents' full text scored by their best child.\n"
    ));
    out
}

pub fn summary() -> &'static str {
    "\nSTRATEGY SUMMARY\n  \
     baseline         fast, reliable, works with any content\n  \
     multi_query      complex topics; better recall through query expansion\n  \
     self_query       questions naming a kind or level of documentation\n  \
     parent_document  long documents; precise search, full-context answers\n"
}
