//! Deep research: bounded scan plus tiered consolidation
//!
//! Scores at most `max_atoms` atoms for the topic, keeps up to 10 hits above
//! the insight threshold, and compresses them by consolidation level.

use std::time::Instant;
use tracing::debug;

use crate::search::{self, ScoredAtom, SearchOptions};
use crate::store::KnowledgeStore;
use crate::types::{ConsolidationLevel, ResearchReport, ResearchSummary};

pub const DEFAULT_MAX_ATOMS: usize = 1000;
/// Relevance an atom must exceed to count as an insight
pub const INSIGHT_THRESHOLD: f64 = 0.7;
pub const MAX_INSIGHTS: usize = 10;
/// Characters kept per insight in a brief summary
pub const BRIEF_PREVIEW_CHARS: usize = 100;

pub const NO_DATA_FALLBACK: &str = "No high-relevance data found";
pub const LIMITED_FALLBACK: &str = "Limited insights available";

/// Run deep research on `topic` across all wings.
pub fn research(
    store: &KnowledgeStore,
    topic: &str,
    max_atoms: usize,
    level: ConsolidationLevel,
) -> ResearchReport {
    let started = Instant::now();

    let options = SearchOptions {
        wing_filters: Vec::new(),
        limit: max_atoms,
        scan_limit: Some(max_atoms),
    };
    let outcome = search::execute(store, topic, &options);

    let insights: Vec<&ScoredAtom<'_>> = outcome
        .hits
        .iter()
        .filter(|hit| hit.relevance > INSIGHT_THRESHOLD)
        .take(MAX_INSIGHTS)
        .collect();

    let summary = match level {
        ConsolidationLevel::Brief => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            brief_summary(&insights, outcome.atoms_scored, elapsed_ms)
        }
        ConsolidationLevel::Detailed | ConsolidationLevel::Comprehensive => {
            ResearchSummary::Insights(insights.iter().map(|i| i.atom.payload.clone()).collect())
        }
    };
    store.record_research();

    let research_time_ms = started.elapsed().as_millis() as u64;
    debug!(
        topic = %topic,
        analyzed = outcome.atoms_scored,
        insights = insights.len(),
        ms = research_time_ms,
        "Research complete"
    );

    ResearchReport {
        topic: topic.to_string(),
        research_time_ms,
        atoms_analyzed: outcome.atoms_scored,
        summary,
    }
}

fn brief_summary(insights: &[&ScoredAtom<'_>], analyzed: usize, elapsed_ms: u64) -> ResearchSummary {
    let preview = |i: usize, fallback: &str| {
        insights
            .get(i)
            .map(|hit| truncate_chars(&hit.atom.payload.to_string(), BRIEF_PREVIEW_CHARS))
            .unwrap_or_else(|| fallback.to_string())
    };

    ResearchSummary::Brief(vec![
        preview(0, NO_DATA_FALLBACK),
        preview(1, LIMITED_FALLBACK),
        format!("Research analyzed {} atoms in {}ms", analyzed, elapsed_ms),
    ])
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}
