// src/engine/coverage.rs

use std::collections::BTreeMap;
use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::clients::content::Snippet;
use crate::config::EngineSettings;

/// The snippet to generate from, plus a different one for the retry path.
#[derive(Debug, Clone)]
pub struct SnippetChoice {
    pub primary: Snippet,
    pub retry: Option<Snippet>,
}

/// Filters `pool` down to the snippets eligible to serve next.
///
/// Unused snippets are preferred until coverage (distinct used snippets over
/// pool size) reaches `coverage_threshold`; past that the whole pool is
/// eligible again. In both phases a snippet whose question was answered
/// incorrectly fewer than `missed_gap` serves ago stays excluded.
/// `served_total` is the number of questions served so far; `missed` maps a
/// snippet id to the serve ordinal of its last incorrect answer.
pub fn eligible_snippets<'a>(
    pool: &'a [Snippet],
    used: &[String],
    missed: &BTreeMap<String, usize>,
    served_total: usize,
    coverage_threshold: f64,
    missed_gap: usize,
) -> Vec<&'a Snippet> {
    let distinct_used = pool
        .iter()
        .filter(|s| used.contains(&s.snippet_id))
        .count();
    let coverage = if pool.is_empty() {
        1.0
    } else {
        distinct_used as f64 / pool.len() as f64
    };
    let allow_repeats = coverage >= coverage_threshold;

    pool.iter()
        .filter(|s| allow_repeats || !used.contains(&s.snippet_id))
        .filter(|s| match missed.get(&s.snippet_id) {
            Some(&missed_at) => served_total.saturating_sub(missed_at) >= missed_gap,
            None => true,
        })
        .collect()
}

/// Picks the snippet for the next question from the pool's top-K candidates:
/// draw `retriever_sample_size` at random, keep the coverage-eligible ones,
/// pick one uniformly. An empty eligible subset falls back to the full
/// candidate list; selection never fails for coverage reasons.
pub fn choose_snippets<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[Snippet],
    used: &[String],
    missed: &BTreeMap<String, usize>,
    served_total: usize,
    settings: &EngineSettings,
) -> Option<SnippetChoice> {
    if candidates.is_empty() {
        return None;
    }

    let eligible_ids: HashSet<&str> = eligible_snippets(
        candidates,
        used,
        missed,
        served_total,
        settings.coverage_threshold,
        settings.missed_question_gap,
    )
    .into_iter()
    .map(|s| s.snippet_id.as_str())
    .collect();

    let mut sampled: Vec<&Snippet> = candidates.iter().collect();
    sampled.shuffle(rng);
    sampled.truncate(settings.retriever_sample_size.max(1));

    let mut picks: Vec<&Snippet> = sampled
        .into_iter()
        .filter(|s| eligible_ids.contains(s.snippet_id.as_str()))
        .collect();

    if picks.is_empty() {
        picks = candidates.iter().collect();
        picks.shuffle(rng);
    }

    let primary = picks[0].clone();
    let retry = picks
        .iter()
        .skip(1)
        .find(|s| s.snippet_id != primary.snippet_id)
        .map(|s| (*s).clone())
        .or_else(|| {
            candidates
                .iter()
                .find(|s| s.snippet_id != primary.snippet_id)
                .cloned()
        });

    Some(SnippetChoice { primary, retry })
}
