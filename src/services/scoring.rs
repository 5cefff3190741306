//! Curation score: a deterministic 0-100 quality signal.
//!
//! | Component  | Range | Formula                                     |
//! |------------|-------|---------------------------------------------|
//! | rating     | 0-40  | `clamp((rating - 3.5) * 20, 0, 40)`         |
//! | reviews    | 0-30  | `min(log10(reviewCount + 1) * 10, 30)`      |
//! | blog       | 0-20  | `min(log10(blogReviewCount + 1) * 8, 20)`   |
//! | freshness  | 0-10  | step function of total review activity      |
//!
//! The sum is rounded half away from zero. All components are non-negative,
//! so this is the same as rounding half up.

use crate::models::{Candidate, ScoreSignals};

/// Minimum rating kept by the optional quality filter
pub const QUALITY_MIN_RATING: f64 = 4.0;

/// Minimum visitor review count kept by the optional quality filter
pub const QUALITY_MIN_REVIEWS: u32 = 50;

/// Computes the curation score for one set of signals.
pub fn curation_score(signals: &ScoreSignals) -> u8 {
    let rating = if signals.rating.is_finite() {
        signals.rating
    } else {
        0.0
    };

    let rating_score = ((rating - 3.5) * 20.0).clamp(0.0, 40.0);
    let review_score = (f64::from(signals.review_count) + 1.0).log10() * 10.0;
    let blog_score = (f64::from(signals.blog_review_count) + 1.0).log10() * 8.0;

    round_score(
        rating_score
            + review_score.min(30.0)
            + blog_score.min(20.0)
            + freshness_score(signals),
    )
}

/// Activity proxy for review recency: the search API exposes no review dates.
pub fn freshness_score(signals: &ScoreSignals) -> f64 {
    let activity = u64::from(signals.review_count) + u64::from(signals.blog_review_count);
    match activity {
        500.. => 10.0,
        200.. => 8.0,
        100.. => 6.0,
        50.. => 4.0,
        10.. => 2.0,
        _ => 0.0,
    }
}

fn round_score(raw: f64) -> u8 {
    raw.round().clamp(0.0, 100.0) as u8
}

/// Fills `curation_score` on every candidate.
pub fn score_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.curation_score = Some(curation_score(&candidate.signals()));
            candidate
        })
        .collect()
}

/// `true` when a candidate clears the quality filter thresholds.
pub fn passes_quality_filter(candidate: &Candidate) -> bool {
    candidate.rating >= QUALITY_MIN_RATING && candidate.review_count >= QUALITY_MIN_REVIEWS
}

/// Scores, optionally quality-filters, and orders candidates best first.
///
/// Returns the ranked list and how many candidates the filter removed. Equal
/// scores keep their incoming (distance) order.
pub fn rank(candidates: Vec<Candidate>, quality_filter: bool) -> (Vec<Candidate>, usize) {
    let before = candidates.len();
    let mut ranked: Vec<Candidate> = score_candidates(candidates)
        .into_iter()
        .filter(|c| !quality_filter || passes_quality_filter(c))
        .collect();
    let filtered = before - ranked.len();

    ranked.sort_by(|a, b| b.curation_score.cmp(&a.curation_score));
    (ranked, filtered)
}
