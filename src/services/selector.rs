//! Exclusion-aware weighted random selection.
//!
//! The random source is injected so picks are reproducible under a seeded
//! RNG. Weighting is linear (`max(1, score)`) unless configured otherwise;
//! the floor of 1 keeps zero-scored candidates selectable.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::models::{Candidate, SelectionResult, Weighting};

/// Maximum number of alternatives returned with a pick
pub const MAX_ALTERNATIVES: usize = 3;

/// Picks one candidate plus up to three alternatives.
///
/// Returns `None` when every candidate is excluded (or the list is empty).
/// A single eligible candidate is returned without consuming randomness.
pub fn pick<R: Rng + ?Sized>(
    candidates: &[Candidate],
    exclude_ids: &[String],
    weighting: Weighting,
    rng: &mut R,
) -> Option<SelectionResult> {
    let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
    let eligible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(c.id.as_str()))
        .collect();

    match eligible.len() {
        0 => return None,
        1 => {
            return Some(SelectionResult {
                picked: eligible[0].clone(),
                alternatives: Vec::new(),
            })
        }
        _ => {}
    }

    let weights: Vec<f64> = eligible
        .iter()
        .map(|c| weighting.weight(c.curation_score.unwrap_or(0)))
        .collect();
    let picked_index = roulette_index(&weights, rng);

    let remaining: Vec<&Candidate> = eligible
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != picked_index)
        .map(|(_, c)| *c)
        .collect();

    tracing::debug!(
        eligible = eligible.len(),
        picked = %eligible[picked_index].id,
        "Weighted pick completed"
    );

    Some(SelectionResult {
        picked: eligible[picked_index].clone(),
        alternatives: random_subset(remaining, MAX_ALTERNATIVES, rng)
            .into_iter()
            .cloned()
            .collect(),
    })
}

/// Roulette-wheel draw: `r` in `[0, total)`, subtract weights until `r <= 0`.
fn roulette_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    let mut remaining = rng.random_range(0.0..total);

    for (i, weight) in weights.iter().enumerate() {
        remaining -= weight;
        if remaining <= 0.0 {
            return i;
        }
    }

    // Only reachable through floating-point drift
    weights.len() - 1
}

/// Up to `count` items via Fisher-Yates. Returns everything, unshuffled,
/// when there are no more than `count` items.
fn random_subset<T, R: Rng + ?Sized>(mut items: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    if items.len() <= count {
        return items;
    }
    items.shuffle(rng);
    items.truncate(count);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// Fails the test if any randomness is requested.
    struct NoRandomness;

    impl RngCore for NoRandomness {
        fn next_u32(&mut self) -> u32 {
            panic!("randomness was consumed")
        }

        fn next_u64(&mut self) -> u64 {
            panic!("randomness was consumed")
        }

        fn fill_bytes(&mut self, _dst: &mut [u8]) {
            panic!("randomness was consumed")
        }
    }

    fn scored(id: &str, score: u8) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: format!("Restaurant {id}"),
            category: "한식".to_string(),
            address: "서울시 강남구".to_string(),
            road_address: "서울시 강남구".to_string(),
            phone: "02-1234-5678".to_string(),
            latitude: 37.5,
            longitude: 127.0,
            distance_meters: None,
            rating: 4.0,
            review_count: 100,
            blog_review_count: 50,
            image_url: None,
            place_url: String::new(),
            curation_score: Some(score),
        }
    }

    fn count_picks(candidates: &[Candidate], id: &str, weighting: Weighting, n: usize) -> usize {
        let mut rng = StdRng::seed_from_u64(42);
        (0..n)
            .filter(|_| {
                pick(candidates, &[], weighting, &mut rng)
                    .map(|r| r.picked.id == id)
                    .unwrap_or(false)
            })
            .count()
    }

    #[test]
    fn test_empty_returns_none() {
        assert!(pick(&[], &[], Weighting::Linear, &mut NoRandomness).is_none());
    }

    #[test]
    fn test_singleton_uses_no_randomness() {
        let c = scored("1", 80);
        let result = pick(&[c.clone()], &[], Weighting::Linear, &mut NoRandomness).unwrap();
        assert_eq!(result.picked, c);
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn test_singleton_after_exclusion() {
        let candidates = [scored("1", 80), scored("2", 60)];
        let result = pick(
            &candidates,
            &["1".to_string()],
            Weighting::Linear,
            &mut NoRandomness,
        )
        .unwrap();
        assert_eq!(result.picked.id, "2");
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn test_all_excluded_returns_none() {
        let candidates = [scored("1", 80), scored("2", 60)];
        let excluded = ["1".to_string(), "2".to_string()];
        assert!(pick(&candidates, &excluded, Weighting::Linear, &mut NoRandomness).is_none());
    }

    #[test]
    fn test_excluded_never_picked() {
        let candidates = [scored("1", 80), scored("2", 60), scored("3", 40)];
        let excluded = ["1".to_string()];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let result = pick(&candidates, &excluded, Weighting::Linear, &mut rng).unwrap();
            assert_ne!(result.picked.id, "1");
            assert!(result.alternatives.iter().all(|a| a.id != "1"));
        }
    }

    #[test]
    fn test_alternatives_bounded_and_disjoint() {
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| scored(&i.to_string(), 50 + i * 5))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let result = pick(&candidates, &[], Weighting::Linear, &mut rng).unwrap();
            assert_eq!(result.alternatives.len(), MAX_ALTERNATIVES);
            assert!(result.alternatives.iter().all(|a| a.id != result.picked.id));
            let ids: HashSet<&str> = result.alternatives.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids.len(), result.alternatives.len());
        }
    }

    #[test]
    fn test_fewer_than_three_remaining_returns_all() {
        let candidates = [scored("a", 10), scored("b", 20), scored("c", 30)];
        let mut rng = StdRng::seed_from_u64(11);
        let result = pick(&candidates, &[], Weighting::Linear, &mut rng).unwrap();
        assert_eq!(result.alternatives.len(), 2);
    }

    #[test]
    fn test_same_seed_same_pick() {
        let candidates: Vec<Candidate> = (0..8).map(|i| scored(&i.to_string(), i * 10)).collect();
        let a = pick(&candidates, &[], Weighting::Linear, &mut StdRng::seed_from_u64(99));
        let b = pick(&candidates, &[], Weighting::Linear, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_score_still_picked_sometimes() {
        let candidates = [scored("high", 100), scored("zero", 0)];
        let zero = count_picks(&candidates, "zero", Weighting::Linear, 10_000);
        // Expected ratio 1 / 101
        assert!(zero > 0);
        assert!(zero < 10_000 - zero);
        assert!(zero < 500);
    }

    #[test]
    fn test_weighted_bias_converges() {
        let candidates = [scored("high", 90), scored("low", 10)];
        let high = count_picks(&candidates, "high", Weighting::Linear, 10_000);
        let ratio = high as f64 / 10_000.0;
        assert!(ratio > 0.80 && ratio < 0.98, "ratio {ratio}");
    }

    #[test]
    fn test_sqrt_weighting_is_flatter() {
        let candidates = [scored("high", 90), scored("low", 10)];
        let high = count_picks(&candidates, "high", Weighting::Sqrt, 10_000);
        let ratio = high as f64 / 10_000.0;
        // (sqrt(90)+1) / (sqrt(90)+1 + sqrt(10)+1) ~= 0.716
        assert!(ratio > 0.66 && ratio < 0.77, "ratio {ratio}");
    }

    #[test]
    fn test_missing_score_treated_as_zero() {
        let mut unscored = scored("none", 0);
        unscored.curation_score = None;
        let candidates = [scored("high", 100), unscored];
        let none = count_picks(&candidates, "none", Weighting::Linear, 5_000);
        assert!(none > 0 && none < 250);
    }
}
