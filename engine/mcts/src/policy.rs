//! Probability helpers: temperature extraction, root noise, sampling.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use rand_distr::Gamma;

use crate::search::SearchError;

/// Normalize `probs` in place to sum to 1.
///
/// An all-zero (or non-finite) total is a logic error on every caller's path
/// and fails with [`SearchError::DegenerateDistribution`].
pub fn normalize(probs: &mut [f32]) -> Result<(), SearchError> {
    let sum: f32 = probs.iter().sum();
    if !(sum > 0.0 && sum.is_finite()) {
        return Err(SearchError::DegenerateDistribution);
    }
    for p in probs.iter_mut() {
        *p /= sum;
    }
    Ok(())
}

/// Zero the illegal entries of an oracle policy and renormalize.
///
/// Negative and NaN weights count as zero. Returns `false`, leaving
/// `policy` untouched, when no legal action keeps a positive weight.
pub fn mask_policy(policy: &mut [f32], mask: &[bool]) -> bool {
    let mut sum = 0.0f32;
    for (p, &legal) in policy.iter().zip(mask) {
        if legal && *p > 0.0 {
            sum += *p;
        }
    }
    if !(sum > 0.0 && sum.is_finite()) {
        return false;
    }
    for (p, &legal) in policy.iter_mut().zip(mask) {
        *p = if legal && *p > 0.0 { *p / sum } else { 0.0 };
    }
    true
}

/// Turn visit counts into a distribution under `temperature`.
///
/// Each count is raised to `1/temperature` after scaling by the largest
/// count, which keeps the powers in [0, 1]. A temperature of 0 yields a
/// one-hot on the most visited action, split evenly between ties. Any
/// non-finite power is clamped to `f32::MAX` before normalizing.
pub fn visit_distribution(visits: &[u32], temperature: f32) -> Result<Vec<f32>, SearchError> {
    let max = visits.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return Err(SearchError::NoVisits);
    }

    let exponent = if temperature > 0.0 {
        1.0 / f64::from(temperature)
    } else {
        f64::INFINITY
    };
    let max = f64::from(max);

    let powers: Vec<f64> = visits
        .iter()
        .map(|&v| {
            let p = (f64::from(v) / max).powf(exponent);
            if p.is_finite() {
                p
            } else {
                f64::from(f32::MAX)
            }
        })
        .collect();
    let sum: f64 = powers.iter().sum();

    let mut probs: Vec<f32> = powers.iter().map(|&p| (p / sum) as f32).collect();
    normalize(&mut probs)?;
    Ok(probs)
}

/// One-hot distribution at the most visited action, ties broken uniformly
/// at random.
pub fn best_visit_distribution(
    visits: &[u32],
    rng: &mut ChaCha20Rng,
) -> Result<Vec<f32>, SearchError> {
    let max = visits.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return Err(SearchError::NoVisits);
    }
    let best: Vec<usize> = visits
        .iter()
        .enumerate()
        .filter_map(|(action, &v)| (v == max).then_some(action))
        .collect();
    let chosen = best[rng.gen_range(0..best.len())];

    let mut probs = vec![0.0; visits.len()];
    probs[chosen] = 1.0;
    Ok(probs)
}

/// Sample `n` values from a symmetric Dirichlet(alpha) distribution.
///
/// Uses normalized Gamma(alpha, 1) variates. Falls back to uniform if
/// `alpha` is not a valid shape or every variate underflows.
pub fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    let uniform = vec![1.0 / n as f32; n];
    let gamma = match Gamma::new(f64::from(alpha), 1.0) {
        Ok(gamma) => gamma,
        Err(_) => return uniform,
    };

    let samples: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = samples.iter().sum();
    if !(sum > 0.0 && sum.is_finite()) {
        return uniform;
    }
    samples.iter().map(|&s| (s / sum) as f32).collect()
}

/// Weighted random choice over a distribution.
pub fn sample_action(probs: &[f32], rng: &mut ChaCha20Rng) -> Result<usize, SearchError> {
    let dist = WeightedIndex::new(probs).map_err(|_| SearchError::DegenerateDistribution)?;
    Ok(dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sum(probs: &[f32]) -> f32 {
        probs.iter().sum()
    }

    #[test]
    fn test_normalize() {
        let mut probs = vec![1.0, 3.0];
        normalize(&mut probs).unwrap();
        assert!((probs[0] - 0.25).abs() < 1e-6);
        assert!((probs[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_all_zero_fails_fast() {
        let mut probs = vec![0.0; 4];
        assert!(matches!(
            normalize(&mut probs),
            Err(SearchError::DegenerateDistribution)
        ));
    }

    #[test]
    fn test_mask_policy() {
        let mut policy = vec![0.5, 0.25, 0.25, 0.0];
        assert!(mask_policy(&mut policy, &[false, true, true, true]));
        assert_eq!(policy, vec![0.0, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_mask_policy_ignores_negative_and_nan() {
        let mut policy = vec![-1.0, f32::NAN, 2.0];
        assert!(mask_policy(&mut policy, &[true, true, true]));
        assert_eq!(policy, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_mask_policy_degenerate() {
        let mut policy = vec![1.0, 0.0];
        assert!(!mask_policy(&mut policy, &[false, true]));
        assert_eq!(policy, vec![1.0, 0.0]);
    }

    #[test]
    fn test_equal_visits_give_uniform() {
        for temperature in [0.1, 1.0, 3.0] {
            let probs = visit_distribution(&[5, 5, 5, 5], temperature).unwrap();
            for p in probs {
                assert!((p - 0.25).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_temperature_one_is_proportional() {
        let probs = visit_distribution(&[1, 3, 0, 4], 1.0).unwrap();
        assert!((probs[0] - 0.125).abs() < 1e-6);
        assert!((probs[1] - 0.375).abs() < 1e-6);
        assert_eq!(probs[2], 0.0);
        assert!((probs[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_low_temperature_converges_to_one_hot() {
        let probs = visit_distribution(&[10, 40, 39, 1], 0.001).unwrap();
        assert!(probs[1] > 0.999);
        assert!((sum(&probs) - 1.0).abs() < 1e-5);

        let zero = visit_distribution(&[10, 40, 39, 1], 0.0).unwrap();
        assert_eq!(zero, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_temperature_splits_ties() {
        let probs = visit_distribution(&[7, 2, 7], 0.0).unwrap();
        assert_eq!(probs, vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let probs = visit_distribution(&[u32::MAX, u32::MAX - 1, 1], 0.05).unwrap();
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((sum(&probs) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_no_visits_is_an_error() {
        assert!(matches!(
            visit_distribution(&[0, 0], 1.0),
            Err(SearchError::NoVisits)
        ));
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(matches!(
            best_visit_distribution(&[0, 0], &mut rng),
            Err(SearchError::NoVisits)
        ));
    }

    #[test]
    fn test_best_visit_distribution_breaks_ties_randomly() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut seen = [0u32; 3];
        for _ in 0..200 {
            let probs = best_visit_distribution(&[4, 1, 4], &mut rng).unwrap();
            assert_eq!(probs[1], 0.0);
            assert_eq!(sum(&probs), 1.0);
            let chosen = probs.iter().position(|&p| p == 1.0).unwrap();
            seen[chosen] += 1;
        }
        assert!(seen[0] > 0);
        assert!(seen[2] > 0);
        assert_eq!(seen[1], 0);
    }

    #[test]
    fn test_dirichlet_noise() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let noise = dirichlet_noise(5, 0.3, &mut rng);
        assert_eq!(noise.len(), 5);
        assert!((sum(&noise) - 1.0).abs() < 1e-4);
        assert!(noise.iter().all(|&n| n >= 0.0));
    }

    #[test]
    fn test_dirichlet_noise_invalid_alpha_is_uniform() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        assert_eq!(dirichlet_noise(4, -1.0, &mut rng), vec![0.25; 4]);
        assert!(dirichlet_noise(0, 0.3, &mut rng).is_empty());
    }

    #[test]
    fn test_sample_action() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let policy = vec![0.0, 0.5, 0.3, 0.2, 0.0];

        let mut counts = [0u32; 5];
        for _ in 0..1000 {
            counts[sample_action(&policy, &mut rng).unwrap()] += 1;
        }

        assert_eq!(counts[0], 0);
        assert_eq!(counts[4], 0);
        assert!(counts[1] > counts[2]);
        assert!(counts[2] > counts[3]);
    }

    #[test]
    fn test_sample_action_all_zero() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        assert!(matches!(
            sample_action(&[0.0, 0.0], &mut rng),
            Err(SearchError::DegenerateDistribution)
        ));
    }
}
