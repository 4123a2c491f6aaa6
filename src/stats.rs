//! Summary statistics over multi-chain draws: pooled moments and the
//! Gelman-Rubin potential scale reduction factor.

use ndarray::prelude::*;

/// Pooled mean and unbiased standard deviation over all draws of all chains.
pub fn pooled_mean_sd(draws: ArrayView2<'_, f64>) -> (f64, f64) {
    let mean = draws.mean().expect("draws are non-empty");
    let sd = draws.std(1.0);
    (mean, sd)
}

/// Gelman-Rubin potential scale reduction factor over the chains as given.
///
/// `sqrt((W + B/n) / W)` with `W` the mean within-chain variance under the
/// biased (1/n) normalizer and `B/n` the sample variance of the chain means.
/// The biased normalizer keeps the ratio at exactly one for identical chains
/// and never below it; diverged chains push it far above one.
///
/// Callers must pass at least two chains of at least two draws.
pub fn potential_scale_reduction(draws: ArrayView2<'_, f64>) -> f64 {
    let (m, n) = draws.dim();
    let n_f = n as f64;
    let m_f = m as f64;

    let chain_means = draws.mean_axis(Axis(1)).expect("chains are non-empty");
    let grand = chain_means.mean().expect("at least one chain");

    let w = draws
        .axis_iter(Axis(0))
        .zip(chain_means.iter())
        .map(|(chain, &mu)| chain.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n_f)
        .sum::<f64>()
        / m_f;
    let b_over_n = chain_means
        .iter()
        .map(|&mu| (mu - grand).powi(2))
        .sum::<f64>()
        / (m_f - 1.0);

    if w <= f64::EPSILON {
        // Zero within-chain variance: converged if the chains agree,
        // hopeless otherwise.
        return if b_over_n <= f64::EPSILON {
            1.0
        } else {
            f64::INFINITY
        };
    }
    ((w + b_over_n) / w).sqrt()
}
