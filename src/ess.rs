//! Effective-sample-size estimation for autocorrelated chains.
//!
//! Follows the multi-chain methodology from the [Stan Reference Manual][1]:
//! per-chain autocovariances (FFT-based above a length cutoff), combined
//! across chains through the pooled variance estimate, then Geyer's
//! initial-positive-sequence truncation with the monotone adjustment.
//!
//! Two variants are exposed: [`ess_mean`] works on the raw draws and
//! measures how precisely the posterior mean is pinned down, while
//! [`ess_bulk`] works on rank-normalized draws and measures mixing in the
//! bulk of the distribution. Thinning decisions are driven by the bulk
//! variant.
//!
//! [1]: https://mc-stan.org/docs/reference-manual/effective-sample-size.html

use crate::trace::{Trace, TraceError};
use ndarray::concatenate;
use ndarray::prelude::*;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;

/// Chains at least this long take the FFT autocovariance path.
const FFT_CUTOFF: usize = 100;

/// Bulk ESS for every parameter of a trace, in trace order.
///
/// Fails if the trace has fewer than two draws per chain, since
/// autocorrelation is undefined on a single draw.
pub fn effective_sample_sizes(trace: &Trace) -> Result<Vec<(String, f64)>, TraceError> {
    if trace.n_draws() < 2 {
        let name = trace.names().next().expect("trace is non-empty").to_string();
        return Err(TraceError::TooFewDraws {
            name,
            n_draws: trace.n_draws(),
            required: 2,
        });
    }
    Ok(trace
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(name, draws)| (name.to_string(), ess_bulk(draws)))
        .collect())
}

/// ESS of the posterior-mean estimate: the base estimator on split
/// half-chains of the raw draws.
pub fn ess_mean(draws: ArrayView2<'_, f64>) -> f64 {
    let split = split_half(draws);
    ess_base(split.view())
}

/// Bulk ESS: the base estimator on split, rank-normalized draws.
///
/// Rank normalization makes the estimate robust to heavy tails, so this is
/// the variant thinning decisions are based on.
pub fn ess_bulk(draws: ArrayView2<'_, f64>) -> f64 {
    let split = split_half(draws);
    let z = rank_normalize(split.view());
    ess_base(z.view())
}

/// Splits every chain in half, doubling the chain count.
///
/// Odd draw counts drop the middle draw. Chains shorter than four draws are
/// left whole, since their halves would be too short to carry any
/// autocorrelation signal.
fn split_half(draws: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = draws.ncols();
    if n < 4 {
        return draws.to_owned();
    }
    let half = (n / 2) as isize;
    let first = draws.slice(s![.., ..half]);
    let second = draws.slice(s![.., -half..]);
    concatenate(Axis(0), &[first, second]).expect("stacking chain halves should succeed")
}

/// Maps the pooled draws through averaged fractional ranks and the
/// standard-normal quantile function (with the Blom offset). Ties share
/// their average rank.
fn rank_normalize(draws: ArrayView2<'_, f64>) -> Array2<f64> {
    let (m, n) = draws.dim();
    let total = m * n;
    let normal = Normal::new(0.0, 1.0).expect("standard normal is a valid distribution");

    let mut order: Vec<(f64, usize)> = draws
        .iter()
        .copied()
        .enumerate()
        .map(|(i, x)| (x, i))
        .collect();
    order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Greater));

    let mut out = Array2::<f64>::zeros((m, n));
    let mut i = 0;
    while i < total {
        let mut j = i + 1;
        while j < total && order[j].0 == order[i].0 {
            j += 1;
        }
        let rank = 0.5 * ((i + 1) as f64 + j as f64);
        let p = (rank - 0.375) / (total as f64 + 0.25);
        let z = normal.inverse_cdf(p);
        for &(_, flat) in &order[i..j] {
            out[[flat / n, flat % n]] = z;
        }
        i = j;
    }
    out
}

/// The multi-chain ESS over a `(chains, draws)` array.
///
/// Lag autocorrelations combine the averaged per-chain autocovariances with
/// the pooled variance estimate; the Geyer sum over paired lags gives the
/// autocorrelation time `tau` and `ess = total / tau`, capped at the raw
/// sample count. A non-positive `tau` (perfectly anti-correlated chains) is
/// passed through as a non-positive ESS so callers can reject the trace; a
/// zero-variance trace yields `ess = total`.
fn ess_base(draws: ArrayView2<'_, f64>) -> f64 {
    let (m, n) = draws.dim();
    let total = (m * n) as f64;
    if n < 2 {
        return f64::NAN;
    }

    let acov: Vec<Vec<f64>> = draws.axis_iter(Axis(0)).map(autocovariance).collect();
    let chain_means: Vec<f64> = draws
        .axis_iter(Axis(0))
        .map(|c| c.mean().expect("chains are non-empty"))
        .collect();

    let n_f = n as f64;
    let m_f = m as f64;
    // Unbiased mean within-chain variance.
    let w = acov.iter().map(|a| a[0] * n_f / (n_f - 1.0)).sum::<f64>() / m_f;
    // Sample variance of the chain means; zero for a single chain.
    let b_over_n = if m > 1 {
        let grand = chain_means.iter().sum::<f64>() / m_f;
        chain_means
            .iter()
            .map(|&mu| (mu - grand).powi(2))
            .sum::<f64>()
            / (m_f - 1.0)
    } else {
        0.0
    };
    let var_plus = w * (n_f - 1.0) / n_f + b_over_n;
    if !var_plus.is_finite() {
        return f64::NAN;
    }
    if var_plus <= 0.0 {
        // Constant trace: every draw is as good as independent.
        return total;
    }

    let rho = |t: usize| -> f64 {
        let mean_acov = acov.iter().map(|a| a[t]).sum::<f64>() / m_f;
        1.0 - (w - mean_acov) / var_plus
    };

    // Geyer initial positive sequence over paired autocorrelations, with the
    // monotone adjustment. The pair (rho_0 = 1, rho_1) seeds the sum.
    let mut sum_pairs = 0.0;
    let mut prev = f64::INFINITY;
    let mut k = 0usize;
    while 2 * k < n {
        let even = if k == 0 { 1.0 } else { rho(2 * k) };
        let odd = if 2 * k + 1 < n { rho(2 * k + 1) } else { 0.0 };
        let mut p = even + odd;
        if !(p > 0.0) {
            break;
        }
        if p > prev {
            p = prev;
        }
        prev = p;
        sum_pairs += p;
        k += 1;
    }

    let tau = 2.0 * sum_pairs - 1.0;
    if !tau.is_finite() {
        return f64::NAN;
    }
    // tau below one means the draws beat independent sampling; the estimate
    // is capped at the raw sample count.
    (total / tau).min(total)
}

/// Biased (1/n) autocovariance of one chain at lags `0..n`.
fn autocovariance(chain: ArrayView1<'_, f64>) -> Vec<f64> {
    if chain.len() < FFT_CUTOFF {
        autocovariance_direct(chain)
    } else {
        autocovariance_fft(chain)
    }
}

fn autocovariance_direct(chain: ArrayView1<'_, f64>) -> Vec<f64> {
    let n = chain.len();
    let mean = chain.sum() / n as f64;
    let centered: Vec<f64> = chain.iter().map(|x| x - mean).collect();
    (0..n)
        .map(|lag| {
            centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / n as f64
        })
        .collect()
}

/// Zero-padded FFT autocovariance. The padding avoids circular wrap-around,
/// and `rustfft` leaves results unnormalized, so the `1 / (n_padded * n)`
/// factor is applied here.
fn autocovariance_fft(chain: ArrayView1<'_, f64>) -> Vec<f64> {
    let n = chain.len();
    let n_padded = (2 * n - 1).next_power_of_two();
    let mean = chain.sum() / n as f64;

    let mut buf: Vec<Complex<f64>> = chain
        .iter()
        .map(|x| Complex { re: x - mean, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }).take(n_padded - n))
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n_padded).process(&mut buf);
    for x in buf.iter_mut() {
        let c = x.conj();
        *x *= c;
    }
    planner.plan_fft_inverse(n_padded).process(&mut buf);

    buf[..n]
        .iter()
        .map(|x| x.re / n_padded as f64 / n as f64)
        .collect()
}
