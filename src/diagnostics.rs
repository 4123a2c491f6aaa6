//! Post-hoc trace processing: autocorrelation-based thinning and the
//! per-parameter convergence summary table.

use crate::ess::{effective_sample_sizes, ess_bulk, ess_mean};
use crate::stats::{pooled_mean_sd, potential_scale_reduction};
use crate::trace::{Trace, TraceError};
use log::info;
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use std::error::Error;
use std::fmt;

/// Result of thinning a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Thinned {
    /// The thinned trace: same parameters and chains, draws strided.
    pub trace: Trace,
    /// The stride applied along the draw axis, at least one.
    pub interval: usize,
    /// Autocorrelation time the stride was derived from.
    pub tau: f64,
}

/// Failures of the diagnostic pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticsError {
    /// The trace violates the shape contract.
    InvalidTrace(TraceError),
    /// A parameter's ESS estimate is not a positive finite number, so no
    /// meaningful thinning stride exists.
    DegenerateTrace { name: String, ess: f64 },
}

impl fmt::Display for DiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticsError::InvalidTrace(e) => write!(f, "invalid trace: {e}"),
            DiagnosticsError::DegenerateTrace { name, ess } => write!(
                f,
                "parameter {name:?} has a degenerate ESS estimate ({ess}); no thinning stride exists"
            ),
        }
    }
}

impl Error for DiagnosticsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DiagnosticsError::InvalidTrace(e) => Some(e),
            DiagnosticsError::DegenerateTrace { .. } => None,
        }
    }
}

impl From<TraceError> for DiagnosticsError {
    fn from(e: TraceError) -> Self {
        DiagnosticsError::InvalidTrace(e)
    }
}

/// Thins a trace by the autocorrelation time implied by its smallest
/// per-parameter effective sample size.
///
/// The smallest ESS is the conservative choice: the stride is
/// `ceil(total_samples / min_ess)`, never below one, and every chain keeps
/// the draws at indices `0, k, 2k, …`. The thinned trace therefore has
/// `ceil(draws / k)` draws per chain and an unchanged chain count. The input
/// trace is left untouched, and the result is deterministic.
pub fn thin(trace: &Trace) -> Result<Thinned, DiagnosticsError> {
    let ess = effective_sample_sizes(trace)?;
    if let Some((name, value)) = ess.iter().find(|(_, e)| !(*e > 0.0) || !e.is_finite()) {
        return Err(DiagnosticsError::DegenerateTrace {
            name: name.clone(),
            ess: *value,
        });
    }

    let ess_values: Array1<f64> = ess.iter().map(|(_, e)| *e).collect();
    let min_ess = *ess_values
        .min()
        .expect("ess values are non-empty and comparable");
    let total = trace.total_samples() as f64;
    let tau = total / min_ess;
    let interval = (tau.ceil() as usize).max(1);
    info!("autocorrelation time from min ESS ({min_ess:.1}): tau = {tau:.2}");
    info!("thinning interval: {interval}");

    let thinned = Trace::from_samples(
        trace
            .iter()
            .map(|(name, draws)| {
                let kept = draws.slice(s![.., ..;interval as isize]).to_owned();
                (name.to_string(), kept)
            })
            .collect(),
    )?;
    info!(
        "thinned trace: {} draws per chain across {} chains ({} samples in total)",
        thinned.n_draws(),
        thinned.n_chains(),
        thinned.total_samples()
    );

    Ok(Thinned {
        trace: thinned,
        interval,
        tau,
    })
}

/// One row of the convergence table.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRow {
    pub name: String,
    /// Pooled mean over all chains.
    pub mean: f64,
    /// Standard error of the mean, `sd / sqrt(N)`.
    pub se_mean: f64,
    /// Pooled standard deviation.
    pub sd: f64,
    /// Standard error of the standard deviation, `sd / sqrt(2N)`.
    pub se_sd: f64,
    /// Ratio of bulk ESS to mean ESS; near one for healthy chains.
    pub tau: f64,
    /// Gelman-Rubin statistic; near one once the chains have mixed.
    pub r_hat: f64,
}

/// Convergence statistics for every parameter of a trace, in trace order.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticTable {
    rows: Vec<DiagnosticRow>,
}

impl DiagnosticTable {
    /// Rows in trace order.
    pub fn rows(&self) -> &[DiagnosticRow] {
        &self.rows
    }

    /// Row for one parameter, if present.
    pub fn get(&self, name: &str) -> Option<&DiagnosticRow> {
        self.rows.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for DiagnosticTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>8} {:>8}",
            "parameter", "mean", "SE_mean", "sd", "SE_sd", "tau", "r_hat"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<12} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>8.2} {:>8.3}",
                row.name, row.mean, row.se_mean, row.sd, row.se_sd, row.tau, row.r_hat
            )?;
        }
        Ok(())
    }
}

/// Computes the convergence table for a (typically thinned) trace.
///
/// Requires at least two chains with at least two draws each; the
/// Gelman-Rubin statistic compares between- and within-chain variance and is
/// undefined below that.
pub fn convergence_diagnostics(trace: &Trace) -> Result<DiagnosticTable, TraceError> {
    if trace.n_chains() < 2 {
        return Err(TraceError::TooFewChains {
            n_chains: trace.n_chains(),
            required: 2,
        });
    }
    if trace.n_draws() < 2 {
        let name = trace.names().next().expect("trace is non-empty").to_string();
        return Err(TraceError::TooFewDraws {
            name,
            n_draws: trace.n_draws(),
            required: 2,
        });
    }

    let total = trace.total_samples() as f64;
    let rows = trace
        .iter()
        .map(|(name, draws)| {
            let (mean, sd) = pooled_mean_sd(draws);
            DiagnosticRow {
                name: name.to_string(),
                mean,
                se_mean: sd / total.sqrt(),
                sd,
                se_sd: sd / (2.0 * total).sqrt(),
                tau: ess_bulk(draws) / ess_mean(draws),
                r_hat: potential_scale_reduction(draws),
            }
        })
        .collect();
    Ok(DiagnosticTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_thin_rejects_degenerate_trace() {
        let alternating =
            Array2::from_shape_fn((2, 500), |(_, d)| if d % 2 == 0 { 1.0 } else { -1.0 });
        let trace = Trace::from_samples(vec![("alpha".to_string(), alternating)]).unwrap();
        let err = thin(&trace).unwrap_err();
        assert!(matches!(
            err,
            DiagnosticsError::DegenerateTrace { ref name, ess } if name == "alpha" && ess <= 0.0
        ));
    }

    #[test]
    fn test_thin_constant_trace_is_identity() {
        let trace =
            Trace::from_samples(vec![("alpha".to_string(), Array2::from_elem((2, 100), 3.0))])
                .unwrap();
        let thinned = thin(&trace).unwrap();
        assert_eq!(thinned.interval, 1);
        assert_abs_diff_eq!(thinned.tau, 1.0, epsilon = 1e-12);
        assert_eq!(thinned.trace, trace);
    }

    #[test]
    fn test_convergence_rejects_single_chain() {
        let trace =
            Trace::from_samples(vec![("alpha".to_string(), Array2::zeros((1, 100)))]).unwrap();
        assert!(matches!(
            convergence_diagnostics(&trace).unwrap_err(),
            TraceError::TooFewChains {
                n_chains: 1,
                required: 2
            }
        ));
    }

    #[test]
    fn test_convergence_rejects_single_draw() {
        let trace =
            Trace::from_samples(vec![("alpha".to_string(), Array2::zeros((2, 1)))]).unwrap();
        assert!(matches!(
            convergence_diagnostics(&trace).unwrap_err(),
            TraceError::TooFewDraws { required: 2, .. }
        ));
    }

    #[test]
    fn test_table_layout_and_lookup() {
        let trace = Trace::from_samples(vec![
            ("alpha".to_string(), arr2(&[[1.0, 2.0, 3.0, 4.0], [1.0, 2.0, 3.0, 4.0]])),
            ("beta".to_string(), arr2(&[[0.0, 1.0, 0.5, 1.5], [0.2, 0.8, 0.4, 1.1]])),
        ])
        .unwrap();
        let table = convergence_diagnostics(&trace).unwrap();
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].name, "alpha");
        assert!(table.get("beta").is_some());
        assert!(table.get("gamma").is_none());

        let rendered = format!("{table}");
        assert!(rendered.contains("SE_mean"));
        assert!(rendered.contains("r_hat"));
        assert!(rendered.lines().count() >= 3);
    }

    #[test]
    fn test_se_formulas() {
        let draws = arr2(&[[1.0, 2.0, 3.0, 4.0], [2.0, 3.0, 4.0, 5.0]]);
        let trace = Trace::from_samples(vec![("alpha".to_string(), draws.clone())]).unwrap();
        let table = convergence_diagnostics(&trace).unwrap();
        let row = table.get("alpha").unwrap();
        let n = 8.0f64;
        assert_abs_diff_eq!(row.se_mean, row.sd / n.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(row.se_sd, row.sd / (2.0 * n).sqrt(), epsilon = 1e-12);
    }
}
