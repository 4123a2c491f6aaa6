//! The multi-chain sample trace that every diagnostic routine consumes.

use ndarray::prelude::*;
use std::error::Error;
use std::fmt;

/// A posterior sample trace: named parameters, each holding a
/// `(chains, draws)` array of samples.
///
/// All parameters share one shape, and insertion order is preserved; derived
/// tables report their rows in this order. A `Trace` is immutable once built,
/// so every invariant checked by [`Trace::from_samples`] holds for its whole
/// lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    params: Vec<(String, Array2<f64>)>,
}

/// Violations of the trace shape contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// The trace holds no parameters.
    Empty,
    /// A parameter's array shape differs from the first parameter's.
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// A parameter has fewer draws than the requested operation supports.
    TooFewDraws {
        name: String,
        n_draws: usize,
        required: usize,
    },
    /// The trace has fewer chains than the requested operation supports.
    TooFewChains { n_chains: usize, required: usize },
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::Empty => write!(f, "trace holds no parameters"),
            TraceError::ShapeMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "parameter {name:?} has shape {got:?} but the trace shape is {expected:?}"
            ),
            TraceError::TooFewDraws {
                name,
                n_draws,
                required,
            } => write!(
                f,
                "parameter {name:?} has {n_draws} draws but at least {required} are required"
            ),
            TraceError::TooFewChains { n_chains, required } => write!(
                f,
                "trace has {n_chains} chains but at least {required} are required"
            ),
        }
    }
}

impl Error for TraceError {}

impl Trace {
    /// Builds a trace from `(name, samples)` pairs.
    ///
    /// Checks the shape contract: at least one parameter, no empty axes, and
    /// one common `(chains, draws)` shape across all parameters.
    pub fn from_samples(params: Vec<(String, Array2<f64>)>) -> Result<Self, TraceError> {
        let (first_name, first) = params.first().ok_or(TraceError::Empty)?;
        let expected = first.dim();
        if expected.0 == 0 {
            return Err(TraceError::TooFewChains {
                n_chains: 0,
                required: 1,
            });
        }
        if expected.1 == 0 {
            return Err(TraceError::TooFewDraws {
                name: first_name.clone(),
                n_draws: 0,
                required: 1,
            });
        }
        for (name, samples) in &params {
            if samples.dim() != expected {
                return Err(TraceError::ShapeMismatch {
                    name: name.clone(),
                    expected,
                    got: samples.dim(),
                });
            }
        }
        Ok(Self { params })
    }

    /// Number of chains, identical for every parameter.
    pub fn n_chains(&self) -> usize {
        self.params[0].1.nrows()
    }

    /// Number of draws per chain.
    pub fn n_draws(&self) -> usize {
        self.params[0].1.ncols()
    }

    /// Raw sample count: chains times draws.
    pub fn total_samples(&self) -> usize {
        self.n_chains() * self.n_draws()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Always false for a constructed trace; provided for completeness.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    /// Samples of one parameter, if present.
    pub fn get(&self, name: &str) -> Option<ArrayView2<'_, f64>> {
        self.params
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, s)| s.view())
    }

    /// Iterates `(name, samples)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ArrayView2<'_, f64>)> {
        self.params.iter().map(|(n, s)| (n.as_str(), s.view()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_from_samples_ok() {
        let trace = Trace::from_samples(vec![
            ("alpha".to_string(), arr2(&[[1.0, 2.0], [3.0, 4.0]])),
            ("beta".to_string(), arr2(&[[5.0, 6.0], [7.0, 8.0]])),
        ])
        .unwrap();
        assert_eq!(trace.n_chains(), 2);
        assert_eq!(trace.n_draws(), 2);
        assert_eq!(trace.total_samples(), 4);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.names().collect::<Vec<_>>(), vec!["alpha", "beta"]);
        assert_eq!(trace.get("beta").unwrap()[[1, 0]], 7.0);
        assert!(trace.get("gamma").is_none());
    }

    #[test]
    fn test_empty_trace_rejected() {
        let res = Trace::from_samples(vec![]);
        assert_eq!(res.unwrap_err(), TraceError::Empty);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let res = Trace::from_samples(vec![
            ("alpha".to_string(), arr2(&[[1.0, 2.0], [3.0, 4.0]])),
            ("beta".to_string(), arr2(&[[5.0, 6.0, 7.0], [8.0, 9.0, 10.0]])),
        ]);
        assert!(matches!(
            res.unwrap_err(),
            TraceError::ShapeMismatch { name, .. } if name == "beta"
        ));
    }

    #[test]
    fn test_zero_draws_rejected() {
        let res = Trace::from_samples(vec![(
            "alpha".to_string(),
            Array2::<f64>::zeros((2, 0)),
        )]);
        assert!(matches!(res.unwrap_err(), TraceError::TooFewDraws { .. }));
    }

    #[test]
    fn test_iteration_preserves_order() {
        let trace = Trace::from_samples(vec![
            ("z".to_string(), arr2(&[[1.0, 2.0]])),
            ("a".to_string(), arr2(&[[3.0, 4.0]])),
            ("m".to_string(), arr2(&[[5.0, 6.0]])),
        ])
        .unwrap();
        let names: Vec<&str> = trace.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
