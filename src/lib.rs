/*!
Post-hoc diagnostics for MCMC sample traces.

Consumes a multi-chain posterior trace (parameter name → `(chains, draws)`
array), estimates effective sample sizes, derives an autocorrelation-based
thinning stride, and summarizes convergence per parameter: pooled moments,
standard errors, autocorrelation time, and the Gelman-Rubin statistic.

# Example

```rust
use mcmc_diag::diagnostics::{convergence_diagnostics, thin};
use mcmc_diag::trace::Trace;
use ndarray::Array2;

// A slowly oscillating signal stands in for correlated posterior draws.
let draws = Array2::from_shape_fn((4, 100), |(c, d)| ((c * 100 + d) as f64).sin());
let trace = Trace::from_samples(vec![("alpha".to_string(), draws)])?;

let thinned = thin(&trace)?;
let table = convergence_diagnostics(&thinned.trace)?;
println!("{table}");
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

pub mod diagnostics;
pub mod ess;
pub mod io;
pub mod stats;
pub mod trace;
