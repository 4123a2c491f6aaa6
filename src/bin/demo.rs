//! Synthesizes an autocorrelated multi-chain trace, thins it by its
//! autocorrelation time, and prints the per-parameter convergence table.
//!
//! Run with `RUST_LOG=info` to see the thinning decisions as they are made.

use mcmc_diag::diagnostics::{convergence_diagnostics, thin};
use mcmc_diag::trace::Trace;
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::error::Error;

const N_CHAINS: usize = 4;
const N_DRAWS: usize = 5_000;
const SEED: u64 = 42;

/// AR(1) chains with coefficient `phi`; every chain gets its own seed.
fn ar1_trace(phi: f64, seed: u64) -> Array2<f64> {
    let mut out = Array2::zeros((N_CHAINS, N_DRAWS));
    for chain in 0..N_CHAINS {
        let mut rng = SmallRng::seed_from_u64(seed + chain as u64);
        let mut x = 0.0;
        for draw in 0..N_DRAWS {
            let eps: f64 = rng.sample(StandardNormal);
            x = phi * x + eps;
            out[[chain, draw]] = x;
        }
    }
    out
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let trace = Trace::from_samples(vec![
        ("alpha".to_string(), ar1_trace(0.9, SEED)),
        ("beta".to_string(), ar1_trace(0.5, SEED + 100)),
    ])?;
    println!(
        "raw trace: {} chains x {} draws, {} parameters",
        trace.n_chains(),
        trace.n_draws(),
        trace.len()
    );

    let thinned = thin(&trace)?;
    println!(
        "thinned by {} (tau {:.2}): {} draws per chain remain",
        thinned.interval,
        thinned.tau,
        thinned.trace.n_draws()
    );

    let table = convergence_diagnostics(&thinned.trace)?;
    println!("{table}");

    #[cfg(feature = "csv")]
    {
        let out_path = "/tmp/thinned-trace.csv";
        mcmc_diag::io::csv::save_csv(&thinned.trace, out_path)?;
        println!("saved thinned trace to {out_path}");
    }

    Ok(())
}
