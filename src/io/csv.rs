/*!
# CSV Persistence for Sample Traces

Saves and re-loads multi-chain traces as CSV files. Enable via the `csv`
feature.
*/

use crate::trace::Trace;
use csv::{Reader, Writer};
use ndarray::Array2;
use std::error::Error;
use std::fs::File;
use std::path::Path;

/// Saves a trace as a CSV file.
///
/// The header row holds `"chain"`, `"draw"`, and one column per parameter in
/// trace order; each subsequent row holds the samples of one `(chain, draw)`
/// pair.
///
/// # Arguments
///
/// * `trace` - The trace to persist.
/// * `path` - The file path where the CSV data will be written.
///
/// # Returns
///
/// Returns `Ok(())` if successful, or an error if any I/O or CSV formatting
/// issue occurs.
pub fn save_csv<P: AsRef<Path>>(trace: &Trace, path: P) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(path)?);

    let mut header = vec!["chain".to_string(), "draw".to_string()];
    header.extend(trace.names().map(str::to_string));
    wtr.write_record(&header)?;

    for chain in 0..trace.n_chains() {
        for draw in 0..trace.n_draws() {
            let mut record = vec![chain.to_string(), draw.to_string()];
            record.extend(trace.iter().map(|(_, s)| s[[chain, draw]].to_string()));
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Loads a trace previously written by [`save_csv`].
///
/// Chain and draw indices are taken from the first two columns, so row order
/// does not matter. The shape contract is re-validated through the `Trace`
/// constructor.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Trace, Box<dyn Error>> {
    let mut rdr = Reader::from_reader(File::open(path)?);
    let headers = rdr.headers()?.clone();
    if headers.len() < 3 {
        return Err(format!(
            "expected chain, draw and at least one parameter column, got {} columns",
            headers.len()
        )
        .into());
    }
    let names: Vec<String> = headers.iter().skip(2).map(str::to_string).collect();

    let mut rows: Vec<(usize, usize, Vec<f64>)> = Vec::new();
    let mut n_chains = 0;
    let mut n_draws = 0;
    for record in rdr.records() {
        let record = record?;
        let chain: usize = record.get(0).ok_or("missing chain column")?.parse()?;
        let draw: usize = record.get(1).ok_or("missing draw column")?.parse()?;
        let values = record
            .iter()
            .skip(2)
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()?;
        if values.len() != names.len() {
            return Err(format!(
                "row ({chain}, {draw}) has {} values for {} parameters",
                values.len(),
                names.len()
            )
            .into());
        }
        n_chains = n_chains.max(chain + 1);
        n_draws = n_draws.max(draw + 1);
        rows.push((chain, draw, values));
    }

    let mut arrays: Vec<Array2<f64>> = vec![Array2::zeros((n_chains, n_draws)); names.len()];
    for (chain, draw, values) in rows {
        for (array, value) in arrays.iter_mut().zip(values) {
            array[[chain, draw]] = value;
        }
    }
    Ok(Trace::from_samples(
        names.into_iter().zip(arrays).collect(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use tempfile::NamedTempFile;

    #[test]
    fn test_csv_round_trip() {
        let trace = Trace::from_samples(vec![
            ("alpha".to_string(), arr2(&[[1.0, 2.5], [3.0, -4.25]])),
            ("beta".to_string(), arr2(&[[0.5, 0.25], [0.125, 0.0625]])),
        ])
        .unwrap();

        let file = NamedTempFile::new().unwrap();
        save_csv(&trace, file.path()).unwrap();
        let loaded = load_csv(file.path()).unwrap();
        assert_eq!(loaded, trace);
    }

    #[test]
    fn test_load_rejects_headerless_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "chain,draw\n0,0\n").unwrap();
        assert!(load_csv(file.path()).is_err());
    }

    #[test]
    fn test_load_empty_body_rejected() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "chain,draw,alpha\n").unwrap();
        // No rows means no chains, which the trace constructor rejects.
        assert!(load_csv(file.path()).is_err());
    }
}
