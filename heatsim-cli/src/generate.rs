use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use heatsim_core::SimulationParams;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::ic::{generate_ic, sample_ic_type, IcType, Thermal, MIN_GENERATED_SIDE};
use crate::job::{format_line, PlateJob};
use crate::plate::save_plate;

#[derive(Clone, Debug)]
pub struct GenerateOptions {
    pub out: PathBuf,
    pub job_name: String,
    pub plates: usize,
    pub rows: usize,
    pub columns: usize,
    pub seed: u64,
    /// Sampled per plate when unset.
    pub ic: Option<IcType>,
    pub thermal: Thermal,
    pub params: SimulationParams,
}

/// Stable per-plate seed, independent of how many plates are generated.
pub fn plate_seed(base: u64, idx: usize) -> u64 {
    base ^ (idx as u64).wrapping_mul(0x9E3779B97F4A7C15)
}

/// Write `plates` random plates and a job file listing them.
pub fn generate(opts: &GenerateOptions) -> Result<PathBuf> {
    if opts.rows < MIN_GENERATED_SIDE || opts.columns < MIN_GENERATED_SIDE {
        bail!(
            "generated plates need at least {MIN_GENERATED_SIDE}x{MIN_GENERATED_SIDE} cells, got {}x{}",
            opts.rows,
            opts.columns
        );
    }
    if opts.plates == 0 {
        bail!("--plates must be at least 1");
    }
    opts.params.validate()?;

    fs::create_dir_all(&opts.out)
        .with_context(|| format!("creating {}", opts.out.display()))?;

    let job_path = opts.out.join(&opts.job_name);
    let mut job = BufWriter::new(
        File::create(&job_path).with_context(|| format!("creating {}", job_path.display()))?,
    );
    writeln!(
        job,
        "# {} plates, {}x{}, seed {}",
        opts.plates, opts.rows, opts.columns, opts.seed
    )?;

    for idx in 0..opts.plates {
        let mut rng = ChaCha8Rng::seed_from_u64(plate_seed(opts.seed, idx));
        let ic = opts.ic.unwrap_or_else(|| sample_ic_type(&mut rng));
        let grid = generate_ic(&mut rng, opts.rows, opts.columns, ic, opts.thermal)?;

        let filename = format!("plate{:03}.bin", idx + 1);
        write_plate_file(&opts.out, &filename, &grid)?;
        debug!(plate = %filename, ic = ic.as_str(), "generated");

        let line = format_line(&PlateJob {
            filename,
            params: opts.params,
        });
        writeln!(job, "{line}")?;
    }
    job.flush()?;

    info!(plates = opts.plates, job = %job_path.display(), "dataset written");
    Ok(job_path)
}

fn write_plate_file(dir: &Path, filename: &str, grid: &heatsim_core::Grid) -> Result<()> {
    let path = dir.join(filename);
    save_plate(&path, grid).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::read_job;
    use crate::plate::load_plate;

    fn options(out: PathBuf) -> GenerateOptions {
        GenerateOptions {
            out,
            job_name: "job001.txt".into(),
            plates: 3,
            rows: 8,
            columns: 10,
            seed: 7,
            ic: None,
            thermal: Thermal {
                peak: 100.0,
                border: 0.0,
            },
            params: SimulationParams::new(0.1, 0.01, 1.0, 0.5),
        }
    }

    #[test]
    fn writes_plates_and_a_job_listing_them() {
        let dir = tempfile::tempdir().unwrap();
        let job = generate(&options(dir.path().to_path_buf())).unwrap();

        let jobs = read_job(&job).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[2].filename, "plate003.bin");
        assert_eq!(jobs[0].params, SimulationParams::new(0.1, 0.01, 1.0, 0.5));

        let grid = load_plate(&dir.path().join("plate001.bin")).unwrap();
        assert_eq!((grid.rows(), grid.columns()), (8, 10));
    }

    #[test]
    fn same_seed_same_plates() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        generate(&options(a.path().to_path_buf())).unwrap();
        generate(&options(b.path().to_path_buf())).unwrap();
        for name in ["plate001.bin", "plate002.bin", "plate003.bin"] {
            assert_eq!(
                fs::read(a.path().join(name)).unwrap(),
                fs::read(b.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn rejects_small_plates() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path().to_path_buf());
        opts.rows = MIN_GENERATED_SIDE - 1;
        assert!(generate(&opts).is_err());
    }

    #[test]
    fn seeds_differ_per_plate() {
        assert_ne!(plate_seed(1, 0), plate_seed(1, 1));
        assert_eq!(plate_seed(1, 0), 1);
    }
}
