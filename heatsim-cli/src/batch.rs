use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use heatsim_core::{HeatError, IterationResult, SimulationEngine};
use tracing::{error, info, warn};

use crate::job::{read_job, PlateJob};
use crate::plate::{load_plate, output_name, save_plate};
use crate::report::{job_stem, write_report, ReportRow};
use crate::summary::{PlateStatus, SummaryRow, SummaryWriter};

/// Everything `heatsim run` needs besides the engine.
#[derive(Clone, Debug)]
pub struct BatchOptions {
    pub job: PathBuf,
    /// Defaults to the job file's directory.
    pub output: Option<PathBuf>,
    pub summary: bool,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub report: PathBuf,
}

fn job_dir(job: &Path) -> PathBuf {
    job.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn simulate_plate(
    engine: &SimulationEngine,
    job: &PlateJob,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<(IterationResult, String)> {
    let path = input_dir.join(&job.filename);
    let grid = load_plate(&path).with_context(|| format!("reading {}", path.display()))?;
    let result = engine
        .run(grid, &job.params)
        .with_context(|| format!("simulating {}", job.filename))?;

    let name = output_name(&job.filename, result.states_k);
    let out = output_dir.join(&name);
    save_plate(&out, &result.grid).with_context(|| format!("writing {}", out.display()))?;
    Ok((result, name))
}

fn aborts_batch(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| e.downcast_ref::<HeatError>().is_some_and(HeatError::aborts_batch))
}

/// Simulate every plate of a job file, write the outputs and the report.
///
/// A failing plate is logged and skipped; only running out of memory for a
/// whole plate stops the batch.
pub fn run_batch(engine: &SimulationEngine, opts: &BatchOptions) -> Result<BatchOutcome> {
    let jobs = read_job(&opts.job)?;
    let input_dir = job_dir(&opts.job);
    let output_dir = opts.output.clone().unwrap_or_else(|| input_dir.clone());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let stem = job_stem(&opts.job);
    let mut summary = if opts.summary {
        let path = output_dir.join(format!("{stem}.jsonl"));
        Some(SummaryWriter::create(&path).with_context(|| format!("creating {}", path.display()))?)
    } else {
        None
    };

    info!(plates = jobs.len(), job = %opts.job.display(), "processing job");

    let mut rows = Vec::with_capacity(jobs.len());
    let mut failed = 0;
    for job in &jobs {
        let t0 = Instant::now();
        let outcome = simulate_plate(engine, job, &input_dir, &output_dir);
        let wall_ms = t0.elapsed().as_millis() as u64;

        let row = match &outcome {
            Ok((result, name)) => {
                info!(plate = %job.filename, states_k = result.states_k, output = %name, "plate done");
                SummaryRow {
                    job,
                    status: PlateStatus::Converged,
                    states_k: Some(result.states_k),
                    output: Some(name.clone()),
                    workers: engine.config().workers,
                    backend: engine.config().backend.as_str(),
                    wall_ms,
                    error: None,
                }
            }
            Err(e) => {
                error!(plate = %job.filename, "{e:#}");
                SummaryRow {
                    job,
                    status: PlateStatus::Failed,
                    states_k: None,
                    output: None,
                    workers: engine.config().workers,
                    backend: engine.config().backend.as_str(),
                    wall_ms,
                    error: Some(format!("{e:#}")),
                }
            }
        };
        if let Some(w) = summary.as_mut() {
            w.push(&row)?;
        }

        match outcome {
            Ok((result, _)) => rows.push(ReportRow {
                job: job.clone(),
                states_k: result.states_k,
            }),
            Err(e) => {
                failed += 1;
                if aborts_batch(&e) {
                    warn!("abandoning the remaining plates");
                    return Err(e);
                }
            }
        }
    }

    let report = output_dir.join(format!("{stem}.tsv"));
    write_report(&report, &rows).with_context(|| format!("writing {}", report.display()))?;
    if let Some(w) = summary {
        w.finish()?;
    }

    Ok(BatchOutcome {
        succeeded: rows.len(),
        failed,
        report,
    })
}
