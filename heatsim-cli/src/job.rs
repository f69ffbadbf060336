use std::fs;
use std::path::{Path, PathBuf};

use heatsim_core::SimulationParams;
use serde::Serialize;
use thiserror::Error;

/// One line of a job file: which plate, and how to simulate it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlateJob {
    pub filename: String,
    #[serde(flatten)]
    pub params: SimulationParams,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("cannot read job file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("job line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("job file {path} lists no plates")]
    Empty { path: PathBuf },
}

/// `<plate> <delta_t> <alpha> <h> <epsilon>` per line; `#` starts a comment.
pub fn parse_job(text: &str) -> Result<Vec<PlateJob>, JobError> {
    let mut jobs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        jobs.push(parse_line(line, idx + 1)?);
    }
    Ok(jobs)
}

fn parse_line(line: &str, number: usize) -> Result<PlateJob, JobError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(JobError::Parse {
            line: number,
            message: format!("expected 5 fields, found {}", fields.len()),
        });
    }

    let mut values = [0.0f64; 4];
    for (slot, (name, text)) in values
        .iter_mut()
        .zip(["delta_t", "alpha", "h", "epsilon"].into_iter().zip(&fields[1..]))
    {
        *slot = text.parse().map_err(|e| JobError::Parse {
            line: number,
            message: format!("{name} {text:?}: {e}"),
        })?;
    }

    let [delta_t, alpha, h, epsilon] = values;
    Ok(PlateJob {
        filename: fields[0].to_string(),
        params: SimulationParams::new(delta_t, alpha, h, epsilon),
    })
}

pub fn read_job(path: &Path) -> Result<Vec<PlateJob>, JobError> {
    let text = fs::read_to_string(path).map_err(|source| JobError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let jobs = parse_job(&text)?;
    if jobs.is_empty() {
        return Err(JobError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(jobs)
}

/// Render a job back to its line form.
pub fn format_line(job: &PlateJob) -> String {
    let p = &job.params;
    format!(
        "{} {} {} {} {}",
        job.filename, p.delta_t, p.alpha, p.h, p.epsilon
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_comments() {
        let text = "# plates\nplate001.bin 1200 127 1000 2\n\n  plate002.bin\t60 0.08 450 0.075  \n";
        let jobs = parse_job(text).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].filename, "plate001.bin");
        assert_eq!(jobs[0].params, SimulationParams::new(1200.0, 127.0, 1000.0, 2.0));
        assert_eq!(jobs[1].params.epsilon, 0.075);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_job("a.bin 1 1 1 1\nb.bin 1 x 1 1\n").unwrap_err();
        match err {
            JobError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("alpha"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_field_count_is_an_error() {
        assert!(matches!(
            parse_job("a.bin 1 1 1\n"),
            Err(JobError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn line_round_trip() {
        let job = PlateJob {
            filename: "p.bin".into(),
            params: SimulationParams::new(0.5, 0.25, 1.0, 0.001),
        };
        assert_eq!(parse_job(&format_line(&job)).unwrap(), vec![job]);
    }

    #[test]
    fn empty_job_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.txt");
        fs::write(&path, "# nothing\n").unwrap();
        assert!(matches!(read_job(&path), Err(JobError::Empty { .. })));
    }
}
