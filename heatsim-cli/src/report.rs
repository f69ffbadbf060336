use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::DateTime;

use crate::job::PlateJob;

/// One finished plate as it appears in the `.tsv` report.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub job: PlateJob,
    pub states_k: u64,
}

impl ReportRow {
    pub fn to_tsv(&self) -> String {
        let p = &self.job.params;
        let simulated = self.states_k as f64 * p.delta_t;
        format!(
            "{}\t{:.6}\t{:.6}\t{:.6}\t{}\t{}\t{}",
            self.job.filename,
            p.delta_t,
            p.alpha,
            p.h,
            format_g(p.epsilon),
            self.states_k,
            format_time(simulated as i64),
        )
    }
}

/// Seconds since the epoch as `YYYY/MM/DD<TAB>hh:mm:ss` (UTC).
pub fn format_time(seconds: i64) -> String {
    match DateTime::from_timestamp(seconds, 0) {
        Some(t) => t.format("%Y/%m/%d\t%H:%M:%S").to_string(),
        None => format!("{seconds}s"),
    }
}

/// Shortest of fixed or scientific notation with six significant digits,
/// trailing zeros removed (`printf("%g")`).
pub fn format_g(v: f64) -> String {
    const PRECISION: i32 = 6;

    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    // Let the formatter do the rounding so the exponent is the rounded one.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        trim_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.')
}

/// `jobs/job001.txt` reports into `job001.tsv`.
pub fn job_stem(job_path: &Path) -> &str {
    job_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report")
}

pub fn write_report(path: &Path, rows: &[ReportRow]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for row in rows {
        writeln!(w, "{}", row.to_tsv())?;
    }
    w.flush()
}
