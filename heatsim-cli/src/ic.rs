use clap::ValueEnum;
use heatsim_core::{Grid, HeatResult};
use rand::Rng;

/// Smallest side the pattern generators can lay out.
pub const MIN_GENERATED_SIDE: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum IcType {
    Gaussians,
    Rectangles,
    SmoothNoise,
    GradientMix,
}

impl IcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IcType::Gaussians => "gaussians",
            IcType::Rectangles => "rectangles",
            IcType::SmoothNoise => "smooth_noise",
            IcType::GradientMix => "gradient_mix",
        }
    }
}

pub fn sample_ic_type<R: Rng>(rng: &mut R) -> IcType {
    match rng.gen_range(0..4) {
        0 => IcType::Gaussians,
        1 => IcType::Rectangles,
        2 => IcType::SmoothNoise,
        _ => IcType::GradientMix,
    }
}

/// Temperatures a generated plate is scaled into.
#[derive(Clone, Copy, Debug)]
pub struct Thermal {
    /// Hottest interior value after normalisation.
    pub peak: f64,
    /// Fixed temperature written on every border cell.
    pub border: f64,
}

/// Build a `rows x columns` plate: pattern in `[0, peak]`, border pinned.
///
/// Both sides must be at least [`MIN_GENERATED_SIDE`].
pub fn generate_ic<R: Rng>(
    rng: &mut R,
    rows: usize,
    columns: usize,
    ic: IcType,
    thermal: Thermal,
) -> HeatResult<Grid> {
    let mut f = vec![0.0f64; rows * columns];
    let (fr, fc) = ((rows - 1) as f64, (columns - 1) as f64);

    match ic {
        IcType::Gaussians => {
            let blobs = rng.gen_range(1..=3);
            for _ in 0..blobs {
                let cx = rng.gen_range(0.15..0.85) * fc;
                let cy = rng.gen_range(0.15..0.85) * fr;
                let sigma = rng.gen_range(1.5..6.0);
                let amp = rng.gen_range(0.6..1.0);
                add_gaussian(&mut f, rows, columns, (cy, cx), sigma, amp);
            }
        }

        IcType::Rectangles => {
            let rects = rng.gen_range(1..=4);
            for _ in 0..rects {
                let x0 = rng.gen_range(1..columns / 2);
                let y0 = rng.gen_range(1..rows / 2);
                let w = rng.gen_range(2..columns / 2);
                let h = rng.gen_range(2..rows / 2);
                let val = rng.gen_range(0.5..1.0);

                let x1 = (x0 + w).min(columns - 2);
                let y1 = (y0 + h).min(rows - 2);

                for y in y0..=y1 {
                    for x in x0..=x1 {
                        let i = y * columns + x;
                        f[i] = f[i].max(val);
                    }
                }
            }
        }

        IcType::SmoothNoise => {
            for v in f.iter_mut() {
                *v = rng.gen_range(0.0..1.0);
            }
            f = box_blur(&f, rows, columns, 2);
        }

        IcType::GradientMix => {
            let dir = rng.gen_range(0..4);
            for y in 0..rows {
                for x in 0..columns {
                    let t = match dir {
                        0 => x as f64 / fc,
                        1 => y as f64 / fr,
                        2 => 1.0 - x as f64 / fc,
                        _ => 1.0 - y as f64 / fr,
                    };
                    f[y * columns + x] = 0.6 * t;
                }
            }
            let cx = rng.gen_range(0.2..0.8) * fc;
            let cy = rng.gen_range(0.2..0.8) * fr;
            let sigma = rng.gen_range(2.0..7.0);
            let amp = rng.gen_range(0.4..0.9);
            add_gaussian(&mut f, rows, columns, (cy, cx), sigma, amp);
        }
    }

    normalize_01(&mut f);

    let mut grid = Grid::from_vec(rows, columns, f)?;
    for r in 0..rows {
        for c in 0..columns {
            let v = if grid.is_border(r, c) {
                thermal.border
            } else {
                grid[(r, c)] * thermal.peak
            };
            grid[(r, c)] = v;
        }
    }
    Ok(grid)
}

fn add_gaussian(
    f: &mut [f64],
    rows: usize,
    columns: usize,
    (cy, cx): (f64, f64),
    sigma: f64,
    amp: f64,
) {
    for y in 0..rows {
        for x in 0..columns {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let r2 = dx * dx + dy * dy;
            f[y * columns + x] += amp * (-0.5 * r2 / (sigma * sigma)).exp();
        }
    }
}

fn normalize_01(f: &mut [f64]) {
    let mx = f.iter().copied().fold(0.0f64, f64::max);
    if mx > 0.0 {
        for v in f.iter_mut() {
            *v = (*v / mx).clamp(0.0, 1.0);
        }
    }
}

fn box_blur(src: &[f64], rows: usize, columns: usize, passes: usize) -> Vec<f64> {
    let mut cur = src.to_vec();
    let mut tmp = vec![0.0f64; rows * columns];

    for _ in 0..passes {
        for y in 0..rows {
            for x in 0..columns {
                let mut sum = 0.0;
                let mut cnt = 0.0;
                for yy in y.saturating_sub(1)..=(y + 1).min(rows - 1) {
                    for xx in x.saturating_sub(1)..=(x + 1).min(columns - 1) {
                        sum += cur[yy * columns + xx];
                        cnt += 1.0;
                    }
                }
                tmp[y * columns + x] = sum / cnt;
            }
        }
        std::mem::swap(&mut cur, &mut tmp);
    }
    cur
}
