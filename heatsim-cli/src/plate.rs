//! Binary plate files: little-endian `u64 rows`, `u64 columns`, then the
//! cells as row-major `f64`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use heatsim_core::{Grid, HeatError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlateError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("plate header truncated")]
    TruncatedHeader,

    #[error("plate data ends in row {row} of {rows}")]
    TruncatedData { row: usize, rows: usize },

    #[error("plate dimensions {rows}x{columns} do not fit in memory")]
    TooLarge { rows: u64, columns: u64 },

    #[error("plate header claims {expected} bytes, file holds {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("plate storage")]
    Grid(#[from] HeatError),
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, PlateError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => PlateError::TruncatedHeader,
        _ => PlateError::Io(e),
    })?;
    Ok(u64::from_le_bytes(buf))
}

/// Dimensions as stored in the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Header {
    rows: u64,
    columns: u64,
}

impl Header {
    fn read<R: Read>(r: &mut R) -> Result<Header, PlateError> {
        Ok(Header {
            rows: read_u64(r)?,
            columns: read_u64(r)?,
        })
    }

    fn too_large(&self) -> PlateError {
        PlateError::TooLarge {
            rows: self.rows,
            columns: self.columns,
        }
    }

    /// Size of the whole file this header describes.
    fn file_len(&self) -> Result<u64, PlateError> {
        self.rows
            .checked_mul(self.columns)
            .and_then(|cells| cells.checked_mul(8))
            .and_then(|bytes| bytes.checked_add(16))
            .ok_or_else(|| self.too_large())
    }
}

pub fn read_plate<R: Read>(r: &mut R) -> Result<Grid, PlateError> {
    let header = Header::read(r)?;
    read_cells(r, header)
}

fn read_cells<R: Read>(r: &mut R, header: Header) -> Result<Grid, PlateError> {
    let rows = usize::try_from(header.rows).map_err(|_| header.too_large())?;
    let columns = usize::try_from(header.columns).map_err(|_| header.too_large())?;
    let row_bytes = columns.checked_mul(8).ok_or_else(|| header.too_large())?;

    let mut grid = Grid::new(rows, columns)?;
    let mut buf = vec![0u8; row_bytes];
    for row in 0..rows {
        r.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => PlateError::TruncatedData { row, rows },
            _ => PlateError::Io(e),
        })?;
        for (cell, bytes) in grid.row_mut(row).iter_mut().zip(buf.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            *cell = f64::from_le_bytes(raw);
        }
    }
    Ok(grid)
}

pub fn write_plate<W: Write>(w: &mut W, grid: &Grid) -> io::Result<()> {
    w.write_all(&(grid.rows() as u64).to_le_bytes())?;
    w.write_all(&(grid.columns() as u64).to_le_bytes())?;
    for &x in grid.cells() {
        w.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

/// Read a plate file, rejecting a header that disagrees with the file size
/// before any cell storage is reserved.
pub fn load_plate(path: &Path) -> Result<Grid, PlateError> {
    let file = File::open(path)?;
    let actual = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header = Header::read(&mut reader)?;
    let expected = header.file_len()?;
    if expected != actual {
        return Err(PlateError::SizeMismatch { expected, actual });
    }
    read_cells(&mut reader, header)
}

pub fn save_plate(path: &Path, grid: &Grid) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_plate(&mut writer, grid)?;
    writer.flush()
}

/// `plate001.bin` at 42 iterations becomes `plate001-42.bin`.
pub fn output_name(plate_filename: &str, states_k: u64) -> String {
    let base = Path::new(plate_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(plate_filename);
    let stem = base.split('.').next().unwrap_or(base);
    format!("{stem}-{states_k}.bin")
}
