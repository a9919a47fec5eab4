//! CSV to arbitrary waveform payload conversion.
//!
//! The payload is a flat sequence of little-endian IEEE-754 `f32` samples in
//! row-major order, which is what `WVDT ... WAVEDATA` expects for float data.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Extension given to transcoded payload files.
pub const BINARY_EXTENSION: &str = "bin";

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("No such file: '{0}'")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row {row}, column {column}: '{field}' is not a number")]
    Conversion {
        row: usize,
        column: usize,
        field: String,
    },

    #[error("Row {row} has {found} fields, expected {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Payload of {0} bytes is not a whole number of f32 samples")]
    TruncatedPayload(usize),
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    pub binary_path: PathBuf,
    /// Data rows converted (header excluded)
    pub rows: usize,
    pub samples: usize,
}

/// Waveform identifier for a source or payload file: its base name without extension.
pub fn waveform_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Payload path for `csv_path`: the same path with the extension replaced.
pub fn binary_path_for(csv_path: &Path) -> PathBuf {
    csv_path.with_extension(BINARY_EXTENSION)
}

/// Convert `csv_path` into a payload next to it, see [`encode_to`].
pub fn encode(csv_path: &Path) -> Result<EncodeSummary, TranscodeError> {
    encode_to(csv_path, &binary_path_for(csv_path))
}

/// Convert `csv_path` into `bin_path`, creating or overwriting it.
///
/// The first record is dropped without looking at it. Every later record must be
/// fully numeric and as wide as the first data row. On a bad row the rows before it
/// are left flushed in `bin_path` and the error names the row (1-based, header
/// counted as row 1).
pub fn encode_to(csv_path: &Path, bin_path: &Path) -> Result<EncodeSummary, TranscodeError> {
    if !csv_path.is_file() {
        return Err(TranscodeError::NotFound(csv_path.to_path_buf()));
    }

    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let mut writer = BufWriter::new(File::create(bin_path)?);
    let result = write_samples(reader, &mut writer);
    writer.flush()?;
    let (rows, samples) = result?;

    log::info!(
        "Converted {} to {} ({} rows, {} samples)",
        csv_path.display(),
        bin_path.display(),
        rows,
        samples
    );

    Ok(EncodeSummary {
        binary_path: bin_path.to_path_buf(),
        rows,
        samples,
    })
}

fn write_samples<R: Read, W: Write>(
    mut reader: csv::Reader<R>,
    writer: &mut W,
) -> Result<(usize, usize), TranscodeError> {
    let mut width = None;
    let mut rows = 0;
    let mut samples = 0;
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record)? {
        let row = rows + 2;

        let expected = *width.get_or_insert(record.len());
        if record.len() != expected {
            return Err(TranscodeError::RowShape {
                row,
                expected,
                found: record.len(),
            });
        }

        let values = record
            .iter()
            .enumerate()
            .map(|(column, field)| {
                parse_sample(field).ok_or_else(|| TranscodeError::Conversion {
                    row,
                    column: column + 1,
                    field: field.to_string(),
                })
            })
            .collect::<Result<Vec<f32>, _>>()?;

        for value in &values {
            writer.write_f32::<LittleEndian>(*value)?;
        }

        rows += 1;
        samples += values.len();
    }

    Ok((rows, samples))
}

/// A finite number outside the `f32` range does not fit a sample.
fn parse_sample(field: &str) -> Option<f32> {
    let value = field.parse::<f32>().ok()?;
    if value.is_infinite() && field.parse::<f64>().is_ok_and(f64::is_finite) {
        return None;
    }
    Some(value)
}

/// Read a payload file back into samples.
pub fn decode(bin_path: &Path) -> Result<Vec<f32>, TranscodeError> {
    if !bin_path.is_file() {
        return Err(TranscodeError::NotFound(bin_path.to_path_buf()));
    }
    let bytes = std::fs::read(bin_path)?;
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<Vec<f32>, TranscodeError> {
    if bytes.len() % 4 != 0 {
        return Err(TranscodeError::TruncatedPayload(bytes.len()));
    }
    let mut samples = vec![0.0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut samples);
    Ok(samples)
}
