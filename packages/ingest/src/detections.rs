//! Detection table ingest.
//!
//! Reads the CSV written by the detection run, checks that the configured
//! columns exist, keeps only litter rows, and produces [`RawDetection`]
//! values with their coordinates exactly as stored.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use litter_map_detection_models::{RawDetection, SourceCoordinates};
use litter_map_ingest_models::{CoordinateSource, DetectionTableConfig};

use crate::IngestError;
use crate::progress::ProgressCallback;

const TABLE: &str = "detections";

/// Rows between progress updates.
const PROGRESS_BATCH: usize = 10_000;

/// Resolved column positions for one table.
struct ColumnLayout {
    confidence: usize,
    class: Option<usize>,
    coordinates: CoordinateColumns,
}

enum CoordinateColumns {
    Geographic { lat: usize, lon: usize },
    Projected { x: usize, y: usize },
    Raster([usize; 6]),
}

impl ColumnLayout {
    fn resolve(headers: &[String], config: &DetectionTableConfig) -> Result<Self, IngestError> {
        let confidence = require_column(headers, &config.confidence_column)?;

        let class = config
            .class_column
            .as_deref()
            .and_then(|name| find_column(headers, name));
        if class.is_none() {
            log::info!("Detection table has no class column, keeping every row");
        }

        let coordinates = match &config.coordinates {
            CoordinateSource::Geographic {
                lat_column,
                lon_column,
            } => CoordinateColumns::Geographic {
                lat: require_column(headers, lat_column)?,
                lon: require_column(headers, lon_column)?,
            },
            CoordinateSource::Projected {
                x_column, y_column, ..
            } => CoordinateColumns::Projected {
                x: require_column(headers, x_column)?,
                y: require_column(headers, y_column)?,
            },
            CoordinateSource::Raster { columns, .. } => CoordinateColumns::Raster([
                require_column(headers, &columns.x1)?,
                require_column(headers, &columns.y1)?,
                require_column(headers, &columns.x2)?,
                require_column(headers, &columns.y2)?,
                require_column(headers, &columns.row)?,
                require_column(headers, &columns.col)?,
            ]),
        };

        Ok(Self {
            confidence,
            class,
            coordinates,
        })
    }
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn require_column(headers: &[String], name: &str) -> Result<usize, IngestError> {
    find_column(headers, name).ok_or_else(|| IngestError::MissingColumn {
        column: name.to_string(),
        table: TABLE.to_string(),
    })
}

/// Reads detections from a CSV file, reporting progress against the
/// file's length.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or any row fails
/// to parse (see [`read_detections`]).
pub fn read_detections_file(
    path: &Path,
    config: &DetectionTableConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<RawDetection>, IngestError> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Reading detections from {}", path.display());
    if let Ok(metadata) = file.metadata() {
        progress.set_total(metadata.len());
    }
    read_detections(file, config, progress)
}

/// Reads detections from CSV data.
///
/// Only rows whose class equals `litter_class_id` are kept when the table
/// has the class column. Retained rows are numbered from zero in table
/// order. Progress is reported in bytes consumed.
///
/// # Errors
///
/// Returns [`IngestError::MissingColumn`] if a configured column is
/// absent, [`IngestError::Malformed`] for unparseable numbers or a
/// confidence outside `[0, 1]`, and [`IngestError::Csv`] for CSV syntax
/// errors.
pub fn read_detections<R: Read>(
    reader: R,
    config: &DetectionTableConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<RawDetection>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let layout = ColumnLayout::resolve(&headers, config)?;

    let mut detections = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut row = 0usize;
    let mut reported = 0u64;
    let mut skipped_class = 0u64;

    while reader.read_record(&mut record)? {
        row += 1;
        if row % PROGRESS_BATCH == 0 {
            let consumed = reader.position().byte();
            progress.inc(consumed - reported);
            reported = consumed;
        }

        let class_id = layout
            .class
            .map(|i| parse_class(field(&record, i), row))
            .transpose()?;
        if class_id.is_some_and(|class| class != config.litter_class_id) {
            skipped_class += 1;
            continue;
        }

        let confidence = parse_number(field(&record, layout.confidence), row, "confidence")?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(malformed(
                row,
                format!("confidence {confidence} outside 0.0-1.0"),
            ));
        }

        let coordinates = match layout.coordinates {
            CoordinateColumns::Geographic { lat, lon } => SourceCoordinates::Geographic {
                lon: parse_number(field(&record, lon), row, "longitude")?,
                lat: parse_number(field(&record, lat), row, "latitude")?,
            },
            CoordinateColumns::Projected { x, y } => SourceCoordinates::Projected {
                x: parse_number(field(&record, x), row, "x")?,
                y: parse_number(field(&record, y), row, "y")?,
            },
            CoordinateColumns::Raster([x1, y1, x2, y2, tile_row, tile_col]) => {
                let x1 = parse_number(field(&record, x1), row, "x1")?;
                let y1 = parse_number(field(&record, y1), row, "y1")?;
                let x2 = parse_number(field(&record, x2), row, "x2")?;
                let y2 = parse_number(field(&record, y2), row, "y2")?;
                let tile_row = parse_number(field(&record, tile_row), row, "row")?;
                let tile_col = parse_number(field(&record, tile_col), row, "col")?;
                SourceCoordinates::Pixel {
                    col: tile_col + (x1 + x2) / 2.0,
                    row: tile_row + (y1 + y2) / 2.0,
                }
            }
        };

        detections.push(RawDetection {
            id: detections.len(),
            confidence,
            class_id,
            coordinates,
        });
    }

    progress.inc(reader.position().byte().saturating_sub(reported));
    progress.finish(format!("{} detections", detections.len()));

    if skipped_class > 0 {
        log::info!("Skipped {skipped_class} non-litter rows");
    }
    log::info!("Read {} detections from {row} rows", detections.len());

    Ok(detections)
}

fn field(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("")
}

fn parse_number(value: &str, row: usize, what: &str) -> Result<f64, IngestError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed(row, format!("invalid {what} '{value}'")))
}

/// Class labels are integers but some exports write them as `1.0`.
fn parse_class(value: &str, row: usize) -> Result<i64, IngestError> {
    if let Ok(class) = value.parse::<i64>() {
        return Ok(class);
    }
    match value.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(v) if v.fract() == 0.0 && v.abs() < 1e15 => Ok(v as i64),
        _ => Err(malformed(row, format!("invalid class '{value}'"))),
    }
}

fn malformed(row: usize, message: String) -> IngestError {
    IngestError::Malformed {
        table: TABLE.to_string(),
        record: row,
        message,
    }
}
