//! Dataset fingerprints used as memoization keys.
//!
//! A fingerprint covers the bytes of both input files plus every parameter
//! that changes how they are interpreted, so any re-ingest that would
//! produce different records or regions produces a different key.

use std::io::Read;
use std::path::Path;

use litter_map_ingest_models::DashboardConfig;

use crate::IngestError;

/// Computes the MD5 hex fingerprint of a dataset as loaded with
/// `region_column` naming the regions.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if either input file cannot be read.
pub fn fingerprint_dataset(
    config: &DashboardConfig,
    region_column: &str,
) -> Result<String, IngestError> {
    let mut context = md5::Context::new();

    consume_file(&mut context, &config.detections.path)?;
    consume_file(&mut context, &config.regions.path)?;
    consume_parameters(&mut context, config, region_column);

    Ok(format!("{:x}", context.finalize()))
}

fn consume_parameters(context: &mut md5::Context, config: &DashboardConfig, region_column: &str) {
    let detections = &config.detections;
    let parameters = format!(
        "{:?}|{}|{:?}|{}|{region_column}|{}",
        detections.coordinates,
        detections.confidence_column,
        detections.class_column,
        detections.litter_class_id,
        config.regions.crs,
    );
    context.consume(parameters.as_bytes());
}

fn consume_file(context: &mut md5::Context, path: &Path) -> Result<(), IngestError> {
    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut buffer = vec![0u8; 256 * 1024]; // 256 KB chunks
    loop {
        let n = file.read(&mut buffer).map_err(io_err)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(())
}
