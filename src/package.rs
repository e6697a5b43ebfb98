use std::io::{Cursor, Write};

use zip::{ZipWriter, write::SimpleFileOptions};

use crate::{
    assets::ImageRecord,
    error::{TidemarkError, TidemarkResult},
};

/// Prefix added to the file name of every composited output.
pub const WATERMARKED_PREFIX: &str = "watermarked_";

/// Builds a zip archive of the batch, preserving each record's directory
/// structure.
///
/// Composited records are stored as `<dir>/watermarked_<stem>.png`;
/// pass-through records (animated, failed, or no-op) keep their original
/// name and bytes. The archive is assembled in memory, so a failure anywhere
/// surfaces as an error and never as a partial file on disk.
#[tracing::instrument(skip_all, fields(count = records.len()))]
pub fn export_archive(records: &[ImageRecord]) -> TidemarkResult<Vec<u8>> {
    if records.is_empty() {
        return Err(TidemarkError::packaging("no images to export"));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for record in records {
        let (name, bytes) = match &record.rendered {
            Some(png) => (
                format!(
                    "{}{}{}.png",
                    record.dir_path(),
                    WATERMARKED_PREFIX,
                    file_stem(record.file_name())
                ),
                png.as_slice(),
            ),
            None => (record.rel_path.clone(), record.bytes.as_slice()),
        };
        writer
            .start_file(&name, options)
            .map_err(|e| TidemarkError::packaging(format!("start entry {name}: {e}")))?;
        writer
            .write_all(bytes)
            .map_err(|e| TidemarkError::packaging(format!("write entry {name}: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| TidemarkError::packaging(format!("finalize archive: {e}")))?;
    Ok(cursor.into_inner())
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}
