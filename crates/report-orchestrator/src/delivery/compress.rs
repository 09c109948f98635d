//! Artifact compression

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Compress `path` into a sibling `.zip` archive holding the single file.
///
/// `x.txt` becomes `x.zip`. The original is removed only after the archive
/// is complete; a partially written archive is removed on failure. An
/// existing `x.zip` is never overwritten: the call fails and both files are
/// left as they were. Files that already end in `.zip` are returned unchanged.
pub fn compress_file(path: &Path) -> Result<PathBuf> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        return Ok(path.to_path_buf());
    }

    let entry_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::delivery(format!("cannot compress {:?}: no file name", path)))?
        .to_string();
    let archive_path = path.with_extension("zip");

    let input = File::open(path)?;
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&archive_path)
        .map_err(|e| Error::delivery(format!("cannot create archive {:?}: {}", archive_path, e)))?;

    match write_archive(input, output, &entry_name) {
        Ok(()) => {
            std::fs::remove_file(path)?;
            tracing::debug!("Compressed {} -> {:?}", entry_name, archive_path);
            Ok(archive_path)
        }
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(&archive_path) {
                tracing::warn!("Failed to remove partial archive {:?}: {}", archive_path, cleanup);
            }
            Err(e)
        }
    }
}

fn write_archive(input: File, output: File, entry_name: &str) -> Result<()> {
    let mut input = BufReader::new(input);
    let mut zip = ZipWriter::new(BufWriter::new(output));

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    std::io::copy(&mut input, &mut zip)?;
    zip.finish()?;
    Ok(())
}
