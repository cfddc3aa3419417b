use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;

use crate::Result;

/// Opens a file for appending, creating it and any missing parent
/// directories first.
pub fn open_file_for_append<P: AsRef<Path>>(path: P) -> Result<File> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}
