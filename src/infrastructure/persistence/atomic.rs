//! Write-temp, fsync, rename: the durability pattern every persisted file in this crate goes through.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};

/// Writes `bytes` to `path` atomically: the file at `path` either has its
/// old contents or its new contents, never a partial write, even if the
/// process is killed mid-write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> DomainResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(DomainError::from)?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let mut tmp_file = File::create(&tmp_path).map_err(DomainError::from)?;
        tmp_file.write_all(bytes).map_err(DomainError::from)?;
        tmp_file.sync_all().map_err(DomainError::from)?;
    }
    fs::rename(&tmp_path, path).map_err(DomainError::from)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("state");
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Reads `path`, returning `Ok(None)` if it does not exist.
pub fn read_if_exists(path: &Path) -> DomainResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(DomainError::from(err)),
    }
}

/// Append-only, so unlike [`write_atomic`] no temp-file/rename dance is needed -- a
/// crash mid-append leaves prior lines intact and the file still has a legal prefix of
/// newline-terminated records.
pub fn append_jsonl(path: &Path, record: &serde_json::Value) -> DomainResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(DomainError::from)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path).map_err(DomainError::from)?;
    let line = serde_json::to_string(record).map_err(DomainError::from)?;
    writeln!(file, "{line}").map_err(DomainError::from)?;
    file.sync_all().map_err(DomainError::from)?;
    Ok(())
}
