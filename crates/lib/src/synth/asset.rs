//! Content fingerprints for asset sources.
//!
//! Assets are keyed by a SHA-256 over their content, so identical sources
//! collapse into one manifest entry and republishing is skipped by `cdk-assets`
//! when nothing changed.

use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::SynthError;

fn io_error(path: &Path, source: std::io::Error) -> SynthError {
  SynthError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Fingerprint a file or a directory tree.
///
/// Directory entries are visited in file name order and contribute their
/// relative path, so renames change the fingerprint while timestamps do not.
pub fn fingerprint(path: &Path) -> Result<String, SynthError> {
  let metadata = fs::metadata(path).map_err(|e| io_error(path, e))?;
  if metadata.is_file() {
    return hash_file(path);
  }

  let mut hasher = Sha256::new();
  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|e| io_error(path, e.into()))?;
    let rel_path = entry
      .path()
      .strip_prefix(path)
      .unwrap_or(entry.path())
      .to_string_lossy()
      .replace('\\', "/");

    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      format!("F:{}:{}", rel_path, hash_file(entry.path())?)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(|e| io_error(entry.path(), e))?;
      format!("L:{}:{}", rel_path, target.to_string_lossy())
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(format!("{:x}", hasher.finalize()))
}

pub fn hash_file(path: &Path) -> Result<String, SynthError> {
  let mut file = fs::File::open(path).map_err(|e| io_error(path, e))?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|e| io_error(path, e))?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(format!("{:x}", hasher.finalize()))
}

pub fn hash_bytes(data: &[u8]) -> String {
  format!("{:x}", Sha256::digest(data))
}
