//! Atomic file rewrites
//!
//! The JSONL log store rewrites its file whenever retention evicts rows or a
//! row is updated or deleted. Rewrites go through a temp file so a crash
//! leaves either the old log or the new one, never a partial file:
//!
//! 1. Write to `<name>.tmp`
//! 2. `sync_all()` the temp file
//! 3. Rename over the final path

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

/// Atomically replace `path` with whatever `write_fn` produces
pub fn atomic_write_with<P, F>(path: P, write_fn: F) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    write_fn(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Remove `.tmp` files left behind by an interrupted rewrite
pub fn cleanup_temp_files<P: AsRef<Path>>(dir: P) -> io::Result<usize> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(0);
    }

    let mut cleaned = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "tmp").unwrap_or(false) {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed stale temp file");
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_with_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.jsonl");
        fs::write(&path, "old\n").unwrap();

        atomic_write_with(&path, |file| {
            writeln!(file, "line 1")?;
            writeln!(file, "line 2")
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "line 1\nline 2\n");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_failed_write_keeps_old_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.jsonl");
        fs::write(&path, "old\n").unwrap();

        let result = atomic_write_with(&path, |file| {
            writeln!(file, "partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("log.jsonl");

        atomic_write_with(&path, |file| writeln!(file, "x")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_cleanup_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("query_log.tmp"), "partial").unwrap();
        fs::write(temp_dir.path().join("query_log.jsonl"), "keep").unwrap();

        let cleaned = cleanup_temp_files(temp_dir.path()).unwrap();
        assert_eq!(cleaned, 1);
        assert!(!temp_dir.path().join("query_log.tmp").exists());
        assert!(temp_dir.path().join("query_log.jsonl").exists());
    }
}
