//! Finding dataset files on disk.

use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ImportError, ImportResult};

/// A dataset file found by [`discover_dataset_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub path: PathBuf,
    /// Dataset name (file stem).
    pub name: String,
    pub size_bytes: u64,
}

impl fmt::Display for DatasetFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<40} {:>12}", self.name, format_size(self.size_bytes))
    }
}

/// List `*.json` files under `dir`, sorted by path.
///
/// With `recursive`, subdirectories are walked too. Backups written by the cleaner
/// (`*.json.backup`) never match.
pub fn discover_dataset_files(dir: impl AsRef<Path>, recursive: bool) -> ImportResult<Vec<DatasetFile>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ImportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("dataset directory not found: {}", dir.display()),
        )));
    }

    let mut paths = if recursive {
        walk_json_files(dir)?
    } else {
        glob_json_files(dir)?
    };
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let size_bytes = std::fs::metadata(&path)?.len();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        out.push(DatasetFile {
            path,
            name,
            size_bytes,
        });
    }
    Ok(out)
}

fn glob_json_files(dir: &Path) -> ImportResult<Vec<PathBuf>> {
    let base = dir.to_str().ok_or_else(|| {
        ImportError::structural(format!("directory path is not utf-8: {}", dir.display()))
    })?;
    let pattern = format!("{}/*.json", glob::Pattern::escape(base));
    let entries = glob::glob(&pattern).map_err(|e| ImportError::Config {
        message: format!("invalid glob pattern '{pattern}': {e}"),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ImportError::Io(e.into()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn walk_json_files(dir: &Path) -> ImportResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            ImportError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg)),
            )
        })?;
        let is_json = entry.path().extension().and_then(|s| s.to_str()) == Some("json");
        if entry.file_type().is_file() && is_json {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Human-readable byte count (`1.50 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("docstore-import-discovery-{nanos}"));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        dir
    }

    #[test]
    fn finds_sorted_json_files_and_ignores_backups() {
        let dir = tmp_dir();
        std::fs::write(dir.join("b.json"), "{}").unwrap();
        std::fs::write(dir.join("a.json"), "{\"t\": []}").unwrap();
        std::fs::write(dir.join("a.json.backup"), "{}").unwrap();
        std::fs::write(dir.join("notes.txt"), "x").unwrap();
        std::fs::write(dir.join("nested").join("c.json"), "{}").unwrap();

        let flat = discover_dataset_files(&dir, false).unwrap();
        let names: Vec<&str> = flat.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(flat[0].size_bytes, 9);

        let deep = discover_dataset_files(&dir, true).unwrap();
        assert_eq!(deep.len(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = discover_dataset_files("/definitely/not/here", false).unwrap_err();
        assert!(matches!(err, ImportError::Io(_)));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
