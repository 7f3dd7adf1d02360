//! Direct (unprivileged) pseudo-file reads.

use crate::field::INVALID;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads files with the caller's own permissions.
///
/// Failures are data: an unreadable path yields `None`, never an error, so
/// callers can tell "escalate" apart from "give up".
pub trait FileReader: Send + Sync {
    /// Reads the whole file, trimmed.
    fn read(&self, path: &str) -> Option<String>;

    /// Reads the first line, trimmed.
    fn read_line(&self, path: &str) -> Option<String>;

    /// Returns true if the path exists (file or directory).
    fn exists(&self, path: &str) -> bool;
}

/// Reads a file and parses it as an integer, `INVALID` on any failure.
pub fn read_int(reader: &dyn FileReader, path: &str) -> i64 {
    reader
        .read(path)
        .and_then(|content| content.parse::<i64>().ok())
        .unwrap_or(INVALID)
}

/// [`FileReader`] over the real filesystem.
///
/// An optional root prefix re-anchors absolute paths, which lets a fake
/// `/sys` tree stand in for the real one.
#[derive(Debug, Clone, Default)]
pub struct SysfsReader {
    root: Option<PathBuf>,
}

impl SysfsReader {
    /// Creates a reader over the real filesystem.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Creates a reader that resolves absolute paths under `root`.
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl FileReader for SysfsReader {
    fn read(&self, path: &str) -> Option<String> {
        match fs::read_to_string(self.resolve(path)) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                debug!("Direct read of {} failed: {}", path, e);
                None
            }
        }
    }

    fn read_line(&self, path: &str) -> Option<String> {
        let file = match fs::File::open(self.resolve(path)) {
            Ok(file) => file,
            Err(e) => {
                debug!("Direct read of {} failed: {}", path, e);
                return None;
            }
        };

        let mut line = String::new();
        match BufReader::new(file).read_line(&mut line) {
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                debug!("Direct read of {} failed: {}", path, e);
                None
            }
        }
    }

    fn exists(&self, path: &str) -> bool {
        !path.trim().is_empty() && self.resolve(path.trim()).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let freq = dir.path().join("sys/devices/system/cpu/cpu0/cpufreq");
        fs::create_dir_all(&freq).unwrap();
        fs::write(freq.join("scaling_cur_freq"), "1400000\n").unwrap();
        fs::write(freq.join("scaling_governor"), "schedutil\n").unwrap();
        fs::write(dir.path().join("sys/devices/system/cpu/present"), "0-3\n").unwrap();
        fs::write(dir.path().join("multi"), "first line\nsecond line\n").unwrap();
        dir
    }

    #[test]
    fn test_read_trims() {
        let dir = fake_tree();
        let reader = SysfsReader::with_root(dir.path());
        assert_eq!(
            reader.read("/sys/devices/system/cpu/present").as_deref(),
            Some("0-3")
        );
    }

    #[test]
    fn test_read_line_only_first() {
        let dir = fake_tree();
        let reader = SysfsReader::with_root(dir.path());
        assert_eq!(reader.read_line("/multi").as_deref(), Some("first line"));
        assert_eq!(
            reader.read("/multi").as_deref(),
            Some("first line\nsecond line")
        );
    }

    #[test]
    fn test_missing_is_absent() {
        let dir = fake_tree();
        let reader = SysfsReader::with_root(dir.path());
        assert_eq!(reader.read("/sys/class/thermal/thermal_zone0/temp"), None);
        assert_eq!(reader.read_line("/nope"), None);
    }

    #[test]
    fn test_exists() {
        let dir = fake_tree();
        let reader = SysfsReader::with_root(dir.path());
        assert!(reader.exists("/sys/devices/system/cpu/cpu0/cpufreq"));
        assert!(!reader.exists("/sys/devices/system/cpu/cpu1/cpufreq"));
        assert!(!reader.exists(""));
    }

    #[test]
    fn test_read_int() {
        let dir = fake_tree();
        let reader = SysfsReader::with_root(dir.path());
        assert_eq!(
            read_int(
                &reader,
                "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq"
            ),
            1_400_000
        );
        assert_eq!(
            read_int(
                &reader,
                "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor"
            ),
            INVALID
        );
        assert_eq!(read_int(&reader, "/missing"), INVALID);
    }
}
