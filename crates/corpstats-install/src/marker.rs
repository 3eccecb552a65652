//! Install/uninstall markers: the externalized state of each variant
//!
//! Directory layout:
//! ```text
//! {marker_dir}/
//! ├── install_{variant}_marker      # present => Installed
//! └── uninstall_{variant}_marker    # present => Uninstalled
//! ```
//!
//! Only presence matters. The JSON body is for operators reading the
//! directory by hand.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use corpstats_core::{AtomicFile, Error, Result};
use serde::{Deserialize, Serialize};

/// Which direction a marker records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Install,
    Uninstall,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

/// State of one variant as seen through its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Installed,
    Uninstalled,
    /// Neither marker exists yet.
    Unknown,
}

impl std::fmt::Display for MarkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Installed => "installed",
            Self::Uninstalled => "uninstalled",
            Self::Unknown => "-",
        })
    }
}

/// Body of a marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub direction: Direction,
    pub variant: String,
    /// File name of the installed or removed artifact.
    pub artifact: String,
    /// Where it went, as given to the transport.
    pub destination: String,
    /// Blake3 of the artifact at install time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl MarkerRecord {
    pub fn new(direction: Direction, variant: &str, artifact: &str, destination: &str) -> Self {
        Self {
            direction,
            variant: variant.to_string(),
            artifact: artifact.to_string(),
            destination: destination.to_string(),
            blake3: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_hash(mut self, hash: blake3::Hash) -> Self {
        self.blake3 = Some(hash.to_hex().to_string());
        self
    }
}

/// Hash a file's contents with blake3.
pub fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(path)?;
    Ok(hasher.finalize())
}

/// Marker files for all variants in one directory.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, direction: Direction, variant: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{variant}_marker", direction.prefix()))
    }

    pub fn exists(&self, direction: Direction, variant: &str) -> bool {
        self.path(direction, variant).is_file()
    }

    pub fn state(&self, variant: &str) -> MarkerState {
        if self.exists(Direction::Install, variant) {
            MarkerState::Installed
        } else if self.exists(Direction::Uninstall, variant) {
            MarkerState::Uninstalled
        } else {
            MarkerState::Unknown
        }
    }

    /// Write (or overwrite) a marker atomically.
    pub fn write(&self, record: &MarkerRecord) -> Result<()> {
        let path = self.path(record.direction, &record.variant);
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| Error::io(format!("serializing {}", path.display()), e.into()))?;
        let mut sink = AtomicFile::create(&path)?;
        sink.write_all(json.as_bytes())
            .map_err(|e| Error::at_path(&path, e))?;
        sink.commit()?;
        log::debug!("Wrote marker {}", path.display());
        Ok(())
    }

    /// Read a marker body, `None` when absent.
    pub fn read(&self, direction: Direction, variant: &str) -> Result<Option<MarkerRecord>> {
        let path = self.path(direction, variant);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::at_path(&path, e)),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| Error::io(format!("parsing {}", path.display()), e.into()))
    }

    /// Remove a marker; absent is fine.
    pub fn remove(&self, direction: Direction, variant: &str) -> Result<()> {
        let path = self.path(direction, variant);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed marker {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::at_path(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn marker_paths() {
        let store = MarkerStore::new("/m");
        assert_eq!(
            store.path(Direction::Install, "freq_list"),
            PathBuf::from("/m/install_freq_list_marker")
        );
        assert_eq!(
            store.path(Direction::Uninstall, "freq_list_compressed"),
            PathBuf::from("/m/uninstall_freq_list_compressed_marker")
        );
    }

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let store = MarkerStore::new(dir.path().join("markers"));
        assert_eq!(store.state("freq_list"), MarkerState::Unknown);

        let record = MarkerRecord::new(Direction::Install, "freq_list", "stats_x.csv", "/srv")
            .with_hash(blake3::hash(b"x"));
        store.write(&record).unwrap();
        assert_eq!(store.state("freq_list"), MarkerState::Installed);

        let back = store.read(Direction::Install, "freq_list").unwrap().unwrap();
        assert_eq!(back.artifact, "stats_x.csv");
        assert_eq!(back.blake3, record.blake3);

        store.remove(Direction::Install, "freq_list").unwrap();
        store.remove(Direction::Install, "freq_list").unwrap();
        assert!(store.read(Direction::Install, "freq_list").unwrap().is_none());
    }

    #[test]
    fn hash_file_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, b"file content").unwrap();
        assert_eq!(hash_file(&path).unwrap(), blake3::hash(b"file content"));
    }
}
