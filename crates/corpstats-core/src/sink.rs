//! Output sink with atomic tmp→rename publication

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Buffer size for artifact writes (256KB)
const WRITE_BUF_SIZE: usize = 256 * 1024;

/// Buffered file writer that only becomes visible at its final path on
/// [`commit`](AtomicFile::commit). Dropping it uncommitted removes the tmp file,
/// so a failed write never leaves a truncated artifact behind.
pub struct AtomicFile {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl std::fmt::Debug for AtomicFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicFile")
            .field("final_path", &self.final_path)
            .finish_non_exhaustive()
    }
}

/// Sibling tmp path used while `path` is being written.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl AtomicFile {
    /// Create a tmp file next to `final_path`, creating parent directories.
    pub fn create(final_path: &Path) -> Result<Self> {
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::at_path(parent, e))?;
        }
        let tmp_path = tmp_path_for(final_path);

        // Clean up stale tmp file
        if tmp_path.exists() {
            log::warn!("Removing stale tmp file: {}", tmp_path.display());
            fs::remove_file(&tmp_path).map_err(|e| Error::at_path(&tmp_path, e))?;
        }

        let file = File::create(&tmp_path).map_err(|e| Error::at_path(&tmp_path, e))?;
        Ok(Self {
            writer: Some(BufWriter::with_capacity(WRITE_BUF_SIZE, file)),
            tmp_path,
            final_path: final_path.to_path_buf(),
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush, sync, and atomically rename tmp → final
    pub fn commit(mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let file = writer
            .into_inner()
            .map_err(|e| Error::at_path(&self.tmp_path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| Error::at_path(&self.tmp_path, e))?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path).map_err(|e| {
            Error::io(
                format!(
                    "renaming {} → {}",
                    self.tmp_path.display(),
                    self.final_path.display()
                ),
                e,
            )
        })
    }

    fn inner(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "sink already committed"))
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Remove stale .tmp files in a directory
pub fn cleanup_tmp_files(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
