//! Per-file annotation storage.
//!
//! Annotation storage is owned by the upstream pipeline; this crate only
//! needs to open a named annotation of one source file as a stream of
//! values in token order, and to store derived annotations back.
//!
//! On-disk layout of [`WorkDir`]:
//! ```text
//! {root}/
//! └── {source_file}/
//!     ├── token                       # one line per token
//!     ├── word
//!     └── stats_export.sense_best     # derived annotation
//! ```

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::codec::{Codec, open_reader};
use crate::error::{Error, Result};
use crate::sink::AtomicFile;

/// Values of one annotation for one source file, in token order.
pub type AnnotationStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Read access to stored annotations.
///
/// Implementations are shared across aggregation workers, hence `Sync`.
pub trait AnnotationSource: Sync {
    /// Open `annotation` of `source_file` as a stream of per-token values.
    fn open_stream(&self, source_file: &str, annotation: &str) -> Result<AnnotationStream<'_>>;

    /// Read a whole annotation into memory.
    fn read_all(&self, source_file: &str, annotation: &str) -> Result<Vec<String>> {
        self.open_stream(source_file, annotation)?.collect()
    }
}

/// Write access for derived annotations.
pub trait AnnotationSink {
    fn write_annotation(&self, source_file: &str, annotation: &str, values: &[String])
    -> Result<()>;
}

/// Annotation files in a work directory, optionally compressed.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
    codec: Option<Codec>,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>, codec: Option<Codec>) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn annotation_path(&self, source_file: &str, annotation: &str) -> PathBuf {
        self.root.join(source_file).join(annotation)
    }

    /// Every source file in the work directory (one sub-directory each), sorted.
    pub fn source_files(&self) -> Result<Vec<String>> {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{}/*", root.trim_end_matches('/'));
        let entries = glob::glob(&pattern)
            .map_err(|e| Error::configuration(format!("invalid work directory pattern: {e}")))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                Error::at_path(&path, e.into_error())
            })?;
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name() {
                files.push(name.to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl AnnotationSource for WorkDir {
    fn open_stream(&self, source_file: &str, annotation: &str) -> Result<AnnotationStream<'_>> {
        let path = self.annotation_path(source_file, annotation);
        let reader = open_reader(&path, self.codec)?;
        Ok(Box::new(
            reader
                .lines()
                .map(move |line| line.map_err(|e| Error::at_path(&path, e))),
        ))
    }
}

impl AnnotationSink for WorkDir {
    fn write_annotation(
        &self,
        source_file: &str,
        annotation: &str,
        values: &[String],
    ) -> Result<()> {
        let path = self.annotation_path(source_file, annotation);
        let mut body = Vec::with_capacity(values.iter().map(|v| v.len() + 1).sum());
        for v in values {
            body.extend_from_slice(v.as_bytes());
            body.push(b'\n');
        }

        let mut sink = AtomicFile::create(&path)?;
        match self.codec {
            None => sink.write_all(&body).map_err(|e| Error::at_path(&path, e))?,
            Some(codec) => {
                sink = codec
                    .encode(&mut body.as_slice(), sink)
                    .map_err(|e| Error::at_path(&path, e))?;
            }
        }
        sink.commit()
    }
}

/// In-memory annotations, keyed by (source file, annotation).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    annotations: BTreeMap<(String, String), Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<S: Into<String>>(
        mut self,
        source_file: &str,
        annotation: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.insert(source_file, annotation, values);
        self
    }

    pub fn insert<S: Into<String>>(
        &mut self,
        source_file: &str,
        annotation: &str,
        values: impl IntoIterator<Item = S>,
    ) {
        self.annotations.insert(
            (source_file.to_string(), annotation.to_string()),
            values.into_iter().map(Into::into).collect(),
        );
    }

    /// Source files with at least one annotation, sorted.
    pub fn source_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.annotations.keys().map(|(f, _)| f.clone()).collect();
        files.dedup();
        files
    }
}

impl AnnotationSource for MemorySource {
    fn open_stream(&self, source_file: &str, annotation: &str) -> Result<AnnotationStream<'_>> {
        let values = self
            .annotations
            .get(&(source_file.to_string(), annotation.to_string()))
            .ok_or_else(|| {
                Error::io(
                    format!("{source_file}: annotation '{annotation}'"),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such annotation"),
                )
            })?;
        Ok(Box::new(values.iter().cloned().map(Ok)))
    }
}
