//! Compression codecs for artifacts and stored annotations.
//!
//! The codec identifier doubles as the file extension of a compressed
//! artifact (`stats_x.csv` → `stats_x.csv.gz`), and is how a reader picks
//! the decompression strategy back up.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::sink::AtomicFile;

/// Buffer size for decompressing readers (256KB)
const READ_BUF_SIZE: usize = 256 * 1024;

/// Default zstd level, matching the zstd CLI default
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Gzip,
    Bzip2,
    Zstd,
}

impl Codec {
    /// Resolve a codec identifier (`gz`, `bz2`, `zst` and their long names).
    pub fn from_id(id: &str) -> Result<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "gz" | "gzip" => Ok(Self::Gzip),
            "bz2" | "bzip2" => Ok(Self::Bzip2),
            "zst" | "zstd" => Ok(Self::Zstd),
            _ => Err(Error::UnsupportedCodec(id.to_string())),
        }
    }

    /// Canonical identifier, used as file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
            Self::Zstd => "zst",
        }
    }

    /// Append this codec's extension to a file name: `a.csv` → `a.csv.gz`
    pub fn apply_to_name(self, name: &str) -> String {
        format!("{name}.{}", self.extension())
    }

    /// Compress everything from `input` into `output`, returning `output`.
    pub fn encode<R: Read, W: Write>(self, input: &mut R, output: W) -> io::Result<W> {
        match self {
            Self::Gzip => {
                let mut enc = GzEncoder::new(output, Compression::default());
                io::copy(input, &mut enc)?;
                enc.finish()
            }
            Self::Bzip2 => {
                let mut enc = bzip2::write::BzEncoder::new(output, bzip2::Compression::default());
                io::copy(input, &mut enc)?;
                enc.finish()
            }
            Self::Zstd => {
                let mut enc = zstd::stream::write::Encoder::new(output, ZSTD_LEVEL)?;
                io::copy(input, &mut enc)?;
                enc.finish()
            }
        }
    }

    /// Wrap a reader with this codec's decoder.
    pub fn decoder<'a, R: Read + 'a>(self, input: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::Gzip => Box::new(MultiGzDecoder::new(input)),
            Self::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(input)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(input)?),
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Buffered reader over a file, decompressed when `codec` is given.
pub type ArtifactReader = Box<dyn BufRead>;

/// Open `path` for reading, decompressing with `codec` if set.
pub fn open_reader(path: &Path, codec: Option<Codec>) -> Result<ArtifactReader> {
    let file = File::open(path).map_err(|e| Error::at_path(path, e))?;
    Ok(match codec {
        None => Box::new(BufReader::with_capacity(READ_BUF_SIZE, file)),
        Some(codec) => {
            let dec = codec.decoder(file).map_err(|e| Error::at_path(path, e))?;
            Box::new(BufReader::with_capacity(READ_BUF_SIZE, dec))
        }
    })
}

/// Compress `source` into `target` with the codec named by `codec_id`.
///
/// The source artifact is left in place. The target appears atomically.
/// Returns the compressed size in bytes.
pub fn compress(source: &Path, target: &Path, codec_id: &str) -> Result<u64> {
    let codec = Codec::from_id(codec_id)?;
    let mut input = File::open(source).map_err(|e| Error::at_path(source, e))?;
    let sink = AtomicFile::create(target)?;
    let sink = codec
        .encode(&mut input, sink)
        .map_err(|e| Error::io(format!("compressing {} with {codec}", source.display()), e))?;
    sink.commit()?;
    let size = std::fs::metadata(target)
        .map(|m| m.len())
        .map_err(|e| Error::at_path(target, e))?;
    log::info!(
        "Compressed {} → {} ({codec}, {size} bytes)",
        source.display(),
        target.display()
    );
    Ok(size)
}

/// Read a whole artifact as text.
pub fn read_text(path: &Path, codec: Option<Codec>) -> Result<String> {
    let mut reader = open_reader(path, codec)?;
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| Error::at_path(path, e))?;
    Ok(text)
}

/// Read a previously produced artifact for manual review.
///
/// First attempt uses `pinned` (or no codec). If that fails and no codec was
/// pinned, `configured` is asked for the job's configured codec and the read
/// is retried exactly once with it.
pub fn inspect(
    path: &Path,
    pinned: Option<Codec>,
    configured: impl FnOnce() -> Option<String>,
) -> Result<String> {
    if !path.is_file() {
        return Err(Error::io(
            format!("inspecting {}", path.display()),
            io::Error::new(io::ErrorKind::NotFound, "file does not exist"),
        ));
    }

    let first_err = match read_text(path, pinned) {
        Ok(text) => return Ok(text),
        Err(e) => e,
    };

    if let Some(codec) = pinned {
        log::error!("Failed to read {} using compression {codec}", path.display());
        return Err(first_err);
    }
    log::debug!("{}: plain read failed ({first_err})", path.display());

    let Some(id) = configured().filter(|id| !id.trim().is_empty()) else {
        return Err(Error::configuration(format!(
            "failed to read {}; specify the compression codec explicitly",
            path.display()
        )));
    };
    let codec = Codec::from_id(&id)?;
    read_text(path, Some(codec)).inspect_err(|_| {
        log::error!(
            "Failed to read {} using configured compression {codec}",
            path.display()
        );
    })
}
