pub mod annotate;
pub mod export;
pub mod install;
pub mod inspect;
pub mod variants;

use anyhow::{Context, Result};
use corpstats_core::{Codec, WorkDir};

use crate::config::Config;

/// Work directory holding the corpus annotations.
pub fn open_workdir(config: &Config) -> Result<WorkDir> {
    let codec = config
        .workdir
        .compression
        .as_deref()
        .map(Codec::from_id)
        .transpose()?;
    let root = &config.workdir.root;
    if !root.is_dir() {
        anyhow::bail!("work directory {} does not exist", root.display());
    }
    Ok(WorkDir::new(root.clone(), codec))
}

/// Configured source files, or every entry of the work directory.
pub fn source_files(config: &Config, workdir: &WorkDir) -> Result<Vec<String>> {
    if !config.corpus.source_files.is_empty() {
        return Ok(config.corpus.source_files.clone());
    }
    let files = workdir
        .source_files()
        .with_context(|| format!("listing {}", workdir.root().display()))?;
    if files.is_empty() {
        anyhow::bail!("no source files found in {}", workdir.root().display());
    }
    Ok(files)
}
