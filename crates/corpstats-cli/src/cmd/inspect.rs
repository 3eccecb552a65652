//! `corpstats inspect` - print a produced artifact

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use corpstats_core::{Codec, inspect};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Artifact to read
    pub file: PathBuf,

    /// Codec to read with; disables the fallback to the configured codec
    #[arg(long)]
    pub compression: Option<String>,
}

pub fn run(args: InspectArgs, config: &Config) -> Result<()> {
    let pinned = args.compression.as_deref().map(Codec::from_id).transpose()?;
    let text = inspect(&args.file, pinned, || Some(config.export.compression.clone()))
        .with_context(|| format!("inspecting {}", args.file.display()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
