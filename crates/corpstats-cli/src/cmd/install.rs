//! `corpstats install` / `corpstats uninstall` - publish or withdraw an artifact

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use corpstats_install::{Installer, MarkerStore, SystemRunner};

use crate::config::Config;
use crate::variants::{self, ExportJob};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Variant to install (see `corpstats variants`)
    pub variant: String,
}

fn installer_parts(config: &Config) -> (SystemRunner, MarkerStore) {
    (
        SystemRunner::new(Duration::from_secs(config.remote.timeout_secs)),
        MarkerStore::new(config.remote.marker_dir.clone()),
    )
}

pub fn install(args: InstallArgs, config: &Config) -> Result<()> {
    let variant = variants::lookup(&args.variant)?;
    let job = ExportJob::build(variant, config)?;
    let (runner, markers) = installer_parts(config);

    Installer::new(&runner, &markers)
        .install(
            variant.name,
            &job.output_path,
            &config.remote.host,
            &config.remote.dir,
        )
        .with_context(|| format!("installing {}", variant.name))
}

pub fn uninstall(args: InstallArgs, config: &Config) -> Result<()> {
    let variant = variants::lookup(&args.variant)?;
    let job = ExportJob::build(variant, config)?;
    let (runner, markers) = installer_parts(config);

    Installer::new(&runner, &markers)
        .uninstall(
            variant.name,
            config.corpus_id()?,
            &config.remote.host,
            &config.remote.dir,
            job.codec,
        )
        .with_context(|| format!("uninstalling {}", variant.name))
}
