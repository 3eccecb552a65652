//! `corpstats annotate` - derive canonical single-value annotations

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use corpstats_core::{
    DerivationInputs, DerivedAnnotation, ProgressContext, derive_all, fmt_num, span_projection,
    standard_derivations,
};

use super::{open_workdir, source_files};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// Only compute this annotation (e.g. `stats_export.sense_best` or `sense_best`)
    #[arg(long)]
    pub only: Option<String>,
}

pub fn run(args: AnnotateArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let workdir = open_workdir(config)?;
    let files = source_files(config, &workdir)?;

    let mut derivations = derivations_for(config);
    if let Some(only) = args.only.as_deref() {
        derivations.retain(|d| {
            d.output == only || d.output.strip_prefix("stats_export.") == Some(only)
        });
        if derivations.is_empty() {
            anyhow::bail!("no derived annotation named '{only}'");
        }
    }

    if derivations.is_empty() {
        log::info!(
            "Nothing to derive for language '{}' without a date annotation",
            config.corpus.language
        );
        return Ok(());
    }

    for d in &derivations {
        log::debug!("{}: {}", d.output, d.description);
    }
    log::info!(
        "Deriving {} annotations for {} source files",
        derivations.len(),
        fmt_num(files.len())
    );

    let start = Instant::now();
    let pb = progress.files_bar("annotate", files.len());
    let tokens = derive_all(&workdir, &files, &derivations, &pb)
        .with_context(|| format!("deriving annotations in {}", workdir.root().display()))?;

    log::info!(
        "Derived annotations for {} tokens [{:.1}s]",
        fmt_num(tokens),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Derivations the configured corpus supports: the set-selection ones for
/// Swedish, plus date projection when a date annotation is configured.
fn derivations_for(config: &Config) -> Vec<DerivedAnnotation> {
    let names = &config.annotations;
    let mut derivations = Vec::new();
    if config.corpus.is_swedish() {
        derivations = standard_derivations(&DerivationInputs {
            complemgram: &names.complemgram,
            sense: &names.sense,
            baseform: &names.baseform,
            lemgram: &names.lemgram,
        });
    }
    if !names.date.trim().is_empty() {
        derivations.push(span_projection(&names.date, &names.text_parent));
    }
    derivations
}
