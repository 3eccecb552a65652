//! `corpstats export` - build a variant's frequency table

use anyhow::{Context, Result};
use clap::Args;
use corpstats_core::{
    AggregateConfig, ProgressContext, aggregate, cleanup_tmp_files, compress, fmt_num, write_table,
};

use super::{open_workdir, source_files};
use crate::config::Config;
use crate::variants::{self, ExportJob};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Variant to export (see `corpstats variants`)
    pub variant: String,

    /// Rebuild even if the artifact already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: ExportArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let variant = variants::lookup(&args.variant)?;
    let job = ExportJob::build(variant, config)?;

    if job.output_path.exists() && !args.force {
        log::info!(
            "{} already exists, skipping (use --force to rebuild)",
            job.output_path.display()
        );
        return Ok(());
    }

    if !variant.compressed {
        return write_frequency_list(&job, config, progress);
    }

    let base_variant = variant
        .base()
        .with_context(|| format!("{} has no uncompressed base variant", variant.name))?;
    let base = ExportJob::build(base_variant, config)?;
    if args.force || !base.output_path.exists() {
        write_frequency_list(&base, config, progress)?;
    }

    let stage = progress.stage_line("compress");
    stage.set_message(job.output_path.display().to_string());
    let size = compress(&job.table_path, &job.output_path, &config.export.compression)
        .with_context(|| format!("compressing {}", variant.name))?;
    stage.finish_and_clear();
    log::info!("{}: {} bytes", variant.name, fmt_num(size as usize));
    Ok(())
}

fn write_frequency_list(job: &ExportJob, config: &Config, progress: &ProgressContext) -> Result<()> {
    let workdir = open_workdir(config)?;
    let files = source_files(config, &workdir)?;

    log::info!(
        "Exporting {} ({} source files, {} workers, cutoff {})",
        job.variant.name,
        fmt_num(files.len()),
        job.workers,
        job.min_count
    );

    if let Some(dir) = job.table_path.parent().filter(|d| d.is_dir()) {
        cleanup_tmp_files(dir).with_context(|| format!("cleaning {}", dir.display()))?;
    }

    let cfg = AggregateConfig {
        columns: &job.columns,
        token_annotation: &job.token_annotation,
        min_count: job.min_count,
        workers: job.workers,
    };
    let pb = progress.files_bar(job.variant.name, files.len());
    let (table, stats) = aggregate(&workdir, &files, &cfg, &pb)
        .with_context(|| format!("aggregating {}", job.variant.name))?;
    stats.log();

    let rows = write_table(&table, &job.column_names(), job.delimiter, &job.table_path)
        .with_context(|| format!("writing {}", job.variant.name))?;
    progress.println(format!(
        "{}: {} rows → {}",
        job.variant.name,
        fmt_num(rows),
        job.table_path.display()
    ));
    Ok(())
}
