//! corpstats - word frequency statistics for annotated corpora
//!
//! Derives canonical annotations, aggregates frequency lists across all
//! source files of a corpus, and publishes them to a remote location.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod variants;

use config::Config;

#[derive(Parser)]
#[command(name = "corpstats")]
#[command(about = "Word frequency statistics for annotated corpora")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./corpstats.toml or ~/.config/corpstats/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Derive single-value annotations used by the frequency lists
    Annotate(cmd::annotate::AnnotateArgs),
    /// Build a frequency list variant
    Export(cmd::export::ExportArgs),
    /// Install a variant's artifact on the remote host
    Install(cmd::install::InstallArgs),
    /// Remove a variant's artifact from the remote host
    Uninstall(cmd::install::InstallArgs),
    /// Print a produced artifact, decompressing if needed
    Inspect(cmd::inspect::InspectArgs),
    /// List export variants
    Variants,
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = corpstats_core::ProgressContext::new();

    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    corpstats_core::init_logging(
        corpstats_core::Verbosity::from_flags(cli.quiet, cli.debug),
        multi,
    );

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Annotate(args) => cmd::annotate::run(args, &config, &progress),
        Command::Export(args) => cmd::export::run(args, &config, &progress),
        Command::Install(args) => cmd::install::install(args, &config),
        Command::Uninstall(args) => cmd::install::uninstall(args, &config),
        Command::Inspect(args) => cmd::inspect::run(args, &config),
        Command::Variants => cmd::variants::run(&config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            let or_unset = |s: &str| {
                if s.is_empty() {
                    "not set".to_string()
                } else {
                    s.to_string()
                }
            };

            table.add_row(vec!["Corpus id".to_string(), or_unset(&config.corpus.id)]);
            table.add_row(vec!["Language".to_string(), config.corpus.language.clone()]);
            table.add_row(vec![
                "Source files".to_string(),
                if config.corpus.source_files.is_empty() {
                    "all in work directory".to_string()
                } else {
                    config.corpus.source_files.len().to_string()
                },
            ]);
            table.add_row(vec![
                "Work directory".to_string(),
                config.workdir.root.display().to_string(),
            ]);
            table.add_row(vec![
                "Annotation compression".to_string(),
                or_unset(config.workdir.compression.as_deref().unwrap_or("")),
            ]);
            table.add_row(vec![
                "Date annotation".to_string(),
                or_unset(&config.annotations.date),
            ]);
            table.add_row(vec![
                "Export directory".to_string(),
                config.export.dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Delimiter".to_string(),
                format!("{:?}", config.export.delimiter),
            ]);
            table.add_row(vec!["Cutoff".to_string(), config.export.cutoff.to_string()]);
            table.add_row(vec![
                "Compression".to_string(),
                config.export.compression.clone(),
            ]);
            table.add_row(vec!["Workers".to_string(), config.export.workers.to_string()]);
            table.add_row(vec!["Remote host".to_string(), or_unset(&config.remote.host)]);
            table.add_row(vec!["Remote directory".to_string(), or_unset(&config.remote.dir)]);
            table.add_row(vec![
                "Marker directory".to_string(),
                config.remote.marker_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Transport timeout".to_string(),
                format!("{}s", config.remote.timeout_secs),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
