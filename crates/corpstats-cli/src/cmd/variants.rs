//! `corpstats variants` - list export variants and their state

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use corpstats_install::{MarkerState, MarkerStore};

use crate::config::Config;
use crate::variants::{ExportJob, VARIANTS};

pub fn run(config: &Config) -> Result<()> {
    let markers = MarkerStore::new(config.remote.marker_dir.clone());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Variant").fg(Color::Cyan),
            Cell::new("Description").fg(Color::Cyan),
            Cell::new("Columns").fg(Color::Cyan),
            Cell::new("Artifact").fg(Color::Cyan),
            Cell::new("Remote").fg(Color::Cyan),
        ]);

    for variant in VARIANTS {
        let artifact = match ExportJob::build(variant, config) {
            Ok(job) if job.output_path.exists() => job.output_path.display().to_string(),
            Ok(_) => "-".to_string(),
            Err(e) => format!("({e})"),
        };
        let columns: Vec<&str> = variant.columns.iter().map(|(name, _)| *name).collect();
        let state = markers.state(variant.name);
        let state_cell = match state {
            MarkerState::Installed => Cell::new(state).fg(Color::Green),
            MarkerState::Uninstalled => Cell::new(state).fg(Color::Yellow),
            MarkerState::Unknown => Cell::new(state),
        };
        table.add_row(vec![
            Cell::new(variant.name),
            Cell::new(variant.description),
            Cell::new(columns.join(", ")),
            Cell::new(artifact),
            state_cell,
        ]);
    }

    eprintln!("\n{table}");
    Ok(())
}
