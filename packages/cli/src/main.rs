#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the survey map data pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`survey_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use survey_map_cli_utils::IndicatifProgress;
use survey_map_heatmap::mesh::BarrioMesh;
use survey_map_migrate::{MigrationConfig, MigrationOrchestrator};
use survey_map_sheet::RawGrid;
use survey_map_store::{RpcStore, SurveyStore};
use survey_map_upload::{UploadOptions, upload_all};

#[derive(Parser)]
#[command(name = "survey_map_cli", about = "Survey map data pipeline tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a spreadsheet export and upload the records to the Store
    Import {
        /// Path to the CSV export
        file: PathBuf,
        /// CSV field delimiter (a single ASCII character)
        #[arg(long, default_value = ",")]
        delimiter: char,
        /// Records per Store call
        #[arg(long, default_value = "100")]
        chunk_size: usize,
        /// Parse and report without uploading anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show how a spreadsheet's columns resolve, without uploading
    Inspect {
        /// Path to the CSV export
        file: PathBuf,
        /// CSV field delimiter (a single ASCII character)
        #[arg(long, default_value = ",")]
        delimiter: char,
    },
    /// Drive the legacy-to-destination migration on the Store
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Build heatmap GeoJSON from the Store's aggregate statistics
    Heatmap {
        /// Only count matches for this category label (e.g. "SALUD")
        #[arg(long)]
        category: Option<String>,
        /// Output path; prints to stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Clear the destination table and migrate everything from offset zero
    Run,
    /// Continue from the Store's reported offset without clearing
    Resume,
    /// Print the Store's migration progress
    Status,
    /// Clear the destination table and return the migration to idle
    Reset,
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = survey_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            file,
            delimiter,
            chunk_size,
            dry_run,
        } => {
            let delimiter = u8::try_from(delimiter)
                .map_err(|_| format!("Delimiter must be a single ASCII character: {delimiter:?}"))?;
            let grid = RawGrid::from_csv_path(&file, delimiter)?;
            let records = survey_map_sheet::parse_grid(&grid);

            if dry_run {
                let with_coordinates = records
                    .iter()
                    .filter(|record| record.location.coordinates.is_complete())
                    .count();
                let mut categories = BTreeSet::new();
                for record in &records {
                    categories.extend(record.observed_categories());
                }
                log::info!(
                    "Dry run: {} records ready ({with_coordinates} with both coordinates); categories: {}",
                    records.len(),
                    categories.into_iter().collect::<Vec<_>>().join(", ")
                );
            } else {
                let store = RpcStore::from_env()?;
                let options = UploadOptions { chunk_size };
                let progress = IndicatifProgress::records_bar(&multi, "Uploading records");
                let stats = upload_all(&store, &records, &options, Some(progress)).await;

                println!("{}", serde_json::to_string_pretty(&stats)?);
                if stats.failed > 0 {
                    log::error!(
                        "{} of {} records failed to upload",
                        stats.failed,
                        stats.total_records
                    );
                }
            }
        }
        Commands::Inspect { file, delimiter } => {
            let delimiter = u8::try_from(delimiter)
                .map_err(|_| format!("Delimiter must be a single ASCII character: {delimiter:?}"))?;
            let grid = RawGrid::from_csv_path(&file, delimiter)?;
            let mappings = survey_map_sheet::map_columns(grid.category_row(), grid.question_row());

            println!("{:<5} {:<24} {:<14} QUESTION", "COL", "CATEGORY", "SPECIAL");
            println!("{}", "-".repeat(70));
            for mapping in &mappings {
                let special = mapping
                    .special
                    .map_or_else(String::new, |special| format!("{special:?}"));
                println!(
                    "{:<5} {:<24} {:<14} {}",
                    mapping.index,
                    mapping.category.as_str(),
                    special,
                    mapping.question
                );
            }

            let records = survey_map_sheet::parse_grid(&grid);
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for record in &records {
                for label in record.observed_categories() {
                    *counts.entry(label).or_insert(0) += 1;
                }
            }

            println!();
            println!("{:<24} RECORDS", "CATEGORY");
            println!("{}", "-".repeat(35));
            for (label, count) in &counts {
                println!("{label:<24} {count}");
            }
            println!();
            println!(
                "{} of {} data rows parsed",
                records.len(),
                grid.data_rows().len()
            );
        }
        Commands::Migrate { action } => {
            let store = Arc::new(RpcStore::from_env()?);
            match action {
                MigrateAction::Status => {
                    let progress = store.get_migration_progress().await?;
                    println!("{}", serde_json::to_string_pretty(&progress)?);
                }
                MigrateAction::Reset => {
                    let mut orchestrator =
                        MigrationOrchestrator::new(store, MigrationConfig::default());
                    orchestrator.reset().await?;
                    log::info!("Migration reset: destination cleared");
                }
                MigrateAction::Run | MigrateAction::Resume => {
                    let resume = matches!(action, MigrateAction::Resume);
                    let mut orchestrator =
                        MigrationOrchestrator::new(store, MigrationConfig::default());

                    let stop = orchestrator.stop_handle();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            log::warn!("Interrupt received; stopping after the current batch");
                            stop.stop();
                        }
                    });

                    let report = if resume {
                        orchestrator.resume().await?
                    } else {
                        orchestrator.start().await?
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
        Commands::Heatmap { category, output } => {
            let store = RpcStore::from_env()?;
            let stats = store.get_aggregate_stats(category.as_deref()).await?;
            let mesh = BarrioMesh::bundled()?;
            let features =
                survey_map_heatmap::build_features(&stats, &mesh, &survey_map_geo::BARRANQUILLA);
            let collection = survey_map_heatmap::to_feature_collection(&features);

            let body = serde_json::to_string_pretty(&collection)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &body)?;
                    log::info!("Wrote {} features to {}", features.len(), path.display());
                }
                None => println!("{body}"),
            }
        }
    }

    Ok(())
}
