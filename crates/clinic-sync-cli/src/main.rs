use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clinic_sync_core::db::BatchWriter;
use clinic_sync_core::{
    purge_by_source, sync_measurements, sync_vaccinations, Database, MeasurementReport,
    SyncConfig, VaccinationReport, VaccineResolver, VaccineTable,
};
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic-sync")]
#[command(about = "Reconcile clinic notes and services into structured records")]
struct Cli {
    /// Document store file
    #[arg(long, global = true, default_value = "clinic-sync.db")]
    database: PathBuf,
    /// JSON file overriding collection names and job constants
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON file replacing the built-in vaccine table
    #[arg(long, global = true)]
    vaccine_table: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents into a collection
    Import {
        /// Target collection
        collection: String,
        /// JSON array of objects with an `id`, or an object of id → document
        file: PathBuf,
    },
    /// Print a collection as JSON
    Export {
        collection: String,
    },
    /// Extract growth measurements from health records
    SyncMeasurements,
    /// Rebuild vaccination records from services
    SyncVaccinations {
        /// Link services without a patient id through protocols
        #[arg(long)]
        via_protocols: bool,
    },
    /// Delete derived measurements carrying a source tag
    PurgeMeasurements {
        /// Source tag (defaults to the configured measurement source)
        #[arg(long)]
        source: Option<String>,
    },
    /// Print statistics for a derived collection
    Report {
        #[arg(value_enum)]
        target: ReportTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportTarget {
    Measurements,
    Vaccinations,
    VaccinationRecords,
}

fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("Error initialising logging: {}", e);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Hata: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_sync=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SyncConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SyncConfig::default(),
    };
    let db = Database::open(&cli.database)
        .with_context(|| format!("opening database {}", cli.database.display()))?;

    match cli.command {
        Commands::Import { collection, file } => {
            let count = import(&db, &config, &collection, &file)?;
            println!("{} belge {} koleksiyonuna aktarıldı", count, collection);
        }
        Commands::Export { collection } => {
            let docs = db.list_documents(&collection)?;
            let body: Map<String, Value> = docs.into_iter().map(|d| (d.id, d.data)).collect();
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::SyncMeasurements => {
            let run = sync_measurements(&db, &config)?;
            println!("{}\n", run.summary);
            println!("{}", run.report);
        }
        Commands::SyncVaccinations { via_protocols } => {
            let resolver = load_resolver(cli.vaccine_table.as_deref())?;
            let run = sync_vaccinations(&db, &config, resolver, via_protocols)?;
            println!("{}\n", run.summary);
            println!("{}", run.report);
        }
        Commands::PurgeMeasurements { source } => {
            let tag = source.unwrap_or_else(|| config.measurement_source.clone());
            let deleted = purge_by_source(
                &db,
                &config.measurements_collection,
                &tag,
                config.batch_size,
            )?;
            println!("{} ölçüm silindi (source = {})", deleted, tag);
        }
        Commands::Report { target } => match target {
            ReportTarget::Measurements => {
                let report = MeasurementReport::collect(&db, &config.measurements_collection)?;
                println!("{}", report);
            }
            ReportTarget::Vaccinations => {
                let report = VaccinationReport::collect(&db, &config.vaccinations_collection)?;
                println!("{}", report);
            }
            ReportTarget::VaccinationRecords => {
                let report =
                    VaccinationReport::collect(&db, &config.vaccination_records_collection)?;
                println!("{}", report);
            }
        },
    }

    Ok(())
}

fn load_resolver(path: Option<&Path>) -> Result<VaccineResolver> {
    let table = match path {
        Some(path) => VaccineTable::from_path(path)
            .with_context(|| format!("loading vaccine table {}", path.display()))?,
        None => VaccineTable::default(),
    };
    Ok(VaccineResolver::new(table))
}

fn import(db: &Database, config: &SyncConfig, collection: &str, file: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let parsed: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;
    let entries = import_entries(parsed).with_context(|| format!("importing {}", file.display()))?;

    let mut writer = BatchWriter::with_limit(db, config.batch_size);
    for (id, data) in &entries {
        writer.set(collection, id, data.clone())?;
    }
    let stats = writer.finish()?;
    tracing::info!(
        collection,
        documents = entries.len(),
        commits = stats.commits,
        "import finished"
    );
    Ok(entries.len())
}

/// Split an import file into (id, document) pairs. Accepts an object of
/// id → document, or an array of documents each carrying an `id`.
fn import_entries(parsed: Value) -> Result<Vec<(String, Value)>> {
    match parsed {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let id = match item.get("id") {
                    Some(Value::String(s)) if !s.is_empty() => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => bail!("item {} has no usable id", i),
                };
                Ok((id, item))
            })
            .collect(),
        _ => bail!("expected a JSON array or object"),
    }
}
