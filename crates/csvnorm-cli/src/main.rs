mod config;
mod connection;
mod logging;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use csvnorm_core::{
    CoerceOptions, DatabaseSchema, DenormaliseOptions, Error as CoreError, TableName,
    resolve_foreign_keys, validate_schema,
};
use csvnorm_sqlx::{IntrospectOptions, Session};
use csvnorm_transfer::{ExportOptions, ImportOptions, TransferError, export_table, import_table};
use thiserror::Error;

use config::CsvnormConfig;
use connection::{Connection, Engine};
use logging::init_logging;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "csvnorm",
    version,
    about = "Export tables as flat CSV and import them back"
)]
struct Cli {
    /// Configuration file (defaults to ./csvnorm.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the catalog, or how one table is flattened, as JSON.
    Inspect(InspectArgs),
    /// Write a table as CSV with foreign keys shown by natural key.
    Export(ExportArgs),
    /// Insert a flat CSV into a table in a single transaction.
    Import(ImportArgs),
    /// Print the JSON Schema of the catalog format.
    CatalogSchema,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Database URL (`sqlite:app.db`, `postgres://...`).
    #[arg(long, value_name = "URL", required_unless_present = "catalog")]
    db: Option<String>,
    /// Read the catalog from a JSON file instead of the database.
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,
    /// Table to describe, `schema.table` or a bare name.
    #[arg(long)]
    table: Option<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long, value_name = "URL")]
    db: String,
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,
    #[arg(long)]
    table: String,
    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Leave out the primary key of tables that have a natural key.
    #[arg(long, default_value_t = false)]
    omit_surrogate_key: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long, value_name = "URL")]
    db: String,
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,
    #[arg(long)]
    table: String,
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    /// Report invalid rows and keep going.
    #[arg(long, default_value_t = false)]
    skip_invalid: bool,
    /// Check every row, then roll back.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Load lookup tables up front instead of one query per value.
    #[arg(long, default_value_t = false)]
    preload_lookups: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = CsvnormConfig::load(cli.config.as_deref())?;
    init_logging(&config.log)?;

    let timer = Instant::now();
    let result = match cli.command {
        Command::Inspect(args) => run_inspect(&config, args).await,
        Command::Export(args) => run_export(&config, args).await,
        Command::Import(args) => run_import(&config, args).await,
        Command::CatalogSchema => run_catalog_schema(),
    };

    let duration_ms = timer.elapsed().as_millis();
    match &result {
        Ok(()) => tracing::info!(event = "run_finished", status = "success", duration_ms),
        Err(err) => {
            tracing::error!(event = "run_finished", status = "failed", duration_ms, error = %err)
        }
    }
    result
}

async fn run_inspect(config: &CsvnormConfig, args: InspectArgs) -> Result<(), CliError> {
    let connection = match &args.db {
        Some(url) => Some(Connection::open(url).await?),
        None => None,
    };
    let catalog = load_catalog(connection.as_ref(), args.catalog.as_deref()).await?;

    let output = match &args.table {
        None => serde_json::to_string_pretty(&catalog)?,
        Some(table) => {
            let table_name = resolve_table_name(config, &catalog, table);
            let tidier = config.tidier();
            let mapping = resolve_foreign_keys(&catalog, &table_name, &tidier)?;
            let (_, columns) = csvnorm_sqlx::prepare_denormalise(
                &catalog,
                &table_name,
                &tidier,
                &DenormaliseOptions::default(),
            )?;
            serde_json::to_string_pretty(&serde_json::json!({
                "table": table_name,
                "columns": columns,
                "foreign_keys": mapping,
            }))?
        }
    };

    println!("{output}");
    Ok(())
}

async fn run_export(config: &CsvnormConfig, args: ExportArgs) -> Result<(), CliError> {
    let connection = Connection::open(&args.db).await?;
    let catalog = load_catalog(Some(&connection), args.catalog.as_deref()).await?;
    let table_name = resolve_table_name(config, &catalog, &args.table);

    let options = ExportOptions {
        denormalise: DenormaliseOptions {
            omit_surrogate_key: args.omit_surrogate_key,
        },
        date_format: config.date_format.clone(),
        timestamp_format: config.timestamp_format.clone(),
    };
    let writer: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    let report = export_table(
        connection.session(),
        &catalog,
        &table_name,
        &config.tidier(),
        &options,
        writer,
    )
    .await?;

    if let Some(path) = &args.out {
        tracing::info!(
            event = "csv_written",
            path = %path.display(),
            rows = report.rows,
        );
    }
    Ok(())
}

async fn run_import(config: &CsvnormConfig, args: ImportArgs) -> Result<(), CliError> {
    let connection = Connection::open(&args.db).await?;
    let catalog = load_catalog(Some(&connection), args.catalog.as_deref()).await?;
    let table_name = resolve_table_name(config, &catalog, &args.table);
    let reader = BufReader::new(File::open(&args.input)?);

    let options = ImportOptions {
        skip_invalid_rows: args.skip_invalid,
        dry_run: args.dry_run,
        coerce: CoerceOptions {
            date_format: config.date_format.clone(),
            timestamp_format: config.timestamp_format.clone(),
            numeric: connection.engine() == Engine::Postgres,
        },
        preload_lookups: args.preload_lookups,
    };

    connection.begin().await?;
    let outcome = import_table(
        connection.session(),
        &catalog,
        &table_name,
        &config.tidier(),
        &options,
        reader,
    )
    .await;

    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            if let Err(rollback_err) = connection.rollback().await {
                tracing::warn!(event = "rollback_failed", error = %rollback_err);
            }
            return Err(err.into());
        }
    };

    if args.dry_run {
        connection.rollback().await?;
        tracing::info!(event = "import_rolled_back", reason = "dry_run");
    } else {
        connection.commit().await?;
        tracing::info!(event = "import_committed", rows = report.rows_inserted);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_catalog_schema() -> Result<(), CliError> {
    let schema = schemars::schema_for!(DatabaseSchema);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn load_catalog(
    connection: Option<&Connection>,
    path: Option<&Path>,
) -> Result<DatabaseSchema, CliError> {
    let catalog: DatabaseSchema = match (path, connection) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path)?;
            let catalog = serde_json::from_str(&content)?;
            tracing::info!(event = "catalog_read", path = %path.display());
            catalog
        }
        (None, Some(connection)) => {
            tracing::info!(event = "introspection_started");
            let catalog = connection
                .session()
                .introspect(&IntrospectOptions::default())
                .await?;
            tracing::info!(event = "introspection_finished");
            catalog
        }
        (None, None) => {
            return Err(CoreError::Unsupported(
                "either a database URL or a catalog file is required".to_string(),
            )
            .into());
        }
    };

    validate_schema(&catalog)?;
    Ok(catalog)
}

fn resolve_table_name(config: &CsvnormConfig, catalog: &DatabaseSchema, text: &str) -> TableName {
    let default_schema = config.default_schema.clone().unwrap_or_else(|| {
        Engine::from_name(&catalog.engine)
            .unwrap_or(Engine::Postgres)
            .default_schema()
            .to_string()
    });
    TableName::parse(text, &default_schema)
}
