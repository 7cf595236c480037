//! Reclink CLI - Command-line interface for the record link graph

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use reclink::config::{self, ReclinkConfig};
use reclink::options::{self, LinkOptions};
use reclink::ui::{self, Icons};
use reclink::{Direction, IdList, OutputRecord, RecordKey, SqliteStore, Status, TenantId};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "reclink")]
#[command(version)]
#[command(about = "Resolve and link records across external systems")]
#[command(long_about = r#"
Reclink keeps tenant-scoped identities for records that live in other
systems and the directed links between them.

Example usage:
  reclink --tenant acme link --source-system shopify --source-type order --source-id 1001 \
      --target-system catalog --target-type product --target-id SKU-1 --target-id SKU-2
  reclink --tenant acme lookup --system shopify --type order --id 1001 --direction target
  reclink --tenant acme run --file options.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print output records as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Tenant owning the records
    #[arg(short, long, global = true)]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Link every source id to every target id, all or nothing
    Link {
        #[arg(long)]
        source_system: String,

        #[arg(long)]
        source_type: String,

        /// Source external id (repeatable or comma separated)
        #[arg(long = "source-id", required = true, value_delimiter = ',')]
        source_ids: Vec<String>,

        #[arg(long)]
        target_system: String,

        #[arg(long)]
        target_type: String,

        /// Target external id (repeatable or comma separated)
        #[arg(long = "target-id", required = true, value_delimiter = ',')]
        target_ids: Vec<String>,

        /// One output record per link
        #[arg(long)]
        per_edge: bool,
    },

    /// Find records linked to one or more anchors
    Lookup {
        #[arg(long)]
        system: String,

        #[arg(long = "type")]
        record_type: String,

        /// Anchor external id (repeatable or comma separated)
        #[arg(long = "id", required = true, value_delimiter = ',')]
        ids: Vec<String>,

        /// source, target or all
        #[arg(long, default_value = "all")]
        direction: Direction,

        #[arg(long)]
        filter_system: Option<String>,

        #[arg(long)]
        filter_type: Option<String>,

        /// One output record per edge
        #[arg(long)]
        per_edge: bool,

        /// Fail unless every anchor has a match
        #[arg(long)]
        require_all: bool,
    },

    /// Execute an options document (JSON) from a file or stdin
    Run {
        /// Options file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: PathBuf,
    },

    /// Remove links; the linked records are kept
    Unlink {
        /// Source record as system/type/id
        #[arg(long)]
        source: RecordKey,

        /// Target record as system/type/id; without it every link around
        /// the source in `direction` is removed
        #[arg(long)]
        target: Option<RecordKey>,

        #[arg(long, default_value = "target")]
        direction: Direction,
    },

    /// Show record and link counts
    Stats {
        /// Count every tenant, not just the selected one
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let db_path = database_path(cli.database.as_deref(), &config)?;

    let mut exit_code = ExitCode::SUCCESS;

    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let written = ReclinkConfig {
                database: Some(db_path.display().to_string()),
                tenant: cli.tenant.clone().or(config.tenant.clone()),
                ..config
            };
            config::write_config(&path, &written, force)?;
            if output_mode.is_human() {
                ui::success(&format!("Wrote {}", path.display()));
            }
        }

        Commands::Link {
            source_system,
            source_type,
            source_ids,
            target_system,
            target_type,
            target_ids,
            per_edge,
        } => {
            let tenant = tenant(cli.tenant, &config)?;
            let mut store = open_store(&db_path, &config)?;
            let mut opts = LinkOptions::lookup(source_system, source_type, IdList::new(source_ids)?);
            opts.create_link = true;
            opts.target_system = Some(target_system);
            opts.target_type = Some(target_type);
            opts.target_id = Some(IdList::new(target_ids)?);
            opts.emit_per_edge = per_edge;

            banner(output_mode, &format!("Linking for tenant {}", tenant));
            let records = options::run(&mut store, tenant, opts)?;
            exit_code = emit(output_mode, &records)?;
        }

        Commands::Lookup {
            system,
            record_type,
            ids,
            direction,
            filter_system,
            filter_type,
            per_edge,
            require_all,
        } => {
            let tenant = tenant(cli.tenant, &config)?;
            let mut store = open_store(&db_path, &config)?;
            let mut opts = LinkOptions::lookup(system, record_type, IdList::new(ids)?);
            opts.direction = direction;
            opts.filter_system = filter_system;
            opts.filter_type = filter_type;
            opts.emit_per_edge = per_edge;
            opts.require_all = require_all;

            banner(output_mode, &format!("{} Looking up {} links", Icons::SEARCH, direction));
            let records = options::run(&mut store, tenant, opts)?;
            exit_code = emit(output_mode, &records)?;
        }

        Commands::Run { file } => {
            let tenant = tenant(cli.tenant, &config)?;
            let mut store = open_store(&db_path, &config)?;
            let document = if file == Path::new("-") {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file)?
            };
            let opts: LinkOptions = serde_json::from_str(&document)?;

            let records = options::run(&mut store, tenant, opts)?;
            exit_code = emit(output_mode, &records)?;
        }

        Commands::Unlink { source, target, direction } => {
            let tenant = tenant(cli.tenant, &config)?;
            let store = open_store(&db_path, &config)?;
            let removed = match target {
                Some(target) => usize::from(store.remove_link(&tenant, &source, &target)?),
                None => store.remove_links_from(&tenant, &source, direction)?,
            };

            if output_mode.is_human() {
                println!("{} Removed {} link(s)", Icons::DEL, removed);
            } else {
                println!("{}", serde_json::json!({ "removed": removed }));
            }
        }

        Commands::Stats { all } => {
            let store = open_store(&db_path, &config)?;
            let tenant = if all { None } else { Some(tenant(cli.tenant, &config)?) };
            let stats = store.stats(tenant.as_ref())?;

            if output_mode.is_human() {
                println!("{} Reclink Statistics ({:?})", Icons::STATS, db_path);
                println!("{}", ui::stats_table(&stats));
            } else {
                println!("{}", serde_json::to_string(&stats)?);
            }
        }
    }

    Ok(exit_code)
}

fn database_path(flag: Option<&Path>, config: &ReclinkConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = &config.database {
        return Ok(PathBuf::from(path));
    }
    Ok(config::default_database_path_in(&std::env::current_dir()?))
}

fn tenant(flag: Option<String>, config: &ReclinkConfig) -> anyhow::Result<TenantId> {
    let Some(id) = flag.or_else(|| config.tenant.clone()) else {
        anyhow::bail!("no tenant given (use --tenant or set `tenant` in the config)");
    };
    Ok(TenantId::new(id)?)
}

fn open_store(db_path: &Path, config: &ReclinkConfig) -> anyhow::Result<SqliteStore> {
    config::ensure_db_dir(db_path)?;
    tracing::debug!("Opening database {}", db_path.display());
    Ok(SqliteStore::open_with_config(&config.store_config(db_path))?)
}

fn banner(output_mode: OutputMode, text: &str) {
    if output_mode.is_human() && !reclink::output::is_quiet() {
        ui::header(text);
    }
}

/// Print the records; any non-200 record makes the command fail.
fn emit(output_mode: OutputMode, records: &[OutputRecord]) -> anyhow::Result<ExitCode> {
    match output_mode {
        OutputMode::Human => {
            if records.is_empty() {
                ui::info("Results", "none");
            }
            for record in records {
                ui::output_record(record);
            }
        }
        OutputMode::Json => {
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
    }

    let Some(status) = worst_status(records) else {
        return Ok(ExitCode::SUCCESS);
    };
    let message = format!("Finished with status {}", status);
    match status {
        Status::Internal => ui::error(&message),
        _ => ui::warn(&message),
    }
    Ok(ExitCode::FAILURE)
}

fn worst_status(records: &[OutputRecord]) -> Option<Status> {
    records
        .iter()
        .map(OutputRecord::status)
        .filter(|status| !status.is_success())
        .max_by_key(|status| status.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclink::aggregate::{ErrorDetail, ErrorDetails, ErrorRecord};

    fn error(status: Status) -> OutputRecord {
        OutputRecord::Error(ErrorRecord {
            status,
            error_detail: ErrorDetails::One(ErrorDetail::new("failed")),
        })
    }

    #[test]
    fn test_worst_status() {
        assert_eq!(worst_status(&[]), None);
        assert_eq!(
            worst_status(&[error(Status::NotFound), error(Status::Internal)]),
            Some(Status::Internal)
        );
        assert_eq!(worst_status(&[error(Status::NotFound)]), Some(Status::NotFound));
    }

    #[test]
    fn test_emit_reports_failure_without_exiting() {
        let ok = emit(OutputMode::Json, &[]).unwrap();
        assert_eq!(format!("{:?}", ok), format!("{:?}", ExitCode::SUCCESS));

        let failed = emit(OutputMode::Json, &[error(Status::NotFound)]).unwrap();
        assert_eq!(format!("{:?}", failed), format!("{:?}", ExitCode::FAILURE));
    }
}
