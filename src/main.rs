//! Docroute CLI - Command-line interface for the document routing index

use clap::{Parser, Subcommand};
use docroute::config;
use docroute::storage::{ConnectionManager, RouteStore, SchemaAdmin};
use docroute::{BulkLoader, Error};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docroute")]
#[command(version = "0.1.0")]
#[command(about = "Document routing index - client/contractor identifier switching")]
#[command(long_about = r#"
Docroute keeps a single-table index mapping each document/revision pair to
the identifiers it carries on the client and contractor sides, and looks a
route up by either side's UUID.

Example usage:
  docroute init
  docroute load --workers 4 --rows 1000
  docroute lookup --uuid "doc42clientguid"
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the routing table and its UUID indexes
    Init {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Also write a docroute.toml recording the database path
        #[arg(long)]
        save_config: bool,

        /// Overwrite an existing docroute.toml
        #[arg(long)]
        force: bool,
    },

    /// Drop and recreate the routing table
    Reset {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Bulk-load synthetic routes with concurrent writers
    Load {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Number of writer workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Total rows to insert
        #[arg(short, long, default_value = "1000")]
        rows: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Count routes in the table
    Count {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Look up a route by client or contractor UUID
    Lookup {
        /// UUID known on either side
        #[arg(short, long)]
        uuid: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show database statistics
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

fn resolve_database(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(cfg) = config::load_config(None)? {
        if let Some(db) = cfg.database {
            return Ok(PathBuf::from(db));
        }
    }
    Ok(config::default_database_path_in(Path::new(".")))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { database, save_config, force } => {
            let db = resolve_database(database)?;
            config::ensure_db_dir(&db)?;

            let mut manager = ConnectionManager::new(&db);
            SchemaAdmin::new(&mut manager).init_schema()?;
            println!("✅ Schema ready in {:?}", db);

            if save_config {
                let cfg = config::DocrouteConfig {
                    database: Some(db.display().to_string()),
                };
                config::write_config(&config::default_config_path(), &cfg, force)?;
                println!("📝 Wrote {:?}", config::default_config_path());
            }
        }

        Commands::Reset { database } => {
            let db = resolve_database(database)?;
            let mut manager = ConnectionManager::new(&db);
            SchemaAdmin::new(&mut manager).reset_schema()?;
            println!("✅ Table dropped and recreated in {:?}", db);
        }

        Commands::Load { database, workers, rows, format } => {
            let db = resolve_database(database)?;
            config::ensure_db_dir(&db)?;

            let mut manager = ConnectionManager::new(&db);
            SchemaAdmin::new(&mut manager).init_schema()?;

            println!("🚀 Loading {} rows with {} workers into {:?}", rows, workers, db);
            let loader = BulkLoader::new(&db, workers);
            let mut store = RouteStore::new(&mut manager);
            let report = loader.run(&mut store, rows)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\n📊 Load complete:");
                println!("   Attempted: {}", report.attempted);
                println!("   Inserted:  {}", report.inserted);
                println!("   Skipped:   {}", report.skipped);
                println!("   Contention retries: {}", report.contention_retries);
                for cause in &report.failure_samples {
                    println!("   ⚠️  {}", cause);
                }
                for err in &report.worker_errors {
                    println!("   ❌ worker failed: {}", err);
                }
            }
        }

        Commands::Count { database } => {
            let db = resolve_database(database)?;
            let mut manager = ConnectionManager::new(&db);
            let count = RouteStore::new(&mut manager).count_rows()?;
            println!("{}", count);
        }

        Commands::Lookup { uuid, database, format } => {
            let db = resolve_database(database)?;
            let mut manager = ConnectionManager::new(&db);
            let mut store = RouteStore::new(&mut manager);

            match store.find_by_uuid(&uuid) {
                Ok(route) => {
                    if format == "json" {
                        println!("{}", serde_json::to_string_pretty(&route)?);
                    } else {
                        println!("📄 {} rev {}", route.name, route.revision);
                        println!(
                            "   client:     {} (proj {}, doc {})",
                            route.client_uuid, route.client_projno, route.client_docno
                        );
                        println!(
                            "   contractor: {} (proj {}, doc {})",
                            route.contractor_uuid, route.contractor_projno, route.contractor_docno
                        );
                    }
                }
                Err(Error::NotFound(_)) => {
                    println!("∅ No route found for uuid: {}", uuid);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Commands::Stats { database } => {
            let db = resolve_database(database)?;
            let mut manager = ConnectionManager::new(&db);
            let count = RouteStore::new(&mut manager).count_rows()?;
            let size = std::fs::metadata(&db).map(|m| m.len()).unwrap_or(0);

            println!("📊 Docroute Statistics ({:?})", db);
            println!("------------------------------------");
            println!("  Routes: {}", count);
            println!("  File size: {} bytes", size);
        }
    }

    Ok(())
}
