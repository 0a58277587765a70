//! EVE Industry Calculator
//!
//! Production cost, material tree and invention calculator for EVE Online
//! industry, backed by a local SQLite copy of the static data export.

mod bonus;
mod cache;
mod calculator;
mod db;
mod error;
mod import;
mod invention;
mod job_cost;
mod models;
mod provider;
mod report;
mod sample;
mod settings;
#[cfg(test)]
mod testing;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::calculator::{CalculatorSettings, IndustryCalculator, InventionRequest, TreeRequest};
use crate::invention::Strategy;
use crate::models::{CharacterId, Facility, TypeId};
use crate::provider::StaticDataProvider;
use crate::report::Names;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "eve-industry")]
#[command(about = "Production cost and invention calculator for EVE Online industry")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "industry.db")]
    database: PathBuf,

    /// Settings file with price sides and named facilities
    #[arg(short, long, default_value = settings::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load a small sample data set (Hobgoblin I/II chain)
    LoadSample,

    /// Import SDE CSV dumps, price and cost index feeds from a directory
    Import {
        /// Directory containing invTypes.csv, industryActivity*.csv, prices.json, ...
        dir: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Show row counts of the main tables
    Status,

    /// List all manufacturing and reaction formulas
    Formulas,

    /// Resolve a formula into raw materials, time and cost
    Calc {
        /// Blueprint or reaction formula type id
        formula_id: u32,

        #[arg(short, long, default_value_t = 1)]
        runs: i64,

        /// Material efficiency (0-20)
        #[arg(long, default_value_t = 0)]
        me: i64,

        /// Time efficiency (0-20)
        #[arg(long, default_value_t = 0)]
        te: i64,

        /// Facility id from the settings file
        #[arg(short, long)]
        facility: Option<String>,

        /// Character whose stored skills are used
        #[arg(long)]
        character: Option<u64>,

        /// Skip market pricing and job cost
        #[arg(long)]
        no_prices: bool,

        /// Show the full build tree
        #[arg(short, long)]
        verbose: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank decryptors for inventing a T2 blueprint from a T1 blueprint
    Invention {
        /// T1 blueprint type id
        t1_formula_id: u32,

        /// invention-only, total-per-item, total-full-bpc, time-efficiency or max-runs
        #[arg(short, long, default_value = "total-per-item")]
        strategy: Strategy,

        /// Units to build, for the max-runs strategy
        #[arg(long)]
        target_volume: Option<i64>,

        #[arg(short, long)]
        facility: Option<String>,

        #[arg(long)]
        character: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// List decryptors and their modifiers
    Decryptors,
}

fn resolve_facility(settings: &Settings, id: Option<&str>) -> Result<Option<Facility>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let facility = settings.facility(id).ok_or_else(|| {
        let known: Vec<&str> = settings.facilities.iter().map(|f| f.id.as_str()).collect();
        anyhow!("unknown facility '{id}' (known: {})", known.join(", "))
    })?;
    Ok(Some(facility.clone()))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("opening {}", cli.database.display()))?;
    db::init_schema(&conn)?;
    let settings = Settings::load(&cli.config)?;
    debug!(
        config = %cli.config.display(),
        facilities = settings.facilities.len(),
        "settings loaded"
    );

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            sample::load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Import { dir, clear } => {
            if clear {
                info!("clearing existing data");
                db::clear_static_data(&conn)?;
                db::clear_market_data(&conn)?;
            }

            let stats = import::import_directory(&conn, &dir)?;
            println!("\n{}", stats);
        }

        Commands::Status => {
            let tables = [
                "types",
                "activities",
                "activity_materials",
                "market_prices",
                "cost_indices",
            ];
            for table in tables {
                println!("{:<20} {:>10}", table, db::count_rows(&conn, table)?);
            }
        }

        Commands::Formulas => {
            let formulas = db::list_formulas(&conn)?;
            if formulas.is_empty() {
                println!("No formulas in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:>8} {:<40} {:<14} {}", "ID", "Formula", "Activity", "Product");
                println!("{}", "-".repeat(90));
                for f in formulas {
                    println!(
                        "{:>8} {:<40} {:<14} {} x {}",
                        f.formula_id.0,
                        f.formula_name.unwrap_or_else(|| "?".to_string()),
                        f.activity.as_str(),
                        f.quantity,
                        f.product_name.unwrap_or_else(|| format!("#{}", f.product_id))
                    );
                }
            }
        }

        Commands::Calc {
            formula_id,
            runs,
            me,
            te,
            facility,
            character,
            no_prices,
            verbose,
            json,
        } => {
            let mut request = TreeRequest::new(TypeId(formula_id), runs, me)?.te(te)?;
            if let Some(facility) = resolve_facility(&settings, facility.as_deref())? {
                request = request.facility(facility)?;
            }
            if let Some(character) = character {
                request = request.character(CharacterId(character));
            }
            if no_prices {
                request = request.without_prices();
            }

            let calc =
                IndustryCalculator::new(&conn, &conn, &conn, CalculatorSettings::from(&settings));
            let result = calc.compute_tree(&request)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let names = Names(&conn);
                if verbose {
                    println!("Build tree:\n");
                    println!("{}", report::format_breakdown(&result.tree.breakdown, &names, 1));
                }
                print!("{}", report::format_tree(&result, &names));
            }
        }

        Commands::Invention {
            t1_formula_id,
            strategy,
            target_volume,
            facility,
            character,
            json,
        } => {
            let mut request = InventionRequest::new(TypeId(t1_formula_id), strategy);
            if let Some(volume) = target_volume {
                request = request.target_volume(volume)?;
            }
            if let Some(facility) = resolve_facility(&settings, facility.as_deref())? {
                request = request.facility(facility)?;
            }
            if let Some(character) = character {
                request = request.character(CharacterId(character));
            }

            let calc =
                IndustryCalculator::new(&conn, &conn, &conn, CalculatorSettings::from(&settings));
            match calc.evaluate_invention(&request)? {
                Some(search) if json => println!("{}", serde_json::to_string_pretty(&search)?),
                Some(search) => print!("{search}"),
                None => println!("Formula {} has no invention data", t1_formula_id),
            }
        }

        Commands::Decryptors => {
            let decryptors = conn.decryptors()?;
            if decryptors.is_empty() {
                println!("No decryptors in database.");
            } else {
                println!(
                    "{:<36} {:>6} {:>4} {:>4} {:>5}",
                    "Decryptor", "Chance", "ME", "TE", "Runs"
                );
                println!("{}", "-".repeat(59));
                for d in decryptors {
                    println!(
                        "{:<36} {:>5.0}% {:>+4} {:>+4} {:>+5}",
                        d.name,
                        d.probability_multiplier * 100.0,
                        d.me_modifier,
                        d.te_modifier,
                        d.runs_modifier
                    );
                }
            }
        }
    }

    Ok(())
}
