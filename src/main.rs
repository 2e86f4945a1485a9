use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use swift_registry::{api, db, logging, reconciler, source};

#[derive(Parser)]
#[command(name = "swift-registry")]
#[command(about = "SWIFT bank registry loader and directory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a registry spreadsheet (CSV or XLSX) into the database
    Import {
        /// Source file with the registry rows
        file: PathBuf,

        /// Registry database file
        #[arg(long, default_value = "swift.db")]
        database: PathBuf,
    },
    /// Print one bank or branch as JSON
    Lookup {
        /// Full 11-character SWIFT code
        swift_code: String,

        /// Registry database file
        #[arg(long, default_value = "swift.db")]
        database: PathBuf,
    },
    /// Print every bank and branch of a country as JSON
    Country {
        /// Two-letter ISO2 country code
        iso2_code: String,

        /// Registry database file
        #[arg(long, default_value = "swift.db")]
        database: PathBuf,
    },
}

fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Import { file, database } => run_import(&file, &database),
        Command::Lookup {
            swift_code,
            database,
        } => run_lookup(&swift_code, &database),
        Command::Country {
            iso2_code,
            database,
        } => run_country(&iso2_code, &database),
    }
}

fn run_import(file: &Path, database: &Path) -> Result<()> {
    println!("🏦 SWIFT Registry Import");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load the source file
    println!("\n📂 Loading {}...", file.display());
    let records = source::load_records(file)?;
    println!("✓ Loaded {} records", records.len());

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    let conn = Connection::open(database)?;
    db::setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 3. Reconcile
    println!("\n💾 Reconciling records...");
    let report = reconciler::reconcile(&conn, &records)?;
    println!(
        "✓ Countries inserted: {} ({} already present)",
        report.countries_inserted, report.countries_skipped
    );
    println!(
        "✓ Banks inserted: {} ({} already present)",
        report.banks_inserted, report.banks_skipped
    );
    println!(
        "✓ Branches inserted: {} ({} already present)",
        report.branches_inserted, report.branches_skipped
    );

    if !report.diagnostics.is_empty() {
        println!("\n⚠️  {} records reported:", report.diagnostics.len());
        for diagnostic in &report.diagnostics {
            println!("   {diagnostic}");
        }
    }

    // 4. Verify counts
    println!("\n🔍 Verifying database...");
    let counts = db::table_counts(&conn)?;
    println!(
        "✓ Database contains {} countries, {} banks, {} branches",
        counts.countries, counts.banks, counts.branches
    );

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete: {}", report.summary());

    Ok(())
}

fn run_lookup(swift_code: &str, database: &Path) -> Result<()> {
    let conn = open_existing(database)?;
    let summary = api::lookup_swift_code(&conn, swift_code)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn run_country(iso2_code: &str, database: &Path) -> Result<()> {
    let conn = open_existing(database)?;
    let summary = api::lookup_country(&conn, iso2_code)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn open_existing(database: &Path) -> Result<Connection> {
    if !database.exists() {
        bail!(
            "Database not found: {} (run 'swift-registry import' first)",
            database.display()
        );
    }

    Ok(Connection::open(database)?)
}
