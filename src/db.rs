use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Country row keyed by ISO2 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub iso2_code: String,
    pub name: String,
    pub time_zone: Option<String>,
}

/// Headquarters bank row keyed by SWIFT code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub swift_code: String,
    pub name: String,
    pub address: Option<String>,
    pub country_iso2_code: String,
}

/// Branch row linked to its headquarters bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub swift_code: String,
    pub name: String,
    pub address: Option<String>,
    pub country_iso2_code: String,
    pub headquarters_swift_code: String,
}

/// Table row counts for the import summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub countries: i64,
    pub banks: i64,
    pub branches: i64,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Countries Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS countries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            iso2_code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            time_zone TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Banks Table (headquarters entries only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS banks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            swift_code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            address TEXT,
            country_iso2_code TEXT NOT NULL REFERENCES countries(iso2_code),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Bank Branches Table
    // The foreign_keys pragma stays off; the headquarters reference is
    // checked by the reconciler before every branch insert.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_branches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            swift_code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            address TEXT,
            country_iso2_code TEXT NOT NULL REFERENCES countries(iso2_code),
            headquarters_swift_code TEXT NOT NULL REFERENCES banks(swift_code),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_banks_country ON banks(country_iso2_code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_branches_country ON bank_branches(country_iso2_code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_branches_headquarters ON bank_branches(headquarters_swift_code)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// INSERT-IF-ABSENT
// A plain INSERT with the unique-constraint violation mapped to a skip,
// so existence check and insert are one atomic statement.
// ============================================================================

/// Insert a country unless its ISO2 code is already present.
/// Returns true when a row was actually inserted.
pub fn insert_country_if_absent(conn: &Connection, country: &Country) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO countries (iso2_code, name, time_zone) VALUES (?1, ?2, ?3)",
        params![country.iso2_code, country.name, country.time_zone],
    );

    map_insert_result(result)
}

/// Insert a headquarters bank unless its SWIFT code is already present.
pub fn insert_bank_if_absent(conn: &Connection, bank: &Bank) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO banks (swift_code, name, address, country_iso2_code)
         VALUES (?1, ?2, ?3, ?4)",
        params![bank.swift_code, bank.name, bank.address, bank.country_iso2_code],
    );

    map_insert_result(result)
}

/// Insert a branch unless its SWIFT code is already present.
pub fn insert_branch_if_absent(conn: &Connection, branch: &Branch) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO bank_branches (swift_code, name, address, country_iso2_code, headquarters_swift_code)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            branch.swift_code,
            branch.name,
            branch.address,
            branch.country_iso2_code,
            branch.headquarters_swift_code,
        ],
    );

    map_insert_result(result)
}

fn map_insert_result(result: rusqlite::Result<usize>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Point existence check for a headquarters bank.
pub fn bank_exists(conn: &Connection, swift_code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM banks WHERE swift_code = ?1",
            params![swift_code],
            |row| row.get(0),
        )
        .optional()?;

    Ok(found.is_some())
}

pub fn get_country(conn: &Connection, iso2_code: &str) -> Result<Option<Country>> {
    let country = conn
        .query_row(
            "SELECT iso2_code, name, time_zone FROM countries WHERE iso2_code = ?1",
            params![iso2_code],
            |row| {
                Ok(Country {
                    iso2_code: row.get(0)?,
                    name: row.get(1)?,
                    time_zone: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(country)
}

pub fn get_bank(conn: &Connection, swift_code: &str) -> Result<Option<Bank>> {
    let bank = conn
        .query_row(
            "SELECT swift_code, name, address, country_iso2_code
             FROM banks WHERE swift_code = ?1",
            params![swift_code],
            bank_from_row,
        )
        .optional()?;

    Ok(bank)
}

pub fn get_branch(conn: &Connection, swift_code: &str) -> Result<Option<Branch>> {
    let branch = conn
        .query_row(
            "SELECT swift_code, name, address, country_iso2_code, headquarters_swift_code
             FROM bank_branches WHERE swift_code = ?1",
            params![swift_code],
            branch_from_row,
        )
        .optional()?;

    Ok(branch)
}

/// All branches linked to one headquarters bank.
pub fn get_branches_of_headquarters(
    conn: &Connection,
    headquarters_swift_code: &str,
) -> Result<Vec<Branch>> {
    let mut stmt = conn.prepare(
        "SELECT swift_code, name, address, country_iso2_code, headquarters_swift_code
         FROM bank_branches
         WHERE headquarters_swift_code = ?1
         ORDER BY swift_code",
    )?;

    let branches = stmt
        .query_map(params![headquarters_swift_code], branch_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(branches)
}

pub fn get_banks_by_country(conn: &Connection, iso2_code: &str) -> Result<Vec<Bank>> {
    let mut stmt = conn.prepare(
        "SELECT swift_code, name, address, country_iso2_code
         FROM banks
         WHERE country_iso2_code = ?1
         ORDER BY swift_code",
    )?;

    let banks = stmt
        .query_map(params![iso2_code], bank_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(banks)
}

pub fn get_branches_by_country(conn: &Connection, iso2_code: &str) -> Result<Vec<Branch>> {
    let mut stmt = conn.prepare(
        "SELECT swift_code, name, address, country_iso2_code, headquarters_swift_code
         FROM bank_branches
         WHERE country_iso2_code = ?1
         ORDER BY swift_code",
    )?;

    let branches = stmt
        .query_map(params![iso2_code], branch_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(branches)
}

pub fn table_counts(conn: &Connection) -> Result<TableCounts> {
    let count = |table: &str| -> Result<i64> {
        let n = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(n)
    };

    Ok(TableCounts {
        countries: count("countries")?,
        banks: count("banks")?,
        branches: count("bank_branches")?,
    })
}

fn bank_from_row(row: &Row<'_>) -> rusqlite::Result<Bank> {
    Ok(Bank {
        swift_code: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        country_iso2_code: row.get(3)?,
    })
}

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
    Ok(Branch {
        swift_code: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        country_iso2_code: row.get(3)?,
        headquarters_swift_code: row.get(4)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
