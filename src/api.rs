// Directory queries shared by the CLI and the HTTP server.
// DTO field names follow the public v1 JSON contract.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{self, Bank, Branch};
use crate::swift;

// ============================================================================
// ERRORS
// ============================================================================

/// Directory-level failure. Display strings double as HTTP response bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid SWIFT code: {0}")]
    InvalidSwiftCode(String),

    #[error("Invalid ISO2 code: {0}")]
    InvalidIso2Code(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

// ============================================================================
// DTOS
// ============================================================================

/// Bank or branch entry nested under a headquarters or country listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankEntry {
    pub address: Option<String>,
    pub bank_name: String,
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    pub is_headquarter: bool,
    pub swift_code: String,
}

/// Response for a single code lookup. Headquarters carry their branch
/// list, branch codes do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiftCodeSummary {
    pub address: Option<String>,
    pub bank_name: String,
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    pub country_name: String,
    pub is_headquarter: bool,
    pub swift_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<BankEntry>>,
}

/// Response for a country listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    pub country_name: String,
    pub swift_codes: Vec<BankEntry>,
}

/// Body of a request adding one headquarters or branch entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    #[serde(default)]
    pub address: Option<String>,
    pub bank_name: String,
    #[serde(rename = "countryISO2")]
    pub country_iso2: String,
    pub country_name: String,
    pub is_headquarter: bool,
    pub swift_code: String,
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_swift_code(swift_code: &str, is_headquarter: bool) -> Result<(), ApiError> {
    if swift_code.chars().count() != swift::SWIFT_CODE_LENGTH {
        return Err(ApiError::InvalidSwiftCode(
            "Incorrect SWIFT code length".to_string(),
        ));
    }

    if !swift_code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ApiError::InvalidSwiftCode(
            "Incorrect SWIFT code format".to_string(),
        ));
    }

    if swift::is_headquarters(swift_code) && !is_headquarter {
        return Err(ApiError::InvalidSwiftCode(
            "Headquarter bank should end with XXX".to_string(),
        ));
    }

    if !swift::is_headquarters(swift_code) && is_headquarter {
        return Err(ApiError::InvalidSwiftCode(
            "Branch bank should not end with XXX".to_string(),
        ));
    }

    Ok(())
}

fn validate_iso2_code(iso2_code: &str) -> Result<(), ApiError> {
    if iso2_code.chars().count() != 2 {
        return Err(ApiError::InvalidIso2Code(
            "Incorrect ISO2 code length".to_string(),
        ));
    }

    if !iso2_code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ApiError::InvalidIso2Code(
            "Incorrect ISO2 code format".to_string(),
        ));
    }

    Ok(())
}

// ============================================================================
// LOOKUPS
// ============================================================================

/// Look up one SWIFT code. Headquarters answer with their branches attached.
pub fn lookup_swift_code(
    conn: &Connection,
    swift_code: &str,
) -> Result<SwiftCodeSummary, ApiError> {
    validate_swift_code(swift_code, swift::is_headquarters(swift_code))?;

    if swift::is_headquarters(swift_code) {
        let bank = db::get_bank(conn, swift_code)?
            .ok_or_else(|| ApiError::NotFound("Bank headquarter not found".to_string()))?;
        let country_name = country_name_of(conn, &bank.country_iso2_code)?;
        let branches = db::get_branches_of_headquarters(conn, swift_code)?
            .into_iter()
            .map(branch_entry)
            .collect();

        return Ok(SwiftCodeSummary {
            address: trimmed(bank.address),
            bank_name: bank.name,
            country_iso2: bank.country_iso2_code,
            country_name,
            is_headquarter: true,
            swift_code: bank.swift_code,
            branches: Some(branches),
        });
    }

    let branch = db::get_branch(conn, swift_code)?
        .ok_or_else(|| ApiError::NotFound("Bank branch not found".to_string()))?;
    let country_name = country_name_of(conn, &branch.country_iso2_code)?;

    Ok(SwiftCodeSummary {
        address: trimmed(branch.address),
        bank_name: branch.name,
        country_iso2: branch.country_iso2_code,
        country_name,
        is_headquarter: false,
        swift_code: branch.swift_code,
        branches: None,
    })
}

/// Look up every bank and branch registered in a country.
pub fn lookup_country(conn: &Connection, iso2_code: &str) -> Result<CountrySummary, ApiError> {
    validate_iso2_code(iso2_code)?;

    let country = db::get_country(conn, iso2_code)?
        .ok_or_else(|| ApiError::NotFound("Country not found".to_string()))?;

    let mut swift_codes: Vec<BankEntry> = db::get_banks_by_country(conn, iso2_code)?
        .into_iter()
        .map(bank_entry)
        .collect();
    swift_codes.extend(
        db::get_branches_by_country(conn, iso2_code)?
            .into_iter()
            .map(branch_entry),
    );

    Ok(CountrySummary {
        country_iso2: country.iso2_code,
        country_name: country.name,
        swift_codes,
    })
}

// ============================================================================
// ADD
// ============================================================================

/// Register one headquarters or branch entry. Returns the confirmation
/// message for the response body.
pub fn add_entry(conn: &Connection, entry: &NewEntry) -> Result<String, ApiError> {
    let country = db::get_country(conn, &entry.country_iso2)?
        .ok_or_else(|| ApiError::NotFound("Country not found".to_string()))?;
    if country.name != entry.country_name {
        return Err(ApiError::InvalidIso2Code(
            "Country name does not match the ISO2 code".to_string(),
        ));
    }

    validate_swift_code(&entry.swift_code, entry.is_headquarter)?;

    if swift::is_headquarters(&entry.swift_code) {
        let bank = Bank {
            swift_code: entry.swift_code.clone(),
            name: entry.bank_name.clone(),
            address: entry.address.clone(),
            country_iso2_code: country.iso2_code,
        };
        if !db::insert_bank_if_absent(conn, &bank)? {
            return Err(ApiError::InvalidSwiftCode("Bank already exists".to_string()));
        }

        return Ok(format!(
            "Bank headquarter with Swift code {} has been added to the system",
            entry.swift_code
        ));
    }

    let headquarters_key = swift::headquarters_key(&entry.swift_code);
    if db::get_bank(conn, &headquarters_key)?.is_none() {
        return Err(ApiError::NotFound("Headquarter bank not found".to_string()));
    }

    let branch = Branch {
        swift_code: entry.swift_code.clone(),
        name: entry.bank_name.clone(),
        address: entry.address.clone(),
        country_iso2_code: country.iso2_code,
        headquarters_swift_code: headquarters_key,
    };
    if !db::insert_branch_if_absent(conn, &branch)? {
        return Err(ApiError::InvalidSwiftCode("Bank already exists".to_string()));
    }

    Ok(format!(
        "Bank branch with Swift code {} has been added to the system",
        entry.swift_code
    ))
}

// ============================================================================
// HELPERS
// ============================================================================

fn country_name_of(conn: &Connection, iso2_code: &str) -> Result<String, ApiError> {
    let country = db::get_country(conn, iso2_code)?
        .ok_or_else(|| ApiError::NotFound("Country not found".to_string()))?;
    Ok(country.name)
}

fn bank_entry(bank: Bank) -> BankEntry {
    BankEntry {
        address: trimmed(bank.address),
        bank_name: bank.name,
        country_iso2: bank.country_iso2_code,
        is_headquarter: true,
        swift_code: bank.swift_code,
    }
}

fn branch_entry(branch: Branch) -> BankEntry {
    BankEntry {
        address: trimmed(branch.address),
        bank_name: branch.name,
        country_iso2: branch.country_iso2_code,
        is_headquarter: false,
        swift_code: branch.swift_code,
    }
}

fn trimmed(address: Option<String>) -> Option<String> {
    address.map(|a| a.trim().to_string())
}

// ============================================================================
// TESTS
// ============================================================================
