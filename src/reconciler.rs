// ⚖️ Reconciler - two-pass registry ingestion
//
// Pass 1 establishes country and headquarters identity, pass 2 links every
// branch to its headquarters through the derived code prefix. Pass 2 only
// starts once pass 1 has persisted all headquarters, so a branch row may
// appear before its headquarters row in the input.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::db::{self, Bank, Branch, Country};
use crate::source::SwiftRecord;
use crate::swift;

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Per-record condition reported during a run without stopping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// No bank row matched the branch's derived headquarters key.
    MissingHeadquarters { swift_code: String },
    /// SWIFT code failed the length gate; the record contributes no rows.
    MalformedCode { swift_code: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingHeadquarters { swift_code } => {
                write!(f, "Didn't find headquarter for this bank branch: {swift_code}")
            }
            Diagnostic::MalformedCode { swift_code } => {
                write!(f, "Malformed SWIFT code, record skipped: {swift_code}")
            }
        }
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// Outcome of a full two-pass run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub records_seen: usize,
    pub countries_inserted: usize,
    pub countries_skipped: usize,
    pub banks_inserted: usize,
    pub banks_skipped: usize,
    pub branches_inserted: usize,
    pub branches_skipped: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    fn new(records_seen: usize) -> Self {
        RunReport {
            records_seen,
            countries_inserted: 0,
            countries_skipped: 0,
            banks_inserted: 0,
            banks_skipped: 0,
            branches_inserted: 0,
            branches_skipped: 0,
            diagnostics: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn missing_headquarters(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::MissingHeadquarters { .. }))
            .count()
    }

    pub fn malformed_codes(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::MalformedCode { .. }))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records: {} countries, {} banks, {} branches inserted ({} skipped as existing, {} diagnostics)",
            self.records_seen,
            self.countries_inserted,
            self.banks_inserted,
            self.branches_inserted,
            self.countries_skipped + self.banks_skipped + self.branches_skipped,
            self.diagnostics.len()
        )
    }
}

// ============================================================================
// TWO-PASS RUN
// ============================================================================

/// Run both passes over the records against an initialized database.
///
/// Every mutation happens immediately per record; a storage failure aborts
/// the run and leaves the rows written so far in place.
pub fn reconcile(conn: &Connection, records: &[SwiftRecord]) -> Result<RunReport> {
    let mut report = RunReport::new(records.len());

    ingest_countries_and_headquarters(conn, records, &mut report)?;
    link_branches(conn, records, &mut report)?;

    report.completed_at = Utc::now();
    info!(
        countries = report.countries_inserted,
        banks = report.banks_inserted,
        branches = report.branches_inserted,
        diagnostics = report.diagnostics.len(),
        "reconciliation complete"
    );

    Ok(report)
}

/// Pass 1: upsert-if-absent the country of every record, and the bank of
/// every headquarters record. First-seen values win.
fn ingest_countries_and_headquarters(
    conn: &Connection,
    records: &[SwiftRecord],
    report: &mut RunReport,
) -> Result<()> {
    for record in records {
        if !swift::has_valid_length(&record.swift_code) {
            let diagnostic = Diagnostic::MalformedCode {
                swift_code: record.swift_code.clone(),
            };
            warn!("{diagnostic}");
            report.diagnostics.push(diagnostic);
            continue;
        }

        let country = Country {
            iso2_code: record.country_iso2.clone(),
            name: record.country_name.clone(),
            time_zone: record.time_zone.clone(),
        };
        if db::insert_country_if_absent(conn, &country)? {
            report.countries_inserted += 1;
        } else {
            report.countries_skipped += 1;
        }

        if swift::is_headquarters(&record.swift_code) {
            let bank = Bank {
                swift_code: record.swift_code.clone(),
                name: record.name.clone(),
                address: record.address.clone(),
                country_iso2_code: record.country_iso2.clone(),
            };
            if db::insert_bank_if_absent(conn, &bank)? {
                report.banks_inserted += 1;
            } else {
                report.banks_skipped += 1;
            }
        }
    }

    Ok(())
}

/// Pass 2: link every branch record to its headquarters bank, or report it
/// when no bank matches the derived key. Reads banks, never writes them.
fn link_branches(
    conn: &Connection,
    records: &[SwiftRecord],
    report: &mut RunReport,
) -> Result<()> {
    for record in records {
        // Malformed codes were already reported in pass 1
        if !swift::has_valid_length(&record.swift_code) {
            continue;
        }
        if swift::is_headquarters(&record.swift_code) {
            continue;
        }

        let headquarters_key = swift::headquarters_key(&record.swift_code);
        if !db::bank_exists(conn, &headquarters_key)? {
            let diagnostic = Diagnostic::MissingHeadquarters {
                swift_code: record.swift_code.clone(),
            };
            warn!("{diagnostic}");
            report.diagnostics.push(diagnostic);
            continue;
        }

        let branch = Branch {
            swift_code: record.swift_code.clone(),
            name: record.name.clone(),
            address: record.address.clone(),
            country_iso2_code: record.country_iso2.clone(),
            headquarters_swift_code: headquarters_key,
        };
        if db::insert_branch_if_absent(conn, &branch)? {
            report.branches_inserted += 1;
        } else {
            report.branches_skipped += 1;
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{setup_database, table_counts};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn record(iso2: &str, swift: &str, name: &str, country_name: &str) -> SwiftRecord {
        SwiftRecord {
            country_iso2: iso2.to_string(),
            swift_code: swift.to_string(),
            code_type: "BIC11".to_string(),
            name: name.to_string(),
            address: Some("1 Bank Street".to_string()),
            country_name: country_name.to_string(),
            time_zone: Some("Europe/Zurich".to_string()),
        }
    }

    #[test]
    fn test_headquarters_and_branch_linked() {
        let conn = test_conn();
        let records = vec![
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
            record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland"),
        ];

        let report = reconcile(&conn, &records).unwrap();

        assert_eq!(report.countries_inserted, 1);
        assert_eq!(report.banks_inserted, 1);
        assert_eq!(report.branches_inserted, 1);
        assert!(report.diagnostics.is_empty());

        let branch = db::get_branch(&conn, "AAAABBCC123").unwrap().unwrap();
        assert_eq!(branch.headquarters_swift_code, "AAAABBCCXXX");
        assert_eq!(branch.country_iso2_code, "CH");
    }

    #[test]
    fn test_branch_before_headquarters_still_links() {
        let conn = test_conn();
        // Branch row first: pass 1 completes before pass 2 starts, so the
        // lookup still succeeds
        let records = vec![
            record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland"),
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
        ];

        let report = reconcile(&conn, &records).unwrap();

        assert_eq!(report.branches_inserted, 1);
        assert!(report.diagnostics.is_empty());

        let branch = db::get_branch(&conn, "AAAABBCC123").unwrap().unwrap();
        assert_eq!(branch.headquarters_swift_code, "AAAABBCCXXX");
    }

    #[test]
    fn test_orphan_branch_reported_not_inserted() {
        let conn = test_conn();
        let records = vec![record("US", "ZZZZYYWWVVV", "LONE BRANCH", "United States")];

        let report = reconcile(&conn, &records).unwrap();

        assert_eq!(report.branches_inserted, 0);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::MissingHeadquarters {
                swift_code: "ZZZZYYWWVVV".to_string()
            }]
        );
        assert_eq!(
            report.diagnostics[0].to_string(),
            "Didn't find headquarter for this bank branch: ZZZZYYWWVVV"
        );
        assert_eq!(table_counts(&conn).unwrap().branches, 0);
        // The orphan's country still lands in pass 1
        assert_eq!(table_counts(&conn).unwrap().countries, 1);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let conn = test_conn();
        let records = vec![
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
            record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland"),
        ];

        reconcile(&conn, &records).unwrap();
        let second = reconcile(&conn, &records).unwrap();

        assert_eq!(second.countries_inserted, 0);
        assert_eq!(second.banks_inserted, 0);
        assert_eq!(second.branches_inserted, 0);
        assert_eq!(second.countries_skipped, 2);
        assert_eq!(second.banks_skipped, 1);
        assert_eq!(second.branches_skipped, 1);

        let counts = table_counts(&conn).unwrap();
        assert_eq!(counts.countries, 1);
        assert_eq!(counts.banks, 1);
        assert_eq!(counts.branches, 1);
    }

    #[test]
    fn test_duplicate_country_first_name_wins() {
        let conn = test_conn();
        let records = vec![
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
            record("CH", "WXYZQQRRXXX", "OTHER BANK", "Schweiz"),
        ];

        reconcile(&conn, &records).unwrap();

        let country = db::get_country(&conn, "CH").unwrap().unwrap();
        assert_eq!(country.name, "Switzerland");
    }

    #[test]
    fn test_order_independent_row_sets() {
        let records = vec![
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
            record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland"),
            record("PL", "BREXPLPWXXX", "MBANK", "Poland"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let conn_a = test_conn();
        reconcile(&conn_a, &records).unwrap();
        let conn_b = test_conn();
        reconcile(&conn_b, &reversed).unwrap();

        assert_eq!(
            table_counts(&conn_a).unwrap(),
            table_counts(&conn_b).unwrap()
        );
        assert_eq!(
            db::get_bank(&conn_a, "AAAABBCCXXX").unwrap(),
            db::get_bank(&conn_b, "AAAABBCCXXX").unwrap()
        );
        assert_eq!(
            db::get_branch(&conn_a, "AAAABBCC123").unwrap(),
            db::get_branch(&conn_b, "AAAABBCC123").unwrap()
        );
    }

    #[test]
    fn test_late_headquarters_picked_up_on_rerun() {
        let conn = test_conn();
        let branch_only = vec![record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland")];

        let first = reconcile(&conn, &branch_only).unwrap();
        assert_eq!(first.missing_headquarters(), 1);
        assert_eq!(table_counts(&conn).unwrap().branches, 0);

        // Extended input on a later run brings the headquarters in;
        // pass 2 re-checks bank existence and links the branch
        let extended = vec![
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
            record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland"),
        ];
        let second = reconcile(&conn, &extended).unwrap();

        assert_eq!(second.banks_inserted, 1);
        assert_eq!(second.branches_inserted, 1);
        assert!(second.diagnostics.is_empty());

        let branch = db::get_branch(&conn, "AAAABBCC123").unwrap().unwrap();
        assert_eq!(branch.headquarters_swift_code, "AAAABBCCXXX");
    }

    #[test]
    fn test_malformed_code_contributes_nothing() {
        let conn = test_conn();
        let records = vec![
            record("CH", "SHORT", "BROKEN ROW", "Switzerland"),
            record("PL", "BREXPLPWXXX", "MBANK", "Poland"),
        ];

        let report = reconcile(&conn, &records).unwrap();

        assert_eq!(report.malformed_codes(), 1);
        assert_eq!(
            report.diagnostics[0],
            Diagnostic::MalformedCode {
                swift_code: "SHORT".to_string()
            }
        );

        // The malformed record adds no rows at all, not even its country
        let counts = table_counts(&conn).unwrap();
        assert_eq!(counts.countries, 1);
        assert_eq!(counts.banks, 1);
        assert!(db::get_country(&conn, "CH").unwrap().is_none());
    }

    #[test]
    fn test_report_summary_counts() {
        let conn = test_conn();
        let records = vec![
            record("CH", "AAAABBCCXXX", "CREDIT BANK", "Switzerland"),
            record("CH", "AAAABBCC123", "CREDIT BANK GENEVA", "Switzerland"),
            record("US", "ZZZZYYWWVVV", "LONE BRANCH", "United States"),
        ];

        let report = reconcile(&conn, &records).unwrap();

        assert_eq!(report.records_seen, 3);
        let summary = report.summary();
        assert!(summary.contains("3 records"), "summary: {summary}");
        assert!(summary.contains("1 diagnostics"), "summary: {summary}");
    }
}
