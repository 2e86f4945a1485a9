// 📄 Tabular Source - CSV and XLSX registry files
//
// The registry arrives as a spreadsheet with one row per SWIFT code.
// Both loaders produce the same record sequence in file order; all cell
// values are trimmed and blank optionals become None.

use anyhow::{bail, Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// One row of the registry spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwiftRecord {
    #[serde(rename = "COUNTRY ISO2 CODE")]
    pub country_iso2: String,

    #[serde(rename = "SWIFT CODE")]
    pub swift_code: String,

    #[serde(rename = "CODE TYPE")]
    pub code_type: String,

    #[serde(rename = "NAME")]
    pub name: String,

    #[serde(rename = "ADDRESS")]
    #[serde(default)]
    pub address: Option<String>,

    #[serde(rename = "COUNTRY NAME")]
    pub country_name: String,

    #[serde(rename = "TIME ZONE")]
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

/// Detect the source format from the file extension.
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(SourceFormat::Csv),
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Ok(SourceFormat::Xlsx),
        _ => bail!("Unsupported source file format: {}", path.display()),
    }
}

/// Load all records from a registry file, preserving row order.
pub fn load_records(path: &Path) -> Result<Vec<SwiftRecord>> {
    match detect_format(path)? {
        SourceFormat::Csv => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_csv(file)
        }
        SourceFormat::Xlsx => read_xlsx(path),
    }
}

/// Read records from CSV data. Takes any reader so tests can feed strings.
pub fn read_csv(input: impl io::Read) -> Result<Vec<SwiftRecord>> {
    let mut rdr = csv::Reader::from_reader(input);

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize().enumerate() {
        // Header is row 1, so the first data row is row 2
        let row_number = idx + 2;
        let record: SwiftRecord =
            result.with_context(|| format!("Failed to parse row {row_number}"))?;
        records.push(normalize(record, row_number)?);
    }

    Ok(records)
}

/// Read records from the first sheet of an XLSX workbook.
pub fn read_xlsx(path: &Path) -> Result<Vec<SwiftRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .context("Workbook has no sheets")?
        .clone();

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet: {sheet_name}"))?;

    let mut rows = range.rows();
    let header = rows.next().context("Sheet has no header row")?;
    let columns = ColumnMap::from_header(header)?;

    let mut records = Vec::new();
    for (idx, row) in rows.enumerate() {
        let row_number = idx + 2;
        if is_blank_row(row) {
            continue;
        }
        records.push(normalize(columns.extract(row), row_number)?);
    }

    Ok(records)
}

/// Column positions resolved from the header row by exact name.
struct ColumnMap {
    country_iso2: usize,
    swift_code: usize,
    code_type: usize,
    name: usize,
    address: Option<usize>,
    country_name: usize,
    time_zone: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[Data]) -> Result<Self> {
        let find = |column: &str| {
            header.iter().position(|cell| match cell {
                Data::String(s) => s.trim() == column,
                _ => false,
            })
        };
        let require = |column: &str| {
            find(column).with_context(|| format!("Missing required column '{column}'"))
        };

        Ok(ColumnMap {
            country_iso2: require("COUNTRY ISO2 CODE")?,
            swift_code: require("SWIFT CODE")?,
            code_type: require("CODE TYPE")?,
            name: require("NAME")?,
            address: find("ADDRESS"),
            country_name: require("COUNTRY NAME")?,
            time_zone: find("TIME ZONE"),
        })
    }

    fn extract(&self, row: &[Data]) -> SwiftRecord {
        SwiftRecord {
            country_iso2: cell_string(row, self.country_iso2).unwrap_or_default(),
            swift_code: cell_string(row, self.swift_code).unwrap_or_default(),
            code_type: cell_string(row, self.code_type).unwrap_or_default(),
            name: cell_string(row, self.name).unwrap_or_default(),
            address: self.address.and_then(|col| cell_string(row, col)),
            country_name: cell_string(row, self.country_name).unwrap_or_default(),
            time_zone: self.time_zone.and_then(|col| cell_string(row, col)),
        }
    }
}

fn cell_string(row: &[Data], col: usize) -> Option<String> {
    row.get(col).and_then(|cell| match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                Some((*f as i64).to_string())
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn is_blank_row(row: &[Data]) -> bool {
    row.iter().all(|cell| match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

/// Trim every value; a blank required value aborts the load, a blank
/// optional value becomes None.
fn normalize(record: SwiftRecord, row_number: usize) -> Result<SwiftRecord> {
    Ok(SwiftRecord {
        country_iso2: required_value(&record.country_iso2, "COUNTRY ISO2 CODE", row_number)?,
        swift_code: required_value(&record.swift_code, "SWIFT CODE", row_number)?,
        code_type: required_value(&record.code_type, "CODE TYPE", row_number)?,
        name: required_value(&record.name, "NAME", row_number)?,
        address: blank_to_none(record.address),
        country_name: required_value(&record.country_name, "COUNTRY NAME", row_number)?,
        time_zone: blank_to_none(record.time_zone),
    })
}

fn required_value(raw: &str, column: &str, row_number: usize) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        bail!("Row {row_number}: missing required value in column '{column}'");
    }
    Ok(value.to_string())
}

fn blank_to_none(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const HEADERS: [&str; 7] = [
        "COUNTRY ISO2 CODE",
        "SWIFT CODE",
        "CODE TYPE",
        "NAME",
        "ADDRESS",
        "COUNTRY NAME",
        "TIME ZONE",
    ];

    #[test]
    fn test_read_csv_records() {
        let data = "\
COUNTRY ISO2 CODE,SWIFT CODE,CODE TYPE,NAME,ADDRESS,COUNTRY NAME,TIME ZONE
CH,AAAABBCCXXX,BIC11,CREDIT BANK,  Paradeplatz 8  ,Switzerland,Europe/Zurich
CH,AAAABBCC123,BIC11,CREDIT BANK GENEVA,,Switzerland,Europe/Zurich
";

        let records = read_csv(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].swift_code, "AAAABBCCXXX");
        assert_eq!(records[0].address.as_deref(), Some("Paradeplatz 8"));
        assert_eq!(records[1].swift_code, "AAAABBCC123");
        assert_eq!(records[1].address, None, "blank address should load as None");
        assert_eq!(records[1].time_zone.as_deref(), Some("Europe/Zurich"));
    }

    #[test]
    fn test_read_csv_without_optional_columns() {
        let data = "\
COUNTRY ISO2 CODE,SWIFT CODE,CODE TYPE,NAME,COUNTRY NAME
PL,BREXPLPWXXX,BIC11,MBANK,Poland
";

        let records = read_csv(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, None);
        assert_eq!(records[0].time_zone, None);
    }

    #[test]
    fn test_read_csv_missing_required_value_fails() {
        let data = "\
COUNTRY ISO2 CODE,SWIFT CODE,CODE TYPE,NAME,COUNTRY NAME
PL,BREXPLPWXXX,BIC11,MBANK,Poland
PL,BREXPLPW001,BIC11,   ,Poland
";

        let err = read_csv(data.as_bytes()).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("Row 3"), "unexpected error: {message}");
        assert!(message.contains("NAME"), "unexpected error: {message}");
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format(Path::new("registry.csv")).unwrap(),
            SourceFormat::Csv
        );
        assert_eq!(
            detect_format(Path::new("db.XLSX")).unwrap(),
            SourceFormat::Xlsx
        );
        assert!(detect_format(Path::new("registry.json")).is_err());
        assert!(detect_format(Path::new("registry")).is_err());
    }

    fn write_workbook(path: &PathBuf, rows: &[[&str; 7]]) {
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            for (col, header) in HEADERS.iter().enumerate() {
                sheet.write_string(0, col as u16, *header).unwrap();
            }
            for (row_idx, row) in rows.iter().enumerate() {
                for (col, value) in row.iter().enumerate() {
                    if !value.is_empty() {
                        sheet
                            .write_string(row_idx as u32 + 1, col as u16, *value)
                            .unwrap();
                    }
                }
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_read_xlsx_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.xlsx");

        write_workbook(
            &path,
            &[
                [
                    "PL",
                    "BREXPLPWXXX",
                    "BIC11",
                    "MBANK",
                    "UL. PROSTA 18",
                    "Poland",
                    "Europe/Warsaw",
                ],
                ["PL", "BREXPLPW001", "BIC11", "MBANK LODZ", "", "Poland", ""],
            ],
        );

        let records = read_xlsx(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].swift_code, "BREXPLPWXXX");
        assert_eq!(records[0].address.as_deref(), Some("UL. PROSTA 18"));
        assert_eq!(records[1].swift_code, "BREXPLPW001");
        assert_eq!(records[1].address, None);
        assert_eq!(records[1].time_zone, None);
    }

    #[test]
    fn test_read_xlsx_skips_blank_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.xlsx");

        // Row 2 of the sheet left entirely blank
        write_workbook(
            &path,
            &[
                ["", "", "", "", "", "", ""],
                ["PL", "BREXPLPWXXX", "BIC11", "MBANK", "", "Poland", ""],
            ],
        );

        let records = read_xlsx(&path).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].swift_code, "BREXPLPWXXX");
    }

    #[test]
    fn test_read_xlsx_missing_required_column_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.xlsx");

        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            // No SWIFT CODE column
            for (col, header) in ["COUNTRY ISO2 CODE", "CODE TYPE", "NAME", "COUNTRY NAME"]
                .iter()
                .enumerate()
            {
                sheet.write_string(0, col as u16, *header).unwrap();
            }
        }
        workbook.save(&path).unwrap();

        let err = read_xlsx(&path).unwrap_err();
        assert!(
            err.to_string().contains("SWIFT CODE"),
            "unexpected error: {err}"
        );
    }
}
