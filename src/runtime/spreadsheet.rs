/// Spreadsheet codec for spreadsheet steps
///
/// Rows are JSON objects. Writing produces an `.xlsx` workbook with a single
/// `Sheet1` whose header row is the union of row keys in first-seen order.
/// Reading takes the first sheet, uses its first row as headers and returns
/// one object per non-empty row, omitting empty cells.

use crate::error::StepError;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Excel's column ceiling
const MAX_COLUMNS: usize = 16_384;

/// Resolve a configured path; relative paths live under `files_dir`
pub fn resolve_path(files_dir: &Path, raw: Option<&str>) -> Result<PathBuf, StepError> {
    let raw = raw
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| StepError::config("File path is required"))?;
    let path = Path::new(raw);
    if path.file_name().is_none() {
        return Err(StepError::config(format!("Invalid file path: {}", raw)));
    }
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        files_dir.join(path)
    })
}

/// Write `rows` to `path`, replacing any existing file
pub fn write_rows(path: &Path, rows: &[Value]) -> Result<(), StepError> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    if headers.len() > MAX_COLUMNS {
        return Err(StepError::File(format!("{} columns exceed the sheet limit", headers.len())));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StepError::File(format!("{}: {}", parent.display(), e)))?;
    }

    let xlsx = |e: rust_xlsxwriter::XlsxError| StepError::File(format!("{}: {}", path.display(), e));

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1").map_err(xlsx)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header.as_str()).map_err(xlsx)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let Value::Object(map) = row else { continue };
        let excel_row = (i + 1) as u32;
        for (col, header) in headers.iter().enumerate() {
            let col = col as u16;
            match map.get(header) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => {
                    worksheet.write_string(excel_row, col, s.as_str()).map_err(xlsx)?;
                }
                Some(Value::Number(n)) => {
                    worksheet.write_number(excel_row, col, n.as_f64().unwrap_or_default()).map_err(xlsx)?;
                }
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(excel_row, col, *b).map_err(xlsx)?;
                }
                Some(nested) => {
                    worksheet.write_string(excel_row, col, nested.to_string()).map_err(xlsx)?;
                }
            }
        }
    }

    workbook.save(path).map_err(xlsx)?;
    Ok(())
}

/// Read the first sheet of `path` as row objects
pub fn read_rows(path: &Path) -> Result<Vec<Value>, StepError> {
    if !path.exists() {
        return Err(StepError::File(format!("File not found: {}", path.display())));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| StepError::File(format!("{}: {}", path.display(), e)))?;
    let Some(first_sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| StepError::File(format!("{} [{}]: {}", path.display(), first_sheet, e)))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<Option<String>> = header_row
        .iter()
        .map(|cell| match cell_value(cell) {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .collect();

    let records = rows
        .filter_map(|cells| {
            let record: Map<String, Value> = headers
                .iter()
                .zip(cells)
                .filter_map(|(header, cell)| {
                    let header = header.as_ref()?;
                    let value = cell_value(cell);
                    (!value.is_null()).then(|| (header.clone(), value))
                })
                .collect();
            (!record.is_empty()).then_some(Value::Object(record))
        })
        .collect();

    Ok(records)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(*f as i64),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_path_is_a_configuration_error() {
        let base = Path::new("/tmp");
        assert!(matches!(resolve_path(base, None), Err(StepError::Config(_))));
        assert!(matches!(resolve_path(base, Some("  ")), Err(StepError::Config(_))));
        assert_eq!(resolve_path(base, Some("out/a.xlsx")).unwrap(), PathBuf::from("/tmp/out/a.xlsx"));
        assert_eq!(resolve_path(base, Some("/data/b.xlsx")).unwrap(), PathBuf::from("/data/b.xlsx"));
    }

    #[test]
    fn reading_a_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_rows(&dir.path().join("nope.xlsx")).unwrap_err();
        assert!(matches!(err, StepError::File(msg) if msg.contains("File not found")));
    }

    #[test]
    fn rows_with_uneven_keys_share_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/contacts.xlsx");
        write_rows(&path, &[
            json!({"name": "Ada", "age": 36}),
            json!({"name": "Grace", "email": "grace@navy.mil", "active": true}),
        ])
        .unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows, vec![
            json!({"name": "Ada", "age": 36}),
            json!({"name": "Grace", "email": "grace@navy.mil", "active": true}),
        ]);
    }
}
