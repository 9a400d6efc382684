//! Ingestion of sheets and forecast files.
//!
//! All file I/O in sheetlens flows through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **CSV sheets**: one sheet per file, named after the file stem. Empty
//!   fields become absent cells, `true`/`false` become booleans, and numeric
//!   text becomes numbers. Everything else stays text.
//! - **JSON sheets**: either an array of row objects (one sheet) or an object
//!   mapping sheet names to arrays of row objects.
//! - **Forecast files**: a JSON array of points. Unreadable forecasts degrade
//!   to an empty forecast instead of failing the command.
//! - **stdin**: the `-` path reads CSV from standard input.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use crate::{
    cli::InputArgs,
    data::{CellValue, Row, Sheet, parse_number},
    forecast::ForecastPoint,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const STDIN_SHEET_NAME: &str = "stdin";

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn is_json(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("json")
    )
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Reads every sheet the input arguments point at.
pub fn load_input(input: &InputArgs) -> Result<Vec<Sheet>> {
    let encoding = resolve_encoding(input.input_encoding.as_deref())?;
    let sheets = if is_json(&input.input) {
        load_json_sheets(&input.input, encoding)?
    } else {
        let delimiter = resolve_input_delimiter(&input.input, input.delimiter);
        vec![load_csv_sheet(&input.input, delimiter, encoding)?]
    };
    info!(
        "Loaded {} sheet(s) with {} row(s) from {:?}",
        sheets.len(),
        sheets.iter().map(Sheet::row_count).sum::<usize>(),
        input.input
    );
    Ok(sheets)
}

/// Picks the sheet called `name`, or the first sheet when no name is given.
pub fn select_sheet(sheets: Vec<Sheet>, name: Option<&str>) -> Result<Sheet> {
    match name {
        Some(name) => {
            let available = sheets
                .iter()
                .map(|sheet| sheet.name.clone())
                .collect::<Vec<_>>();
            sheets
                .into_iter()
                .find(|sheet| sheet.name == name)
                .ok_or_else(|| anyhow!("Sheet '{name}' not found (available: {available:?})"))
        }
        None => sheets
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Input does not contain any sheets")),
    }
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(reader)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn load_csv_sheet(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Sheet> {
    let reader = open_input(path)?;
    let name = sheet_name_for(path);
    read_csv_sheet(reader, &name, delimiter, encoding)
        .with_context(|| format!("Reading sheet from {path:?}"))
}

pub fn read_csv_sheet<R>(
    reader: R,
    name: &str,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Sheet>
where
    R: Read,
{
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = reader_headers(&mut reader, encoding)?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        if decoded.len() != headers.len() {
            debug!(
                "Row {} has {} field(s) for {} header(s)",
                row_idx + 2,
                decoded.len(),
                headers.len()
            );
        }
        let row = headers
            .iter()
            .zip(decoded)
            .map(|(header, raw)| (header.clone(), parse_cell(&raw)))
            .collect::<Row>();
        rows.push(row);
    }
    Ok(Sheet::new(name, rows))
}

/// Types a raw CSV field the way spreadsheet readers do.
pub fn parse_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Absent;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Boolean(false);
    }
    match parse_number(trimmed) {
        Some(number) => CellValue::Number(number),
        None => CellValue::String(trimmed.to_string()),
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

pub fn load_json_sheets(path: &Path, encoding: &'static Encoding) -> Result<Vec<Sheet>> {
    let mut bytes = Vec::new();
    open_input(path)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Reading {path:?}"))?;
    let text = decode_bytes(&bytes, encoding)?;
    let document: JsonValue =
        serde_json::from_str(&text).with_context(|| format!("Parsing JSON from {path:?}"))?;
    sheets_from_json(&sheet_name_for(path), &document)
        .with_context(|| format!("Reading sheets from {path:?}"))
}

/// Converts a parsed JSON document into sheets. A top-level array is a single
/// sheet called `default_name`; a top-level object maps sheet names to arrays.
pub fn sheets_from_json(default_name: &str, document: &JsonValue) -> Result<Vec<Sheet>> {
    match document {
        JsonValue::Array(items) => Ok(vec![sheet_from_json_rows(default_name, items)]),
        JsonValue::Object(map) => map
            .iter()
            .map(|(name, value)| match value {
                JsonValue::Array(items) => Ok(sheet_from_json_rows(name, items)),
                _ => bail!("Sheet '{name}' must be an array of row objects"),
            })
            .collect(),
        _ => bail!("Expected an array of rows or an object of sheets"),
    }
}

fn sheet_from_json_rows(name: &str, items: &[JsonValue]) -> Sheet {
    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match item {
            JsonValue::Object(fields) => rows.push(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), cell_from_json(value)))
                    .collect::<Row>(),
            ),
            other => warn!("Skipping entry {idx} of sheet '{name}': not an object ({other})"),
        }
    }
    Sheet::new(name, rows)
}

/// Maps a JSON value onto a scalar cell. Nested arrays and objects are kept as
/// their JSON text.
pub fn cell_from_json(value: &JsonValue) -> CellValue {
    match value {
        JsonValue::Null => CellValue::Absent,
        JsonValue::Bool(b) => CellValue::Boolean(*b),
        JsonValue::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        JsonValue::String(s) => CellValue::String(s.clone()),
        nested => CellValue::String(nested.to_string()),
    }
}

/// Reads forecast points from a JSON array of objects carrying `x_key` and
/// `metric_key`. Any failure is logged and yields an empty forecast.
pub fn load_forecast(path: &Path, x_key: &str, metric_key: &str) -> Vec<ForecastPoint> {
    match read_forecast(path, x_key, metric_key) {
        Ok(points) => {
            info!("Loaded {} forecast point(s) from {:?}", points.len(), path);
            points
        }
        Err(err) => {
            warn!("Ignoring forecast {path:?}: {err:#}");
            Vec::new()
        }
    }
}

fn read_forecast(path: &Path, x_key: &str, metric_key: &str) -> Result<Vec<ForecastPoint>> {
    let file = File::open(path).with_context(|| format!("Opening forecast file {path:?}"))?;
    let document: JsonValue = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing forecast file {path:?}"))?;
    forecast_from_json(&document, x_key, metric_key)
}

pub fn forecast_from_json(
    document: &JsonValue,
    x_key: &str,
    metric_key: &str,
) -> Result<Vec<ForecastPoint>> {
    let JsonValue::Array(items) = document else {
        bail!("Forecast must be an array of points");
    };
    let points = items
        .iter()
        .filter_map(|item| match item {
            JsonValue::Object(fields) => Some(ForecastPoint {
                x: fields.get(x_key).map(cell_from_json).unwrap_or_default(),
                value: fields
                    .get(metric_key)
                    .map(cell_from_json)
                    .unwrap_or_default()
                    .to_number(),
            }),
            _ => None,
        })
        .collect();
    Ok(points)
}

fn sheet_name_for(path: &Path) -> String {
    if is_dash(path) {
        return STDIN_SHEET_NAME.to_string();
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| STDIN_SHEET_NAME.to_string())
}
