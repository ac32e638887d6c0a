use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Date format used for parsing and printing date cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Date(NaiveDate),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Str(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Position on a continuous axis: numbers as-is, dates as days since
    /// 1970-01-01.
    pub fn position(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Date(d) => Some(date_to_days(*d)),
            _ => None,
        }
    }

    /// Hashable form for grouping. `-0.0` and `0.0` share a key, as do all
    /// NaNs.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Num(n) if *n == 0.0 => ValueKey::Num(0f64.to_bits()),
            Value::Num(n) if n.is_nan() => ValueKey::Num(f64::NAN.to_bits()),
            Value::Num(n) => ValueKey::Num(n.to_bits()),
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::Missing => ValueKey::Missing,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Num(_) => 0,
            Value::Date(_) => 1,
            Value::Str(_) => 2,
            Value::Missing => 3,
        }
    }

    /// Total order used for sorting: numbers, dates, strings, then missing.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

/// Grouping key of a [`Value`]; numbers compare by normalised bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Num(u64),
    Str(String),
    Date(NaiveDate),
    Missing,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Negative zero prints as "0" so labels and series keys agree
            Value::Num(n) if *n == 0.0 => f.write_str("0"),
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Missing => f.write_str("NA"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

pub fn date_to_days(d: NaiveDate) -> f64 {
    (d.num_days_from_ce() - EPOCH_DAYS_FROM_CE) as f64
}

pub fn days_to_date(days: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.round() as i32 + EPOCH_DAYS_FROM_CE)
}

// 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Kind of values a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Numeric,
    Categorical,
    Date,
}

/// An ordered table of typed records.
///
/// Row-major like the CSV it usually comes from; every row has exactly one
/// value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one record.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .map(|idx| &self.values[idx])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(Error::Dataset(format!(
                "row {} has {} values but there are {} columns",
                idx + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Same columns, different rows. Callers guarantee the row width.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::missing_column(name, &self.columns))
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Numeric view of a column; `None` for missing cells.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .map(|r| match &r[idx] {
                Value::Num(n) => Ok(Some(*n)),
                Value::Missing => Ok(None),
                other => Err(Error::SchemaMismatch {
                    column: self.columns[idx].clone(),
                    reason: format!("expected a numeric column, found '{}'", other),
                }),
            })
            .collect()
    }

    /// Type of a column, judged from its non-missing values. An all-missing
    /// column counts as numeric.
    pub fn column_type(&self, name: &str) -> Result<ColumnType> {
        let idx = self.column_index(name)?;
        let mut kind = None;
        for row in &self.rows {
            let this = match &row[idx] {
                Value::Num(_) => ColumnType::Numeric,
                Value::Date(_) => ColumnType::Date,
                Value::Str(_) => ColumnType::Categorical,
                Value::Missing => continue,
            };
            match kind {
                None => kind = Some(this),
                Some(k) if k != this => return Ok(ColumnType::Categorical),
                _ => {}
            }
        }
        Ok(kind.unwrap_or(ColumnType::Numeric))
    }

    /// Load CSV with a header row, inferring column types.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let mut raw: Vec<Vec<String>> = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(Error::Dataset(format!(
                    "CSV record {} has {} fields, header has {}",
                    line + 1,
                    record.len(),
                    headers.len()
                )));
            }
            raw.push(record.iter().map(|s| s.to_string()).collect());
        }

        Ok(Self::from_strings(headers, raw))
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file)
    }

    /// Create a Dataset from a JSON array of objects. Columns are the keys of
    /// the first object.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| Error::Dataset("input data must be a JSON array of objects".to_string()))?;

        let Some(first) = array.first() else {
            return Ok(Self::empty(Vec::new()));
        };
        let first_obj = first
            .as_object()
            .ok_or_else(|| Error::Dataset("items in array must be objects".to_string()))?;
        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut raw = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| Error::Dataset("items in array must be objects".to_string()))?;
            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(JsonValue::String(s)) => s.clone(),
                    Some(JsonValue::Number(n)) => n.to_string(),
                    Some(JsonValue::Bool(b)) => b.to_string(),
                    Some(JsonValue::Null) | None => String::new(),
                    _ => {
                        return Err(Error::Dataset(format!(
                            "unsupported value type for field '{}'",
                            header
                        )))
                    }
                };
                row.push(cell);
            }
            raw.push(row);
        }

        Ok(Self::from_strings(headers, raw))
    }

    fn from_strings(headers: Vec<String>, raw: Vec<Vec<String>>) -> Self {
        let kinds: Vec<ColumnType> = (0..headers.len())
            .map(|idx| infer_type(raw.iter().map(|r| r[idx].as_str())))
            .collect();

        let rows = raw
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .zip(&kinds)
                    .map(|(cell, kind)| parse_cell(cell, *kind))
                    .collect()
            })
            .collect();

        Self { columns: headers, rows }
    }
}

fn is_missing_cell(s: &str) -> bool {
    s.is_empty() || s == "NA"
}

fn infer_type<'a, I: Iterator<Item = &'a str>>(cells: I) -> ColumnType {
    let mut numeric = true;
    let mut date = true;
    for cell in cells.filter(|c| !is_missing_cell(c)) {
        numeric &= cell.parse::<f64>().is_ok();
        date &= NaiveDate::parse_from_str(cell, DATE_FORMAT).is_ok();
        if !numeric && !date {
            return ColumnType::Categorical;
        }
    }
    if numeric {
        ColumnType::Numeric
    } else {
        ColumnType::Date
    }
}

fn parse_cell(cell: String, kind: ColumnType) -> Value {
    if is_missing_cell(&cell) {
        return Value::Missing;
    }
    match kind {
        ColumnType::Numeric => cell.parse::<f64>().map(Value::Num).unwrap_or(Value::Str(cell)),
        ColumnType::Date => NaiveDate::parse_from_str(&cell, DATE_FORMAT)
            .map(Value::Date)
            .unwrap_or(Value::Str(cell)),
        ColumnType::Categorical => Value::Str(cell),
    }
}
