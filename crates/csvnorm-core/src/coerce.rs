use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::schema::{Column, Table};
use crate::types::NativeType;
use crate::value::{DATE_FORMAT, FlatRow, ResolvedRow, TIMESTAMP_FORMAT, Value};

/// How text cells are read back into native values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceOptions {
    pub date_format: String,
    pub timestamp_format: String,
    /// Also parse integer and float columns. Off by default: numeric text is
    /// left for the storage engine to convert.
    pub numeric: bool,
}

impl Default for CoerceOptions {
    fn default() -> Self {
        Self {
            date_format: DATE_FORMAT.to_string(),
            timestamp_format: TIMESTAMP_FORMAT.to_string(),
            numeric: false,
        }
    }
}

/// Converts text cells of a flat row to the native types of the table.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    columns: BTreeMap<String, Column>,
    options: CoerceOptions,
}

impl TypeCoercer {
    /// Coerce every text value whose key is a column of the table. Other keys
    /// and already-native values pass through.
    pub fn coerce(&self, row: &FlatRow) -> Result<ResolvedRow> {
        row.iter()
            .map(|(key, value)| {
                let coerced = match self.columns.get(key) {
                    Some(column) => coerce_value(column, value, &self.options)?,
                    None => value.clone(),
                };
                Ok((key.clone(), coerced))
            })
            .collect()
    }
}

pub fn make_type_coercer(table: &Table, options: CoerceOptions) -> TypeCoercer {
    TypeCoercer {
        columns: table
            .columns
            .iter()
            .map(|column| (column.name.clone(), column.clone()))
            .collect(),
        options,
    }
}

/// Coerce a single value to `column`'s native type. Only text is converted.
pub fn coerce_value(column: &Column, value: &Value, options: &CoerceOptions) -> Result<Value> {
    let Value::Text(text) = value else {
        return Ok(value.clone());
    };

    let native = column.column_type.native;
    let parsed = match native {
        NativeType::Boolean => parse_bool(text).map(Value::Bool),
        NativeType::Date => parse_date(text, &options.date_format).map(Value::Date),
        NativeType::Timestamp => {
            parse_timestamp(text, &options.timestamp_format).map(Value::Timestamp)
        }
        NativeType::Integer if options.numeric => text.trim().parse::<i64>().ok().map(Value::Int),
        NativeType::Float if options.numeric => text.trim().parse::<f64>().ok().map(Value::Float),
        _ => return Ok(value.clone()),
    };

    parsed.ok_or_else(|| Error::Coercion {
        column: column.name.clone(),
        value: text.clone(),
        expected: native.to_string(),
    })
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_date(text: &str, format: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, format)
        .or_else(|_| NaiveDate::parse_from_str(text, DATE_FORMAT))
        .ok()
}

fn parse_timestamp(text: &str, format: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, format)
        .or_else(|_| NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|value| value.naive_utc())
        })
}
