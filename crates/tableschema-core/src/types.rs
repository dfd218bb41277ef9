//! Logical and native type enumerations.
//!
//! `LogicalType` is the portable Table Schema vocabulary found in descriptors.
//! `NativeType` is the closed set of relational column types this system
//! creates and understands when reflecting existing tables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::mapping::UnsupportedType;

/// Table Schema field type.
///
/// Every type name defined by Table Schema is represented so that descriptors
/// parse; only a subset has a relational mapping (see [`crate::mapping`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Unicode string
    String,
    /// Whole number
    Integer,
    /// Floating point number
    Number,
    /// Boolean
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time
    Datetime,
    /// Calendar year
    Year,
    /// Year and month
    Yearmonth,
    /// ISO 8601 duration
    Duration,
    /// Geographic point
    Geopoint,
    /// GeoJSON object
    Geojson,
    /// Any value
    Any,
}

impl LogicalType {
    /// Every logical type, in Table Schema order.
    pub const ALL: [LogicalType; 15] = [
        LogicalType::String,
        LogicalType::Integer,
        LogicalType::Number,
        LogicalType::Boolean,
        LogicalType::Object,
        LogicalType::Array,
        LogicalType::Date,
        LogicalType::Time,
        LogicalType::Datetime,
        LogicalType::Year,
        LogicalType::Yearmonth,
        LogicalType::Duration,
        LogicalType::Geopoint,
        LogicalType::Geojson,
        LogicalType::Any,
    ];

    /// The descriptor spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Date => "date",
            Self::Time => "time",
            Self::Datetime => "datetime",
            Self::Year => "year",
            Self::Yearmonth => "yearmonth",
            Self::Duration => "duration",
            Self::Geopoint => "geopoint",
            Self::Geojson => "geojson",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = UnsupportedType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnsupportedType::UnknownLogical(s.to_string()))
    }
}

impl Serialize for LogicalType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogicalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Relational column type.
///
/// Spelled the PostgreSQL way; `postgresql-types` owns the DDL spelling and
/// the parsing of `information_schema` names into this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// TEXT
    Text,
    /// VARCHAR / CHARACTER VARYING (reflection only)
    Varchar,
    /// UUID (reflection only)
    Uuid,
    /// INTEGER
    Integer,
    /// BIGINT (reflection only, unmapped)
    BigInt,
    /// DOUBLE PRECISION
    DoublePrecision,
    /// BOOLEAN
    Boolean,
    /// JSON (reflection only)
    Json,
    /// JSONB
    Jsonb,
    /// DATE
    Date,
    /// TIME
    Time,
    /// TIMESTAMP
    Timestamp,
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "TEXT",
            Self::Varchar => "VARCHAR",
            Self::Uuid => "UUID",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::DoublePrecision => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
            Self::Json => "JSON",
            Self::Jsonb => "JSONB",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
        };
        f.write_str(name)
    }
}
