use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DATETIME_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// One post in a loaded collection; `index` is its position in that collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub index: usize,
    pub content: String,
    pub datetime: String,
}

/// How rows of a source's export file become [`PostRecord`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mapper {
    #[default]
    FacebookGroup,
    Plain,
}

impl Mapper {
    /// Maps one row; epoch timestamps are rendered in `zone`.
    pub fn map_row(&self, index: usize, row: Value, zone: &Tz) -> Result<PostRecord> {
        match self {
            Mapper::FacebookGroup => facebook_group_row(index, row, zone),
            Mapper::Plain => plain_row(index, row, zone),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    pub data_file: String,
    #[serde(default)]
    pub mapper: Mapper,
}

/// Reads `<data_dir>/<data_file>` as a JSON array and maps every row.
pub fn load(data_dir: &Path, source: &SourceConfig, zone: &Tz) -> Result<Vec<PostRecord>> {
    let path = data_dir.join(&source.data_file);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("source: read {}", path.display()))?;
    let rows: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("source: parse {} as a JSON array", path.display()))?;
    if rows.is_empty() {
        bail!("source: {} contains no posts", path.display());
    }

    let records = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            source
                .mapper
                .map_row(index, row, zone)
                .with_context(|| format!("source: map row {index} of {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(
        source = %source.name,
        posts = records.len(),
        file = %path.display(),
        "loaded source"
    );
    Ok(records)
}

pub fn pretty_date<Z>(epoch_seconds: i64, zone: &Z) -> String
where
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    let utc = Utc
        .timestamp_opt(epoch_seconds, 0)
        .single()
        .unwrap_or_default();
    utc.with_timezone(zone).format(DATETIME_FORMAT).to_string()
}

#[derive(Deserialize)]
struct FacebookRow {
    #[serde(default)]
    data: Vec<FacebookData>,
    #[serde(default)]
    timestamp: i64,
}

#[derive(Deserialize)]
struct FacebookData {
    #[serde(default)]
    post: Option<String>,
}

fn facebook_group_row<Z>(index: usize, row: Value, zone: &Z) -> Result<PostRecord>
where
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    let row: FacebookRow = serde_json::from_value(row).context("facebook group row")?;
    let content = row
        .data
        .into_iter()
        .next()
        .and_then(|data| data.post)
        .unwrap_or_default();
    Ok(PostRecord {
        index,
        content,
        datetime: pretty_date(row.timestamp, zone),
    })
}

#[derive(Deserialize)]
struct PlainRow {
    #[serde(default)]
    content: String,
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    timestamp: i64,
}

fn plain_row<Z>(index: usize, row: Value, zone: &Z) -> Result<PostRecord>
where
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    let row: PlainRow = serde_json::from_value(row).context("plain row")?;
    let datetime = row
        .datetime
        .unwrap_or_else(|| pretty_date(row.timestamp, zone));
    Ok(PostRecord {
        index,
        content: row.content,
        datetime,
    })
}
