use crate::error::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DB_FILE_PREFIX: &str = "Raw_CardDatabase_";
const DB_FILE_EXTENSION: &str = ".mtga";

#[derive(Clone, Debug, PartialEq)]
pub struct DigitalClientCardRecord {
    pub grp_id: u32,
    pub title_id: u32,
    /// English title resolved through the localization table.
    pub title: Option<String>,
    pub expansion_code: String,
    pub collector_number: String,
    pub rarity: u8,
    pub is_primary_card: Option<bool>,
    pub is_rebalanced: bool,
}

/// Client rarity codes to catalog rarity names.
pub fn rarity_name(code: u8) -> &'static str {
    match code {
        1 => "basic",
        2 => "common",
        3 => "uncommon",
        4 => "rare",
        5 => "mythic",
        _ => "unknown",
    }
}

/// Lists the SQLite card databases in `dir`, sorted by file name.
pub fn find_database_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::MissingInput(format!(
            "client database directory {}",
            dir.display()
        )));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(DB_FILE_PREFIX) && n.ends_with(DB_FILE_EXTENSION))
        })
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(Error::MissingInput(format!(
            "no {}*{} files in {}",
            DB_FILE_PREFIX,
            DB_FILE_EXTENSION,
            dir.display()
        )));
    }
    Ok(files)
}

pub fn read_sqlite_dir(dir: &Path) -> Result<Vec<DigitalClientCardRecord>> {
    let mut records = Vec::new();
    for path in find_database_files(dir)? {
        let mut from_file = read_sqlite(&path)?;
        info!(file = %path.display(), cards = from_file.len(), "Read client card database");
        records.append(&mut from_file);
    }
    Ok(records)
}

pub fn read_sqlite(path: &Path) -> Result<Vec<DigitalClientCardRecord>> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let mut titles: HashMap<u32, String> = HashMap::new();
    let mut stmt = conn.prepare("SELECT LocId, Loc FROM Localizations_enUS")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (id, loc) = row?;
        titles.insert(id, loc);
    }

    let mut stmt = conn.prepare("SELECT * FROM Cards")?;
    let has_rebalanced = stmt.column_names().contains(&"IsRebalanced");
    let rows = stmt.query_map([], |row| {
        let title_id: u32 = row.get("TitleId")?;
        Ok(DigitalClientCardRecord {
            grp_id: row.get("GrpId")?,
            title_id,
            title: titles.get(&title_id).cloned(),
            expansion_code: text_column(row, "ExpansionCode")?,
            collector_number: text_column(row, "CollectorNumber")?,
            rarity: row.get::<_, Option<u8>>("Rarity")?.unwrap_or(0),
            is_primary_card: row.get::<_, Option<bool>>("IsPrimaryCard")?,
            is_rebalanced: has_rebalanced
                && row.get::<_, Option<bool>>("IsRebalanced")?.unwrap_or(false),
        })
    })?;
    let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(file = %path.display(), titles = titles.len(), "Loaded localizations");
    Ok(records)
}

/// Reads a column that older client builds store as an integer and newer ones as text.
fn text_column(row: &Row<'_>, name: &str) -> rusqlite::Result<String> {
    Ok(match row.get::<_, Value>(name)? {
        Value::Text(s) => s,
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    })
}

#[derive(Deserialize)]
struct JsonExport {
    localizations: HashMap<String, HashMap<String, String>>,
    cards: Vec<JsonCard>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCard {
    grp_id: u32,
    title_id: u32,
    expansion_code: String,
    #[serde(default)]
    collector_number: String,
    #[serde(default)]
    rarity: u8,
    is_primary_card: Option<bool>,
    #[serde(default)]
    is_rebalanced: bool,
}

/// Reads the JSON export: `{"localizations": {"enUS": {id: text}}, "cards": [...]}`.
pub fn read_json(path: &Path) -> Result<Vec<DigitalClientCardRecord>> {
    if !path.exists() {
        return Err(Error::MissingInput(format!(
            "client database export {}",
            path.display()
        )));
    }
    let export: JsonExport = serde_json::from_reader(std::io::BufReader::new(
        std::fs::File::open(path)?,
    ))?;
    let english = export.localizations.get("enUS");
    Ok(export
        .cards
        .into_iter()
        .map(|c| DigitalClientCardRecord {
            grp_id: c.grp_id,
            title_id: c.title_id,
            title: english.and_then(|loc| loc.get(&c.title_id.to_string()).cloned()),
            expansion_code: c.expansion_code,
            collector_number: c.collector_number,
            rarity: c.rarity,
            is_primary_card: c.is_primary_card,
            is_rebalanced: c.is_rebalanced,
        })
        .collect())
}
