use crate::error::{Error, Result};
use crate::extract::CanonicalCard;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

lazy_static! {
    static ref SHARD_FILE: Regex = Regex::new(r"^MTGCards\.(\d+)\.json$").unwrap();
}

/// True when `path` can be reused instead of being rebuilt.
pub fn is_fresh(path: &Path, force: bool) -> bool {
    !force && path.exists()
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Pretty-prints `value` with a 4-space indent, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!(path = %path.display(), "Wrote");
    Ok(())
}

pub fn shard_path(data_dir: &Path, index: usize) -> PathBuf {
    data_dir.join(format!("MTGCards.{}.json", index))
}

/// Indexes of the shard files present in `data_dir`, ascending.
pub fn shard_indexes(data_dir: &Path) -> Result<Vec<usize>> {
    if !data_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut indexes: Vec<usize> = std::fs::read_dir(data_dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let caps = SHARD_FILE.captures(name.to_str()?)?;
            caps[1].parse().ok()
        })
        .collect();
    indexes.sort_unstable();
    Ok(indexes)
}

/// Canonical cards read back from the written shards.
#[derive(Default)]
pub struct CardCache {
    cards: Vec<CanonicalCard>,
    by_name: HashMap<String, Vec<usize>>,
    by_linked_id: HashMap<u32, usize>,
}

impl CardCache {
    pub fn new() -> Self {
        CardCache::default()
    }

    /// Loads every `MTGCards.{i}.json` in `data_dir`, whatever the
    /// configured shard count was when they were written.
    pub fn load_shards(&mut self, data_dir: &Path) -> Result<()> {
        let indexes = shard_indexes(data_dir)?;
        if indexes.is_empty() {
            return Err(Error::MissingInput(format!(
                "card shards in {}",
                data_dir.display()
            )));
        }
        for index in indexes {
            let shard: BTreeMap<String, CanonicalCard> = read_json(&shard_path(data_dir, index))?;
            self.insert_all(shard.into_values());
        }
        Ok(())
    }

    pub fn insert_all(&mut self, cards: impl IntoIterator<Item = CanonicalCard>) {
        for card in cards {
            let index = self.cards.len();
            self.by_name.entry(card.name.clone()).or_default().push(index);
            if let Some(linked) = card.arena_id {
                self.by_linked_id.entry(linked).or_insert(index);
            }
            self.cards.push(card);
        }
    }

    pub fn cards_named(&self, name: &str) -> impl Iterator<Item = &CanonicalCard> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|&i| &self.cards[i])
    }

    /// First card carrying the client id `linked`.
    pub fn by_linked_id(&self, linked: u32) -> Option<&CanonicalCard> {
        self.by_linked_id.get(&linked).map(|&i| &self.cards[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalCard> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
