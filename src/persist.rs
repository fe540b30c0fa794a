use crate::cache;
use crate::error::{Error, Result};
use crate::extract::CanonicalCard;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A run of cards serialized as an `id -> card` object in input order.
pub struct CardsById<'a>(pub &'a [CanonicalCard]);

impl Serialize for CardsById<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for card in self.0 {
            map.serialize_entry(&card.id, card)?;
        }
        map.end()
    }
}

/// Splits `cards` into `count` contiguous, near-equal parts.
pub fn shard(cards: &[CanonicalCard], count: usize) -> Result<Vec<&[CanonicalCard]>> {
    if count == 0 {
        return Err(Error::config("shard count must be at least 1"));
    }
    let total = cards.len();
    let parts: Vec<&[CanonicalCard]> = (0..count)
        .map(|i| &cards[i * total / count..(i + 1) * total / count])
        .collect();
    let written: usize = parts.iter().map(|p| p.len()).sum();
    if written != total {
        return Err(Error::consistency(format!(
            "shards hold {} cards, expected {}",
            written, total
        )));
    }
    Ok(parts)
}

pub fn write_shards(data_dir: &Path, cards: &[CanonicalCard], count: usize) -> Result<Vec<PathBuf>> {
    info!(cards = cards.len(), shards = count, "Splitting card database");
    let mut paths = Vec::with_capacity(count);
    for (index, part) in shard(cards, count)?.into_iter().enumerate() {
        let path = cache::shard_path(data_dir, index);
        info!(cards = part.len(), path = %path.display(), "Writing shard");
        cache::write_json(&path, &CardsById(part))?;
        paths.push(path);
    }
    // Shards left over from a larger count would be read back as cards.
    for stale in cache::shard_indexes(data_dir)?.into_iter().filter(|&i| i >= count) {
        let path = cache::shard_path(data_dir, stale);
        debug!(path = %path.display(), "Removing stale shard");
        std::fs::remove_file(path)?;
    }
    Ok(paths)
}

/// Set -> sorted ids of its basic lands. Printings with no English release
/// are left out.
pub fn basic_land_ids<'a>(
    cards: impl IntoIterator<Item = &'a CanonicalCard>,
) -> BTreeMap<String, Vec<String>> {
    let mut by_set: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for card in cards {
        if card.is_basic_land() && !card.no_english_print {
            by_set.entry(card.set.clone()).or_default().push(card.id.clone());
        }
    }
    for ids in by_set.values_mut() {
        ids.sort();
    }
    by_set
}

pub struct ClientMaps<'a> {
    /// Client id -> card. Later cards replace earlier ones.
    pub cards: BTreeMap<u32, &'a CanonicalCard>,
    /// Name -> every client id printed under it, in card order.
    pub alternates: BTreeMap<String, Vec<u32>>,
}

pub fn client_maps(cards: &[CanonicalCard]) -> ClientMaps<'_> {
    let mut maps = ClientMaps {
        cards: BTreeMap::new(),
        alternates: BTreeMap::new(),
    };
    for card in cards {
        if let Some(linked) = card.arena_id {
            maps.cards.insert(linked, card);
            maps.alternates
                .entry(card.name.clone())
                .or_default()
                .push(linked);
        }
    }
    maps
}
