use crate::cache::CardCache;
use crate::error::{Error, Result};
use crate::linker::IdentityLinks;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

lazy_static! {
    static ref CARD_LINE: Regex = Regex::new(r"^(\d+) (.*)$").unwrap();
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SupplementalPack {
    pub name: String,
    pub cards: Vec<String>,
}

pub struct PackResolver<'a> {
    links: &'a IdentityLinks,
    cards: &'a CardCache,
    swaps: &'a BTreeMap<String, String>,
    home_set: &'a str,
}

impl<'a> PackResolver<'a> {
    pub fn new(
        links: &'a IdentityLinks,
        cards: &'a CardCache,
        swaps: &'a BTreeMap<String, String>,
        home_set: &'a str,
    ) -> Self {
        PackResolver {
            links,
            cards,
            swaps,
            home_set,
        }
    }

    /// Canonical id for a list entry, `None` when the client does not know the name.
    pub fn resolve(&self, name: &str) -> Result<Option<String>> {
        let name = self.swaps.get(name).map(String::as_str).unwrap_or(name);
        let Some(linked) = self.links.priority_id(name) else {
            warn!(card = name, "Supplemental pack card not found in the client database");
            return Ok(None);
        };
        if let Some(card) = self.cards.by_linked_id(linked) {
            return Ok(Some(card.id.clone()));
        }

        // Printings that only exist in the client under the home set: use
        // another printing of the same card.
        debug!(card = name, linked, "No printing carries the client id");
        self.cards
            .cards_named(name)
            .filter(|c| c.set != self.home_set)
            .map(|c| c.id.as_str())
            .max()
            .map(|id| Some(id.to_string()))
            .ok_or_else(|| {
                Error::consistency(format!("cannot find a good candidate id for '{}'", name))
            })
    }

    pub fn parse_list(&self, text: &str) -> Result<SupplementalPack> {
        let mut lines = text.lines();
        let name = lines.next().unwrap_or_default().trim().to_string();
        let mut cards = Vec::new();
        for line in lines {
            let Some(caps) = CARD_LINE.captures(line.trim()) else {
                continue;
            };
            let count: usize = caps[1]
                .parse()
                .map_err(|_| Error::consistency(format!("bad card count in '{}'", line)))?;
            if let Some(id) = self.resolve(&caps[2])? {
                cards.extend(std::iter::repeat(id).take(count));
            }
        }
        if cards.is_empty() {
            return Err(Error::consistency(format!(
                "supplemental pack '{}' has no cards",
                name
            )));
        }
        Ok(SupplementalPack { name, cards })
    }

    /// Every `*.txt` list in `dir`, in file name order.
    pub fn read_dir(&self, dir: &Path) -> Result<Vec<SupplementalPack>> {
        if !dir.is_dir() {
            return Err(Error::MissingInput(format!(
                "supplemental pack lists: {}",
                dir.display()
            )));
        }
        let mut lists: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "txt"))
            .collect();
        lists.sort();

        let mut packs = Vec::with_capacity(lists.len());
        for path in lists {
            let text = std::fs::read_to_string(&path)?;
            packs.push(self.parse_list(&text)?);
        }
        info!(packs = packs.len(), "Supplemental packs extracted");
        Ok(packs)
    }
}

pub fn load_swaps(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        warn!(path = %path.display(), "No supplemental swap table");
        return Ok(BTreeMap::new());
    }
    crate::cache::read_json(path)
}
