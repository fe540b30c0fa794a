use crate::cache::{self, CardCache};
use crate::error::{Error, Result};
use crate::extract::CanonicalCard;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

lazy_static! {
    static ref SHEET_LINE: Regex = Regex::new(r"^([^(]+)\(([^)]+)\)").unwrap();
}

/// `"Opt (XLN) 65"` -> `("Opt", "xln")`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let caps = SHEET_LINE.captures(line.trim())?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_lowercase()))
}

/// Turns reprint sheet lists (`Name (SET)` per line) into rarity -> card ids.
pub struct SheetResolver<'a> {
    cards: &'a CardCache,
    sheet_sets: &'a [String],
}

impl<'a> SheetResolver<'a> {
    pub fn new(cards: &'a CardCache, sheet_sets: &'a [String]) -> Self {
        SheetResolver { cards, sheet_sets }
    }

    /// The sheet's own printing when there is one, else the printing from `set`.
    pub fn resolve(&self, name: &str, set: &str) -> Result<&'a CanonicalCard> {
        let cards = self.cards;
        let reprints: Vec<&CanonicalCard> = cards
            .cards_named(name)
            .filter(|c| self.sheet_sets.contains(&c.set))
            .collect();
        // Sheet collector numbers embed the original set code ("M21-152").
        let matching = reprints
            .iter()
            .find(|c| c.collector_number.to_lowercase().contains(set))
            .or(reprints.first());
        if let Some(card) = matching {
            return Ok(*card);
        }
        cards
            .cards_named(name)
            .find(|c| c.set == set)
            .ok_or_else(|| {
                Error::consistency(format!("no printing of '{}' from '{}' for a reprint sheet", name, set))
            })
    }

    pub fn convert(&self, text: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let mut by_rarity: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let Some((name, set)) = parse_line(line) else {
                warn!(line, "Unreadable reprint sheet line");
                continue;
            };
            let card = self.resolve(&name, &set)?;
            by_rarity
                .entry(card.rarity.clone())
                .or_default()
                .push(card.id.clone());
        }
        Ok(by_rarity)
    }

    /// Converts every `*.txt` list in `dir` to `out_dir/<list>.json`.
    pub fn convert_dir(&self, dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut lists: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "txt"))
            .collect();
        lists.sort();

        let mut written = Vec::with_capacity(lists.len());
        for list in lists {
            let text = std::fs::read_to_string(&list)?;
            let sheet = self.convert(&text)?;
            let Some(stem) = list.file_stem() else {
                continue;
            };
            let path = out_dir.join(stem).with_extension("json");
            info!(list = %list.display(), cards = sheet.values().map(Vec::len).sum::<usize>(), "Reprint sheet converted");
            cache::write_json(&path, &sheet)?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, name: &str, set: &str, cn: &str, rarity: &str) -> CanonicalCard {
        CanonicalCard {
            id: id.into(),
            name: name.into(),
            set: set.into(),
            collector_number: cn.into(),
            rarity: rarity.into(),
            ..Default::default()
        }
    }

    fn printings() -> CardCache {
        let mut cards = CardCache::new();
        cards.insert_all(vec![
            card("opt-xln", "Opt", "xln", "65", "common"),
            card("opt-plst-dom", "Opt", "plst", "DOM-60", "common"),
            card("opt-plst-xln", "Opt", "plst", "XLN-65", "common"),
            card("bolt-m21", "Lightning Bolt", "m21", "199", "uncommon"),
            card("rhox-plst", "Rhox Faithmender", "plst", "M13-30", "rare"),
        ]);
        cards
    }

    #[test]
    fn lines_name_a_card_and_its_set() {
        assert_eq!(parse_line("Opt (XLN) 65"), Some(("Opt".into(), "xln".into())));
        assert_eq!(
            parse_line("  Rhox Faithmender (M13)\n"),
            Some(("Rhox Faithmender".into(), "m13".into()))
        );
        assert_eq!(parse_line("Opt"), None);
    }

    #[test]
    fn prefers_the_sheet_printing_from_the_named_set() {
        let cards = printings();
        let sets = vec!["plist".to_string(), "plst".to_string()];
        let resolver = SheetResolver::new(&cards, &sets);
        assert_eq!(resolver.resolve("Opt", "xln").unwrap().id, "opt-plst-xln");
        assert_eq!(resolver.resolve("Opt", "dom").unwrap().id, "opt-plst-dom");
        assert_eq!(resolver.resolve("Opt", "m19").unwrap().id, "opt-plst-dom");
        assert_eq!(resolver.resolve("Rhox Faithmender", "ori").unwrap().id, "rhox-plst");
        assert_eq!(resolver.resolve("Lightning Bolt", "m21").unwrap().id, "bolt-m21");
        assert!(matches!(
            resolver.resolve("Lightning Bolt", "2xm"),
            Err(Error::Consistency(_))
        ));
    }

    #[test]
    fn converts_lists_by_rarity() {
        let cards = printings();
        let sets = vec!["plst".to_string()];
        let resolver = SheetResolver::new(&cards, &sets);
        let dir = tempfile::tempdir().unwrap();
        let lists = dir.path().join("lists");
        std::fs::create_dir(&lists).unwrap();
        std::fs::write(
            lists.join("sheet.txt"),
            "Opt (XLN) 65\n\nLightning Bolt (M21) 199\nRhox Faithmender (M13) 30\nnot a card\n",
        )
        .unwrap();
        std::fs::write(lists.join("readme.md"), "ignored").unwrap();

        let out = dir.path().join("out");
        let written = resolver.convert_dir(&lists, &out).unwrap();
        assert_eq!(written, vec![out.join("sheet.json")]);
        let sheet: BTreeMap<String, Vec<String>> = cache::read_json(&written[0]).unwrap();
        assert_eq!(sheet["common"], vec!["opt-plst-xln"]);
        assert_eq!(sheet["uncommon"], vec!["bolt-m21"]);
        assert_eq!(sheet["rare"], vec!["rhox-plst"]);
    }
}
