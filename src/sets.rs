use crate::cache;
use crate::error::Result;
use crate::extract::CanonicalCard;
use crate::rules::SetRules;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SetInfo {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub set_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_set_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_svg_uri: Option<String>,
}

/// Shape of the set list API response.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SetList {
    pub data: Vec<SetInfo>,
}

#[derive(Clone, Debug, Default)]
pub struct SetCatalog {
    sets: BTreeMap<String, SetInfo>,
}

impl From<SetList> for SetCatalog {
    fn from(list: SetList) -> Self {
        SetCatalog {
            sets: list
                .data
                .into_iter()
                .map(|s| (s.code.clone(), s))
                .collect(),
        }
    }
}

impl SetCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let list: SetList = cache::read_json(path)?;
        Ok(list.into())
    }

    pub fn get(&self, code: &str) -> Option<&SetInfo> {
        self.sets.get(code)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets whose printings the selector prefers: the primary set types plus
    /// every configured extra and derived code.
    pub fn primary_sets(&self, rules: &SetRules) -> HashSet<String> {
        self.sets
            .values()
            .filter(|s| rules.primary_set_types.contains(&s.set_type))
            .map(|s| s.code.clone())
            .chain(rules.extra_primary_sets.iter().cloned())
            .chain(
                rules
                    .derived
                    .iter()
                    .filter(|d| d.is_primary)
                    .map(|d| d.code.clone()),
            )
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetMetadata {
    pub code: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub card_count: usize,
    pub is_primary: bool,
    /// "commonCount", "rareCount", ...
    #[serde(flatten)]
    pub rarity_counts: BTreeMap<String, usize>,
}

/// Path of a set icon relative to the public asset directory.
pub fn icon_path(code: &str) -> String {
    // "con" is a reserved file name on Windows.
    let file = if code == "con" { "conf" } else { code };
    format!("img/sets/{}.svg", file)
}

/// Rewrites `viewBox="{expected}"` to `corrected` in the SVG at `path`.
/// Returns false, leaving the file untouched, when `expected` is not there.
pub fn fix_viewbox(path: &Path, expected: &str, corrected: &str) -> Result<bool> {
    let content = std::fs::read_to_string(path)?;
    let expected = format!("viewBox=\"{}\"", expected);
    if !content.contains(&expected) {
        warn!(path = %path.display(), viewbox = %expected, "Icon does not have the expected viewBox");
        return Ok(false);
    }
    let corrected = format!("viewBox=\"{}\"", corrected);
    std::fs::write(path, content.replace(&expected, &corrected))?;
    Ok(true)
}

/// Downloads a missing set icon. Returns whether the icon is now on disk.
pub trait IconFetcher {
    fn fetch_icon(&self, set: &SetInfo, dest: &Path) -> Result<bool>;
}

#[derive(Deserialize, Debug)]
pub struct BonusSheet {
    pub name: String,
}

pub struct SetsReport {
    pub metadata: BTreeMap<String, SetMetadata>,
    /// Primary codes offered to the client, sorted.
    pub primary: Vec<String>,
}

pub struct MetadataBuilder<'a> {
    catalog: &'a SetCatalog,
    rules: &'a SetRules,
    icon_dir: &'a Path,
    fetcher: Option<&'a dyn IconFetcher>,
}

impl<'a> MetadataBuilder<'a> {
    pub fn new(catalog: &'a SetCatalog, rules: &'a SetRules, icon_dir: &'a Path) -> Self {
        MetadataBuilder {
            catalog,
            rules,
            icon_dir,
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: &'a dyn IconFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    fn icon(&self, set: &SetInfo) -> Result<Option<String>> {
        let relative = icon_path(&set.code);
        let full = self.icon_dir.join(&relative);
        if full.exists() {
            return Ok(Some(relative));
        }
        if let Some(fetcher) = self.fetcher {
            if fetcher.fetch_icon(set, &full)? {
                for fix in self.rules.icon_viewbox_fixes.iter().filter(|f| f.set == set.code) {
                    fix_viewbox(&full, &fix.expected, &fix.corrected)?;
                }
                return Ok(Some(relative));
            }
        }
        debug!(set = %set.code, "No icon");
        Ok(None)
    }

    /// Metadata for every set holding at least one card, then derived sets
    /// and bonus sheets.
    pub fn build<'c>(
        &self,
        cards: impl IntoIterator<Item = &'c CanonicalCard>,
        bonus_sheets: &[BonusSheet],
    ) -> Result<SetsReport> {
        let mut by_set: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        for card in cards {
            *by_set
                .entry(card.set.as_str())
                .or_default()
                .entry(card.rarity.as_str())
                .or_default() += 1;
        }

        let mut primary = self.catalog.primary_sets(self.rules);
        let mut subsets = HashSet::new();
        let mut metadata = BTreeMap::new();
        for (code, rarities) in by_set {
            let Some(info) = self.catalog.get(code) else {
                warn!(set = code, "Set missing from the set catalog");
                continue;
            };
            if info.parent_set_code.is_some() && !self.rules.parented_exceptions.iter().any(|c| c == code) {
                subsets.insert(code.to_string());
            }
            metadata.insert(
                code.to_string(),
                SetMetadata {
                    code: code.to_string(),
                    full_name: info.name.clone(),
                    block: info.block.clone(),
                    icon: self.icon(info)?,
                    card_count: rarities.values().sum(),
                    is_primary: primary.contains(code),
                    rarity_counts: rarities
                        .into_iter()
                        .map(|(rarity, count)| (format!("{}Count", rarity), count))
                        .collect(),
                },
            );
        }

        for derived in &self.rules.derived {
            let mut entry = match &derived.base {
                Some(base) => match metadata.get(base) {
                    Some(base) => base.clone(),
                    None => {
                        warn!(set = %derived.code, base = %base, "Base set of derived set not found");
                        continue;
                    }
                },
                None => SetMetadata::default(),
            };
            entry.code = derived.code.clone();
            if let Some(full_name) = &derived.full_name {
                entry.full_name = full_name.clone();
            }
            if derived.block.is_some() {
                entry.block = derived.block.clone();
            }
            if derived.icon.is_some() {
                entry.icon = derived.icon.clone();
            }
            entry.is_primary = derived.is_primary;
            if derived.is_primary {
                primary.insert(derived.code.clone());
            }
            metadata.insert(derived.code.clone(), entry);
        }

        if let Some(rule) = &self.rules.bonus_sheets {
            match metadata.get(&rule.base).cloned() {
                Some(base) => {
                    for (index, sheet) in bonus_sheets.iter().enumerate() {
                        let code = format!("{}{}", rule.base, index);
                        let mut entry = base.clone();
                        entry.code = code.clone();
                        entry.block = Some(rule.block.clone());
                        entry.full_name = format!("{}{}", rule.name_prefix, sheet.name);
                        entry.is_primary = true;
                        primary.insert(code.clone());
                        metadata.insert(code, entry);
                    }
                }
                None if !bonus_sheets.is_empty() => {
                    warn!(set = %rule.base, "Bonus sheet base set not found")
                }
                None => {}
            }
        }

        let primary: Vec<String> = primary
            .into_iter()
            .filter(|code| metadata.contains_key(code))
            .filter(|code| !subsets.contains(code))
            .filter(|code| !self.rules.primary_list_exclusions.contains(code))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!(sets = metadata.len(), primary = primary.len(), "Set metadata built");
        Ok(SetsReport { metadata, primary })
    }
}
