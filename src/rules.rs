use crate::booster::BoosterRule;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const SUPPORTED_VERSION: u32 = 1;

const BUILTIN_RULES: &str = include_str!("../data/rules.json");

/// Exception tables that grow with each card set. The embedded copy can be
/// replaced through `Config::rules_path`.
#[derive(Deserialize, Clone, Debug)]
pub struct RuleBook {
    pub version: u32,
    #[serde(default)]
    pub linker: LinkerRules,
    #[serde(default)]
    pub filter: FilterRules,
    #[serde(default)]
    pub remasters: Vec<RemasterRule>,
    #[serde(default)]
    pub extract: ExtractRules,
    /// Oracle id -> conspiracy draft effect tags.
    #[serde(default)]
    pub draft_effects: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub selector: SelectorPolicy,
    #[serde(default)]
    pub sets: SetRules,
    #[serde(default)]
    pub supplemental: SupplementalRules,
    #[serde(default)]
    pub list_sheets: ListSheetRules,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct LinkerRules {
    /// Client expansion code -> catalog set code.
    #[serde(default)]
    pub set_code_fixes: BTreeMap<String, String>,
    /// Client set -> extra catalog set holding client-only printings of it.
    #[serde(default)]
    pub alias_sets: BTreeMap<String, String>,
    /// Sets whose records win the name -> id table used for supplemental packs.
    #[serde(default)]
    pub priority_sets: Vec<String>,
    #[serde(default = "default_rebalanced_prefix")]
    pub rebalanced_prefix: String,
    /// Sets whose client collector numbers differ from the catalog's; a
    /// name -> client number table is exported for each.
    #[serde(default)]
    pub client_number_sets: Vec<String>,
}

fn default_rebalanced_prefix() -> String {
    "A-".to_string()
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct FilterRules {
    #[serde(default)]
    pub rejected_layouts: Vec<String>,
    /// Names kept despite a rejected layout.
    #[serde(default)]
    pub playable_exceptions: Vec<String>,
    /// Corrections to the catalog's own booster flag.
    #[serde(default)]
    pub source_corrections: Vec<BoosterRule>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RemasterRule {
    pub set: String,
    /// Sets whose printings are preferred as the remaster's artwork.
    pub sources: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ExtractRules {
    /// Set-specific booster cascade, applied in order.
    #[serde(default)]
    pub booster_rules: Vec<BoosterRule>,
    /// Per-printing overrides, applied after everything else.
    #[serde(default)]
    pub card_overrides: Vec<BoosterRule>,
    #[serde(default)]
    pub related_cards: Vec<RelatedCardRule>,
    /// Sets whose split cards are laid out as normal cards.
    #[serde(default)]
    pub normal_layout_split_sets: Vec<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RelatedCardRule {
    pub set: String,
    pub oracle_text_contains: String,
    pub related_id: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ConjureOnlyRule {
    pub set: String,
    pub min_collector_number: u32,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SelectorPolicy {
    #[serde(default)]
    pub conjure_only: Vec<ConjureOnlyRule>,
    #[serde(default)]
    pub unimportable_sets: Vec<String>,
    #[serde(default)]
    pub excluded_finishes: Vec<String>,
    #[serde(default)]
    pub excluded_frame_effects: Vec<String>,
    #[serde(default)]
    pub preferred_image_status: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SetRules {
    /// Set types from the set catalog that count as primary.
    #[serde(default)]
    pub primary_set_types: Vec<String>,
    #[serde(default)]
    pub extra_primary_sets: Vec<String>,
    /// Codes never listed as primary even when present.
    #[serde(default)]
    pub primary_list_exclusions: Vec<String>,
    /// Sub-sets that keep their own entry even though they have a parent.
    #[serde(default)]
    pub parented_exceptions: Vec<String>,
    #[serde(default)]
    pub derived: Vec<DerivedSet>,
    #[serde(default)]
    pub bonus_sheets: Option<BonusSheetRule>,
    /// Downloaded icons whose viewBox needs fixing.
    #[serde(default)]
    pub icon_viewbox_fixes: Vec<ViewBoxFix>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ViewBoxFix {
    pub set: String,
    pub expected: String,
    pub corrected: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DerivedSet {
    pub code: String,
    /// Existing set whose metadata is copied first.
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub is_primary: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Clone, Debug)]
pub struct BonusSheetRule {
    pub base: String,
    /// File under the data directory listing the sheets.
    pub file: String,
    pub block: String,
    pub name_prefix: String,
}

/// Reprint sheets listed as `Name (SET)` lines.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ListSheetRules {
    /// Sets holding the sheet's own printings, preferred over the original set.
    #[serde(default)]
    pub sheet_sets: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SupplementalRules {
    /// The supplemental product's own set; fallback candidates avoid it.
    #[serde(default)]
    pub home_set: String,
}

impl RuleBook {
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_RULES)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let book: RuleBook = serde_json::from_str(raw)?;
        if book.version != SUPPORTED_VERSION {
            return Err(Error::config(format!(
                "rule book version {} is not supported (expected {})",
                book.version, SUPPORTED_VERSION
            )));
        }
        Ok(book)
    }

    /// Catalog set code for a client expansion code.
    pub fn fix_set_code(&self, client_code: &str) -> String {
        let code = client_code.to_lowercase();
        self.linker.set_code_fixes.get(&code).cloned().unwrap_or(code)
    }

    pub fn remaster(&self, set: &str) -> Option<&RemasterRule> {
        self.remasters.iter().find(|r| r.set == set)
    }
}
