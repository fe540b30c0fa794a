use crate::card::ExternalCardRecord;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BoosterRule {
    /// Set codes this rule is limited to. Empty means every set.
    #[serde(default)]
    pub sets: Vec<String>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleKind {
    /// Unconditionally sets the flag.
    Flat { value: bool },
    /// Compares the numeric collector number against `min..=max`. A number
    /// that does not parse counts as outside the range.
    Range {
        min: u32,
        max: u32,
        #[serde(default)]
        inside: Option<bool>,
        #[serde(default)]
        outside: Option<bool>,
        /// Suffixes stripped before parsing ("12a" -> "12").
        #[serde(default)]
        ignore_suffixes: Vec<String>,
    },
    /// Collector numbers ending with `suffix` get `value`.
    Suffix {
        suffix: String,
        #[serde(default)]
        value: bool,
    },
    PromoType {
        promo_type: String,
        #[serde(default)]
        value: bool,
    },
    /// Exact printing ids.
    Card { ids: Vec<String>, value: bool },
}

impl BoosterRule {
    pub fn flat(set: &str, value: bool) -> Self {
        BoosterRule {
            sets: vec![set.to_string()],
            kind: RuleKind::Flat { value },
        }
    }

    /// The common "numbered 1..=max is in boosters, everything else is not" rule.
    pub fn numbered_up_to(set: &str, max: u32) -> Self {
        BoosterRule {
            sets: vec![set.to_string()],
            kind: RuleKind::Range {
                min: 1,
                max,
                inside: Some(true),
                outside: Some(false),
                ignore_suffixes: Vec::new(),
            },
        }
    }

    pub fn suffix(set: Option<&str>, suffix: &str) -> Self {
        BoosterRule {
            sets: set.map(|s| vec![s.to_string()]).unwrap_or_default(),
            kind: RuleKind::Suffix {
                suffix: suffix.to_string(),
                value: false,
            },
        }
    }

    fn matches_set(&self, set: &str) -> bool {
        self.sets.is_empty() || self.sets.iter().any(|s| s.eq_ignore_ascii_case(set))
    }

    /// The flag this rule assigns to `record`, or `None` when it does not apply.
    pub fn outcome(&self, record: &ExternalCardRecord) -> Option<bool> {
        if !self.matches_set(&record.set) {
            return None;
        }
        match &self.kind {
            RuleKind::Flat { value } => Some(*value),
            RuleKind::Range {
                min,
                max,
                inside,
                outside,
                ignore_suffixes,
            } => {
                match numeric_collector_number(&record.collector_number, ignore_suffixes) {
                    Some(n) if (*min..=*max).contains(&n) => *inside,
                    _ => *outside,
                }
            }
            RuleKind::Suffix { suffix, value } => record
                .collector_number
                .ends_with(suffix.as_str())
                .then_some(*value),
            RuleKind::PromoType { promo_type, value } => {
                record.promo_types.contains(promo_type).then_some(*value)
            }
            RuleKind::Card { ids, value } => ids.contains(&record.id).then_some(*value),
        }
    }
}

fn numeric_collector_number(collector_number: &str, ignore_suffixes: &[String]) -> Option<u32> {
    let trimmed = ignore_suffixes
        .iter()
        .find_map(|suffix| collector_number.strip_suffix(suffix.as_str()))
        .unwrap_or(collector_number);
    trimmed.parse().ok()
}

/// Runs `rules` in order over `initial`; the last applicable rule decides.
pub fn cascade(rules: &[BoosterRule], record: &ExternalCardRecord, initial: bool) -> bool {
    rules
        .iter()
        .fold(initial, |flag, rule| rule.outcome(record).unwrap_or(flag))
}
