use crate::client_db::{rarity_name, DigitalClientCardRecord};
use crate::rules::RuleBook;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

lazy_static! {
    static ref MARKUP_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    pub name: String,
    pub collector_number: String,
    pub set: String,
}

impl LinkKey {
    pub fn new(name: &str, collector_number: &str, set: &str) -> Self {
        LinkKey {
            name: name.to_string(),
            collector_number: collector_number.to_string(),
            set: set.to_lowercase(),
        }
    }
}

/// A client card from a remastered sub-catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RemasterEntry {
    pub grp_id: u32,
    pub collector_number: String,
    pub rarity: &'static str,
}

#[derive(Debug, Default)]
pub struct IdentityLinks {
    links: HashMap<LinkKey, u32>,
    /// Name -> id, biased toward the priority sets.
    priority_names: HashMap<String, u32>,
    /// Remaster set -> card name -> entry.
    remasters: HashMap<String, BTreeMap<String, RemasterEntry>>,
    /// Set -> card name -> client collector number.
    client_numbers: BTreeMap<String, BTreeMap<String, String>>,
}

/// Client titles use " /// " between faces and may carry inline markup.
pub fn normalize_title(title: &str) -> String {
    MARKUP_TAG
        .replace_all(&title.replace(" /// ", " // "), "")
        .into_owned()
}

impl IdentityLinks {
    pub fn build(records: &[DigitalClientCardRecord], rules: &RuleBook) -> Self {
        let mut links = IdentityLinks::default();
        for remaster in &rules.remasters {
            links.remasters.insert(remaster.set.clone(), BTreeMap::new());
        }

        let mut skipped = 0usize;
        for record in records {
            let Some(title) = record.title.as_deref() else {
                skipped += 1;
                continue;
            };
            if record.is_primary_card != Some(true) {
                skipped += 1;
                continue;
            }
            links.add(record, &normalize_title(title), rules);
        }

        info!(
            links = links.links.len(),
            priority_names = links.priority_names.len(),
            skipped,
            "Built identity links"
        );
        for (set, table) in &links.remasters {
            info!(set = %set, cards = table.len(), "Remaster table");
        }
        links
    }

    fn add(&mut self, record: &DigitalClientCardRecord, name: &str, rules: &RuleBook) {
        let set = rules.fix_set_code(&record.expansion_code);
        let collector_number = record.collector_number.as_str();

        if let Some(table) = self.remasters.get_mut(&set) {
            if record.rarity != 1 {
                table.insert(
                    name.to_string(),
                    RemasterEntry {
                        grp_id: record.grp_id,
                        collector_number: collector_number.to_string(),
                        rarity: rarity_name(record.rarity),
                    },
                );
            }
        }

        // Supplemental products reuse (set, number) pairs, hence the name in the key.
        self.insert(LinkKey::new(name, collector_number, &set), record.grp_id);
        if let Some(alias) = rules.linker.alias_sets.get(&set) {
            self.insert(LinkKey::new(name, collector_number, alias), record.grp_id);
        }

        if !self.priority_names.contains_key(name) || rules.linker.priority_sets.contains(&set) {
            self.priority_names.insert(name.to_string(), record.grp_id);
        }

        if rules.linker.client_number_sets.contains(&set) {
            self.client_numbers
                .entry(set.clone())
                .or_default()
                .insert(name.to_string(), collector_number.to_string());
        }

        if record.is_rebalanced {
            let prefix = &rules.linker.rebalanced_prefix;
            self.insert(
                LinkKey::new(
                    &format!("{}{}", prefix, name),
                    &format!("{}{}", prefix, collector_number),
                    &set,
                ),
                record.grp_id,
            );
            self.priority_names
                .insert(format!("{}{}", prefix, name), record.grp_id);
        }
    }

    fn insert(&mut self, key: LinkKey, grp_id: u32) {
        if let Some(previous) = self.links.insert(key.clone(), grp_id) {
            if previous != grp_id {
                debug!(?key, previous, grp_id, "Link key reassigned");
            }
        }
    }

    pub fn resolve(&self, name: &str, collector_number: &str, set: &str) -> Option<u32> {
        self.links
            .get(&LinkKey::new(name, collector_number, set))
            .copied()
    }

    pub fn contains(&self, name: &str, collector_number: &str, set: &str) -> bool {
        self.resolve(name, collector_number, set).is_some()
    }

    pub fn priority_id(&self, name: &str) -> Option<u32> {
        self.priority_names.get(name).copied()
    }

    pub fn remaster_table(&self, set: &str) -> Option<&BTreeMap<String, RemasterEntry>> {
        self.remasters.get(set)
    }

    /// Name -> collector number as the client numbers `set`.
    pub fn client_numbers(&self, set: &str) -> Option<&BTreeMap<String, String>> {
        self.client_numbers.get(set)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Sorted `"(name, number, set)" -> id` table for auditing.
    pub fn debug_dump(&self) -> BTreeMap<String, u32> {
        self.links
            .iter()
            .map(|(k, v)| {
                (
                    format!("('{}', '{}', '{}')", k.name, k.collector_number, k.set),
                    *v,
                )
            })
            .collect()
    }
}
