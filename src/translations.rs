use crate::card::{split_type_line, CardFace, ExternalCardRecord, IdentityKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use tracing::{info, warn};

const ENGLISH: &str = "en";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TranslationRecord {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub printed_names: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_uris: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<BackFace>,
}

/// Second face of a double-sided card.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BackFace {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtypes: Option<Vec<String>>,
    #[serde(default)]
    pub printed_names: BTreeMap<String, String>,
    #[serde(default)]
    pub image_uris: BTreeMap<String, String>,
}

impl BackFace {
    fn from_face(face: &CardFace, card: &str) -> Self {
        let (card_type, subtypes) = match &face.type_line {
            Some(type_line) => {
                let (types, subtypes) = split_type_line(type_line);
                (Some(types), Some(subtypes))
            }
            None => {
                warn!(card, "Missing back side type line");
                (None, None)
            }
        };
        BackFace {
            name: face.name.clone(),
            card_type,
            subtypes,
            printed_names: BTreeMap::new(),
            image_uris: BTreeMap::new(),
        }
    }
}

/// Printed name of a record in its own language. English printings carry no
/// printed name, so their plain name stands in.
fn printed_name(record: &ExternalCardRecord) -> Option<String> {
    record
        .localized_name()
        .map(str::to_string)
        .or_else(|| (record.lang == ENGLISH).then(|| record.name.clone()))
}

#[derive(Default)]
pub struct TranslationAggregator {
    records: HashMap<IdentityKey, TranslationRecord>,
    english: HashSet<IdentityKey>,
    /// First record seen for printings that have no English record (yet).
    foreign_only: HashMap<IdentityKey, ExternalCardRecord>,
}

impl TranslationAggregator {
    pub fn new() -> Self {
        TranslationAggregator::default()
    }

    pub fn observe(&mut self, record: &ExternalCardRecord) {
        let key = record.identity_key();
        let lang = record.lang.clone();
        let entry = self.records.entry(key.clone()).or_default();

        if let Some(name) = printed_name(record) {
            entry.printed_names.insert(lang.clone(), name);
        }
        if let Some(image) = record.image() {
            entry.image_uris.insert(lang.clone(), image.to_string());
        }

        if record.is_double_sided() {
            match record.faces().get(1) {
                Some(back_face) => {
                    let back = entry
                        .back
                        .get_or_insert_with(|| BackFace::from_face(back_face, &record.name));
                    let name = back_face
                        .printed_name
                        .clone()
                        .unwrap_or_else(|| back_face.name.clone());
                    back.printed_names.insert(lang.clone(), name);
                    match back_face.image() {
                        Some(image) => {
                            back.image_uris.insert(lang.clone(), image.to_string());
                        }
                        None => warn!(card = %record.name, set = %record.set, id = %record.id, "Missing back side image"),
                    }
                }
                None => warn!(
                    card = %record.name,
                    set = %record.set,
                    id = %record.id,
                    layout = %record.layout,
                    "Missing card faces for double-sided layout"
                ),
            }
        }

        if lang == ENGLISH {
            self.foreign_only.remove(&key);
            self.english.insert(key);
        } else if !self.english.contains(&key) {
            self.foreign_only
                .entry(key)
                .or_insert_with(|| record.clone());
        }
    }

    /// Freezes the records. Printings never seen in English get an English
    /// image borrowed from another language and are handed back for
    /// extraction.
    pub fn finish(mut self) -> Translations {
        let mut foreign_only: Vec<ExternalCardRecord> = self.foreign_only.into_values().collect();
        foreign_only.sort_by(|a, b| a.identity_key().cmp(&b.identity_key()));

        for record in &foreign_only {
            warn!(
                card = %record.name,
                set = %record.set,
                lang = %record.lang,
                id = %record.id,
                "No English printing"
            );
            if let Some(entry) = self.records.get_mut(&record.identity_key()) {
                let borrowed = entry
                    .image_uris
                    .get(&record.lang)
                    .or_else(|| entry.image_uris.values().next())
                    .cloned();
                if let Some(image) = borrowed {
                    entry.image_uris.insert(ENGLISH.to_string(), image);
                }
            }
        }
        info!(
            printings = self.records.len(),
            foreign_only = foreign_only.len(),
            "Translations aggregated"
        );

        Translations {
            records: self
                .records
                .into_iter()
                .map(|(key, record)| (key, Rc::new(record)))
                .collect(),
            foreign_only,
        }
    }
}

pub struct Translations {
    records: HashMap<IdentityKey, Rc<TranslationRecord>>,
    foreign_only: Vec<ExternalCardRecord>,
}

impl Translations {
    /// Shared handle to the record of one printing.
    pub fn get(&self, key: &IdentityKey) -> Option<Rc<TranslationRecord>> {
        self.records.get(key).cloned()
    }

    /// Representative records of printings without any English record,
    /// sorted by identity.
    pub fn foreign_only(&self) -> &[ExternalCardRecord] {
        &self.foreign_only
    }

    pub fn take_foreign_only(&mut self) -> Vec<ExternalCardRecord> {
        std::mem::take(&mut self.foreign_only)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::ImageUris;

    fn printing(lang: &str, printed: Option<&str>) -> ExternalCardRecord {
        let mut record = ExternalCardRecord {
            id: format!("bolt-{}", lang),
            name: "Lightning Bolt".into(),
            set: "m11".into(),
            collector_number: "149".into(),
            lang: lang.into(),
            printed_name: printed.map(str::to_string),
            ..Default::default()
        };
        record.set_image(format!("{}.jpg", lang));
        record
    }

    #[test]
    fn one_record_per_printing_with_every_language() {
        let mut aggregator = TranslationAggregator::new();
        aggregator.observe(&printing("en", None));
        aggregator.observe(&printing("fr", Some("Foudre")));
        aggregator.observe(&printing("de", Some("Blitzschlag")));
        let translations = aggregator.finish();

        assert_eq!(translations.len(), 1);
        let record = translations.get(&printing("en", None).identity_key()).unwrap();
        let langs: Vec<&str> = record.printed_names.keys().map(String::as_str).collect();
        assert_eq!(langs, vec!["de", "en", "fr"]);
        assert_eq!(record.printed_names["en"], "Lightning Bolt");
        assert_eq!(record.printed_names["fr"], "Foudre");
        assert_eq!(record.image_uris.len(), 3);
        assert!(record.back.is_none());
        assert!(translations.foreign_only().is_empty());
    }

    #[test]
    fn handles_are_shared_not_copied() {
        let mut aggregator = TranslationAggregator::new();
        aggregator.observe(&printing("en", None));
        let translations = aggregator.finish();
        let key = printing("en", None).identity_key();
        let a = translations.get(&key).unwrap();
        let b = translations.get(&key).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn foreign_only_printings_borrow_an_english_image() {
        let mut aggregator = TranslationAggregator::new();
        aggregator.observe(&printing("ja", Some("稲妻")));
        let mut translations = aggregator.finish();

        let key = printing("ja", None).identity_key();
        let record = translations.get(&key).unwrap();
        assert_eq!(record.image_uris["en"], "ja.jpg");
        assert!(!record.printed_names.contains_key("en"));
        let foreign = translations.take_foreign_only();
        assert_eq!(foreign.len(), 1);
        assert_eq!(foreign[0].lang, "ja");
    }

    #[test]
    fn later_english_record_clears_foreign_only_status() {
        let mut aggregator = TranslationAggregator::new();
        aggregator.observe(&printing("ja", Some("稲妻")));
        aggregator.observe(&printing("en", None));
        let translations = aggregator.finish();
        assert!(translations.foreign_only().is_empty());
    }

    #[test]
    fn back_faces_collect_their_own_translations() {
        let face = |name: &str, printed: Option<&str>, type_line: &str, image: &str| CardFace {
            name: name.into(),
            printed_name: printed.map(str::to_string),
            type_line: Some(type_line.into()),
            image_uris: Some(ImageUris {
                border_crop: Some(image.into()),
            }),
            ..Default::default()
        };
        let record = |lang: &str, front: Option<&str>, back: Option<&str>| ExternalCardRecord {
            id: format!("delver-{}", lang),
            name: "Delver of Secrets // Insectile Aberration".into(),
            set: "isd".into(),
            collector_number: "51".into(),
            lang: lang.into(),
            layout: "transform".into(),
            card_faces: Some(vec![
                face("Delver of Secrets", front, "Creature — Human Wizard", &format!("{}-front.jpg", lang)),
                face("Insectile Aberration", back, "Creature — Human Insect", &format!("{}-back.jpg", lang)),
            ]),
            ..Default::default()
        };

        let mut aggregator = TranslationAggregator::new();
        aggregator.observe(&record("en", None, None));
        aggregator.observe(&record("fr", Some("Fureteur des secrets"), Some("Aberration insectile")));
        let translations = aggregator.finish();

        let merged = translations.get(&record("en", None, None).identity_key()).unwrap();
        assert_eq!(merged.image_uris["en"], "en-front.jpg");
        assert_eq!(merged.printed_names["fr"], "Fureteur des secrets");
        let back = merged.back.as_ref().unwrap();
        assert_eq!(back.name, "Insectile Aberration");
        assert_eq!(back.card_type.as_deref(), Some("Creature"));
        assert_eq!(back.subtypes.as_deref(), Some(&["Human".to_string(), "Insect".to_string()][..]));
        assert_eq!(back.printed_names["en"], "Insectile Aberration");
        assert_eq!(back.printed_names["fr"], "Aberration insectile");
        assert_eq!(back.image_uris["fr"], "fr-back.jpg");
    }
}
