use crate::booster;
use crate::card::{split_type_line, ExternalCardRecord, FACE_SEPARATOR};
use crate::ratings::Ratings;
use crate::rules::RuleBook;
use crate::symbols::ManaSymbols;
use crate::translations::TranslationRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

const MISSING_MANA_COST: &str = "{0}";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DraftEffect {
    #[serde(rename = "type")]
    pub kind: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CanonicalCard {
    pub id: String,
    pub oracle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arena_id: Option<u32>,
    pub name: String,
    pub set: String,
    pub mana_cost: String,
    pub collector_number: String,
    pub rarity: String,
    #[serde(rename = "type")]
    pub card_type: String,
    pub subtypes: Vec<String>,
    pub rating: f64,
    pub in_booster: bool,
    pub cmc: u32,
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_effects: Option<Vec<DraftEffect>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_cards: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Set for printings that were never released in English.
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_english_print: bool,
    #[serde(flatten)]
    pub translations: Option<Rc<TranslationRecord>>,
}

impl CanonicalCard {
    pub fn identity_key(&self) -> crate::card::IdentityKey {
        crate::card::IdentityKey {
            name: self.name.clone(),
            set: self.set.clone(),
            collector_number: self.collector_number.clone(),
        }
    }

    pub fn is_basic_land(&self) -> bool {
        self.card_type.starts_with("Basic")
    }
}

/// Rating used when a card is missing from the ratings table.
pub fn default_rating(rarity: &str) -> f64 {
    match rarity {
        "mythic" => 1.0,
        "rare" => 0.8,
        "uncommon" => 0.7,
        _ => 0.5,
    }
}

pub struct FieldExtractor<'a> {
    symbols: &'a ManaSymbols,
    ratings: &'a Ratings,
    rules: &'a RuleBook,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(symbols: &'a ManaSymbols, ratings: &'a Ratings, rules: &'a RuleBook) -> Self {
        FieldExtractor {
            symbols,
            ratings,
            rules,
        }
    }

    pub fn extract(&self, record: &ExternalCardRecord) -> CanonicalCard {
        let mana_cost = self.mana_cost(record);
        let type_line = record.type_line.as_deref().unwrap_or_default();
        let (card_type, subtypes) =
            split_type_line(type_line.split(FACE_SEPARATOR).next().unwrap_or_default());
        let (cmc, colors) = self.symbols.parse_cost(&mana_cost);
        let basic = record.is_basic_land();

        let rating = if basic {
            0.0
        } else {
            self.ratings
                .get(&record.name)
                .or_else(|| self.ratings.get(record.front_name()))
                .unwrap_or_else(|| default_rating(&record.rarity))
        };

        CanonicalCard {
            id: record.id.clone(),
            oracle_id: record.oracle_id.clone().unwrap_or_default(),
            arena_id: record.linked_id,
            name: record.name.clone(),
            set: record.set.clone(),
            mana_cost,
            collector_number: record.collector_number.clone(),
            rarity: record.rarity.clone(),
            card_type,
            subtypes,
            rating,
            in_booster: self.in_booster(record),
            cmc,
            colors,
            draft_effects: self.draft_effects(record),
            related_cards: self.related_cards(record),
            layout: self.layout(record),
            no_english_print: false,
            translations: None,
        }
    }

    fn mana_cost(&self, record: &ExternalCardRecord) -> String {
        if let Some(cost) = record
            .mana_cost
            .as_ref()
            .or_else(|| record.first_face().and_then(|f| f.mana_cost.as_ref()))
        {
            return cost.clone();
        }
        warn!(card = %record.name, set = %record.set, id = %record.id, "Missing mana cost");
        MISSING_MANA_COST.to_string()
    }

    pub fn in_booster(&self, record: &ExternalCardRecord) -> bool {
        let melded_back = record.layout == "meld" && record.collector_number.ends_with('b');
        let basic = record.is_basic_land();
        let start = record.booster && !melded_back && !basic;

        let flag = booster::cascade(&self.rules.extract.booster_rules, record, start);
        let flag = flag && !basic;
        booster::cascade(&self.rules.extract.card_overrides, record, flag)
    }

    fn draft_effects(&self, record: &ExternalCardRecord) -> Option<Vec<DraftEffect>> {
        let tags = self.rules.draft_effects.get(record.oracle_id.as_deref()?)?;
        Some(
            tags.iter()
                .map(|t| DraftEffect { kind: t.clone() })
                .collect(),
        )
    }

    fn related_cards(&self, record: &ExternalCardRecord) -> Vec<String> {
        let set = record.set_code();
        let text = record.oracle_text.as_deref().unwrap_or_default();
        self.rules
            .extract
            .related_cards
            .iter()
            .filter(|rule| rule.set == set && text.contains(&rule.oracle_text_contains))
            .filter(|rule| {
                !record
                    .all_parts
                    .iter()
                    .flatten()
                    .any(|part| part.id == rule.related_id)
            })
            .map(|rule| rule.related_id.clone())
            .collect()
    }

    fn layout(&self, record: &ExternalCardRecord) -> Option<String> {
        match record.layout.as_str() {
            "split" if record.keywords.iter().any(|k| k == "Aftermath") => {
                Some("split-left".to_string())
            }
            "split"
                if self
                    .rules
                    .extract
                    .normal_layout_split_sets
                    .contains(&record.set_code()) =>
            {
                None
            }
            "split" => Some("split".to_string()),
            "flip" => Some("flip".to_string()),
            _ => None,
        }
    }
}

enum Slot {
    Seeded,
    Card(Box<CanonicalCard>),
}

/// Canonical cards keyed by printing id, in first-sighting order.
///
/// The aggregation pass seeds an entry for every printing it sees; only the
/// entries later filled by the extractor survive `into_cards`.
#[derive(Default)]
pub struct CardMap {
    order: Vec<String>,
    slots: HashMap<String, Slot>,
}

impl CardMap {
    pub fn seed(&mut self, id: &str) {
        if !self.slots.contains_key(id) {
            self.order.push(id.to_string());
            self.slots.insert(id.to_string(), Slot::Seeded);
        }
    }

    /// Fills the entry for `card.id`, keeping its original position.
    pub fn merge(&mut self, card: CanonicalCard) {
        self.seed(&card.id);
        self.slots.insert(card.id.clone(), Slot::Card(Box::new(card)));
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalCard> {
        match self.slots.get(id)? {
            Slot::Card(card) => Some(card),
            Slot::Seeded => None,
        }
    }

    pub fn into_cards(self) -> Vec<CanonicalCard> {
        let mut slots = self.slots;
        self.order
            .into_iter()
            .filter_map(|id| match slots.remove(&id) {
                Some(Slot::Card(card)) => Some(*card),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardFace, RelatedPart};
    use crate::symbols::ManaSymbol;
    use std::collections::BTreeMap;

    fn symbols() -> ManaSymbols {
        ["W", "U", "B", "R", "G"]
            .iter()
            .map(|c| {
                (
                    format!("{{{}}}", c),
                    ManaSymbol {
                        cmc: 1.0,
                        colors: vec![c.to_string()],
                    },
                )
            })
            .chain((0..10).map(|n| {
                (
                    format!("{{{}}}", n),
                    ManaSymbol {
                        cmc: n as f64,
                        colors: vec![],
                    },
                )
            }))
            .collect()
    }

    fn printing(name: &str, set: &str, cn: &str) -> ExternalCardRecord {
        ExternalCardRecord {
            id: format!("{}-{}", set, cn),
            oracle_id: Some(format!("oracle-{}", name)),
            name: name.into(),
            set: set.into(),
            collector_number: cn.into(),
            rarity: "rare".into(),
            mana_cost: Some("{1}{U}{U}".into()),
            type_line: Some("Creature — Human Wizard".into()),
            booster: true,
            ..Default::default()
        }
    }

    fn extract(record: &ExternalCardRecord) -> CanonicalCard {
        let rules = RuleBook::builtin().unwrap();
        let symbols = symbols();
        let ratings = Ratings::new(BTreeMap::from([
            ("Rated".to_string(), 3.5),
            ("Fire".to_string(), 2.0),
        ]));
        FieldExtractor::new(&symbols, &ratings, &rules).extract(record)
    }

    #[test]
    fn derives_type_cost_and_colors() {
        let card = extract(&printing("Tester", "m21", "1"));
        assert_eq!(card.card_type, "Creature");
        assert_eq!(card.subtypes, vec!["Human", "Wizard"]);
        assert_eq!(card.cmc, 3);
        assert_eq!(card.colors, vec!["U"]);
        assert!(card.in_booster);
        assert_eq!(card.layout, None);
    }

    #[test]
    fn mana_cost_falls_back_to_face_then_placeholder() {
        let mut record = printing("Fire // Ice", "mh2", "290");
        record.mana_cost = None;
        record.card_faces = Some(vec![CardFace {
            name: "Fire".into(),
            mana_cost: Some("{1}{R}".into()),
            ..Default::default()
        }]);
        assert_eq!(extract(&record).mana_cost, "{1}{R}");

        record.card_faces = None;
        let card = extract(&record);
        assert_eq!(card.mana_cost, "{0}");
        assert_eq!(card.cmc, 0);
    }

    #[test]
    fn rating_lookup_chain() {
        assert_eq!(extract(&printing("Rated", "m21", "1")).rating, 3.5);
        assert_eq!(extract(&printing("Fire // Ice", "mh2", "290")).rating, 2.0);
        let mut mythic = printing("Unrated", "m21", "2");
        mythic.rarity = "mythic".into();
        assert_eq!(extract(&mythic).rating, 1.0);
        let mut special = printing("Unrated", "m21", "3");
        special.rarity = "special".into();
        assert_eq!(extract(&special).rating, 0.5);
    }

    #[test]
    fn basic_lands_are_never_in_boosters() {
        let mut basic = printing("Forest", "mb2", "300");
        basic.type_line = Some("Basic Land — Forest".into());
        basic.mana_cost = Some(String::new());
        let card = extract(&basic);
        assert!(!card.in_booster);
        assert_eq!(card.rating, 0.0);
        assert!(card.is_basic_land());
    }

    #[test]
    fn melded_backs_are_excluded() {
        let mut back = printing("Brisela, Voice of Nightmares", "emn", "15b");
        back.layout = "meld".into();
        assert!(!extract(&back).in_booster);
    }

    #[test]
    fn set_cascade_and_card_overrides() {
        let retro = printing("Retro", "dmr", "300");
        let mut unflagged = retro.clone();
        unflagged.booster = false;
        assert!(extract(&unflagged).in_booster);

        let mut overridden = printing("Doubled", "stx", "1");
        overridden.id = "0826e210-2002-43fe-942d-41922dfd7bc2".into();
        assert!(!extract(&overridden).in_booster);

        assert!(!extract(&printing("Dagger", "m21", "5†")).in_booster);
    }

    #[test]
    fn draft_effects_and_related_cards() {
        let mut record = printing("Cogwork Librarian", "cns", "56");
        record.oracle_id = Some("ec0d964e-ca2c-4252-8551-cf1916576653".into());
        let effects = extract(&record).draft_effects.unwrap();
        let kinds: Vec<&str> = effects.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["FaceUp", "CogworkLibrarian"]);

        let mut tempter = printing("Frodo", "ltr", "10");
        tempter.oracle_text = Some("the Ring tempts you.".into());
        let related = extract(&tempter).related_cards;
        assert_eq!(related, vec!["7215460e-8c06-47d0-94e5-d1832d0218af"]);

        tempter.all_parts = Some(vec![RelatedPart {
            id: "7215460e-8c06-47d0-94e5-d1832d0218af".into(),
        }]);
        assert!(extract(&tempter).related_cards.is_empty());
    }

    #[test]
    fn split_layouts_collapse_into_two_buckets() {
        let mut aftermath = printing("Commit // Memory", "akh", "211");
        aftermath.layout = "split".into();
        aftermath.keywords = vec!["Aftermath".into()];
        assert_eq!(extract(&aftermath).layout.as_deref(), Some("split-left"));

        let mut split = printing("Fire // Ice", "mh2", "290");
        split.layout = "split".into();
        assert_eq!(extract(&split).layout.as_deref(), Some("split"));

        split.set = "cmb1".into();
        assert_eq!(extract(&split).layout, None);

        let mut flip = printing("Nezumi Shortfang", "chk", "131");
        flip.layout = "flip".into();
        assert_eq!(extract(&flip).layout.as_deref(), Some("flip"));
    }

    #[test]
    fn card_map_merges_into_seeded_entries() {
        let mut map = CardMap::default();
        map.seed("a");
        map.seed("b");
        map.seed("c");
        map.merge(CanonicalCard {
            id: "c".into(),
            ..Default::default()
        });
        map.merge(CanonicalCard {
            id: "a".into(),
            ..Default::default()
        });
        assert!(map.get("b").is_none());
        let ids: Vec<String> = map.into_cards().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
