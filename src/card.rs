use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Separator between face names in a joined card name ("Fire // Ice").
pub const FACE_SEPARATOR: &str = " //";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ImageUris {
    pub border_crop: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CardFace {
    pub name: String,
    pub printed_name: Option<String>,
    pub mana_cost: Option<String>,
    pub type_line: Option<String>,
    pub oracle_id: Option<String>,
    pub image_uris: Option<ImageUris>,
}

impl CardFace {
    pub fn image(&self) -> Option<&str> {
        self.image_uris.as_ref()?.border_crop.as_deref()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RelatedPart {
    pub id: String,
}

/// One printing of a card in one language, as found in the bulk catalog.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ExternalCardRecord {
    pub id: String,
    pub oracle_id: Option<String>,
    pub name: String,
    pub set: String,
    pub collector_number: String,
    #[serde(default)]
    pub rarity: String,
    pub mana_cost: Option<String>,
    pub type_line: Option<String>,
    pub oracle_text: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_layout")]
    pub layout: String,
    pub released_at: Option<NaiveDate>,
    #[serde(default)]
    pub booster: bool,
    #[serde(default)]
    pub promo: bool,
    #[serde(default)]
    pub promo_types: Vec<String>,
    pub printed_name: Option<String>,
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub image_status: String,
    #[serde(default)]
    pub frame: String,
    #[serde(default)]
    pub frame_effects: Vec<String>,
    #[serde(default)]
    pub finishes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub all_parts: Option<Vec<RelatedPart>>,
    pub card_faces: Option<Vec<CardFace>>,

    /// Digital-client id attached by the candidate filter.
    #[serde(skip)]
    pub linked_id: Option<u32>,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_layout() -> String {
    "normal".to_string()
}

impl ExternalCardRecord {
    pub fn faces(&self) -> &[CardFace] {
        self.card_faces.as_deref().unwrap_or(&[])
    }

    pub fn first_face(&self) -> Option<&CardFace> {
        self.faces().first()
    }

    pub fn front_name(&self) -> &str {
        front_name(&self.name)
    }

    pub fn set_code(&self) -> String {
        self.set.to_lowercase()
    }

    /// Top-level border crop, else the first face's.
    pub fn image(&self) -> Option<&str> {
        self.image_uris
            .as_ref()
            .and_then(|uris| uris.border_crop.as_deref())
            .or_else(|| self.first_face().and_then(CardFace::image))
    }

    pub fn set_image(&mut self, uri: String) {
        self.image_uris
            .get_or_insert_with(ImageUris::default)
            .border_crop = Some(uri);
    }

    /// Own printed name, else the first face's.
    pub fn localized_name(&self) -> Option<&str> {
        self.printed_name
            .as_deref()
            .or_else(|| self.first_face().and_then(|f| f.printed_name.as_deref()))
    }

    pub fn is_double_sided(&self) -> bool {
        matches!(
            self.layout.as_str(),
            "transform" | "modal_dfc" | "reversible_card"
        )
    }

    pub fn is_basic_land(&self) -> bool {
        self.type_line
            .as_deref()
            .is_some_and(|t| t.starts_with("Basic"))
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            name: self.name.clone(),
            set: self.set.clone(),
            collector_number: self.collector_number.clone(),
        }
    }
}

/// The (name, set, collector number) triple shared by every language of one printing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub name: String,
    pub set: String,
    pub collector_number: String,
}

pub fn front_name(name: &str) -> &str {
    match name.find(FACE_SEPARATOR) {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Collapses repeated face names left by reversible printings:
/// "A // A" becomes "A" and "A // B // A" becomes "A // B".
pub fn collapse_repeated_faces(name: &str) -> Option<String> {
    let faces: Vec<&str> = name.split(FACE_SEPARATOR).collect();
    match faces.as_slice() {
        [front, back] if *front == back.trim() => Some(front.to_string()),
        [front, middle, last] if *front == last.trim() => {
            Some(format!("{}{}{}", front, FACE_SEPARATOR, middle))
        }
        _ => None,
    }
}

/// Splits "Creature — Elf Druid" into ("Creature", ["Elf", "Druid"]).
pub fn split_type_line(type_line: &str) -> (String, Vec<String>) {
    match type_line.split_once(" — ") {
        Some((types, subtypes)) => (
            types.to_string(),
            subtypes.split_whitespace().map(str::to_string).collect(),
        ),
        None => (type_line.to_string(), Vec::new()),
    }
}

/// Leading decimal digits of a collector number, if it starts with any.
pub fn collector_number_prefix(collector_number: &str) -> Option<u32> {
    let digits: String = collector_number
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
