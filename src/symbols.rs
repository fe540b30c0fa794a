use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

lazy_static! {
    static ref SYMBOL: Regex = Regex::new(r"\{[^}]+\}").unwrap();
}

const COLOR_ORDER: [&str; 5] = ["W", "U", "B", "R", "G"];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ManaSymbol {
    pub cmc: f64,
    pub colors: Vec<String>,
}

/// Shape of the symbology API response.
#[derive(Deserialize)]
pub struct Symbology {
    pub data: Vec<SymbologyEntry>,
}

#[derive(Deserialize)]
pub struct SymbologyEntry {
    pub symbol: String,
    #[serde(default)]
    pub cmc: Option<f64>,
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct ManaSymbols(BTreeMap<String, ManaSymbol>);

impl From<Symbology> for ManaSymbols {
    fn from(symbology: Symbology) -> Self {
        ManaSymbols(
            symbology
                .data
                .into_iter()
                .map(|s| {
                    (
                        s.symbol,
                        ManaSymbol {
                            cmc: s.cmc.unwrap_or(0.0),
                            colors: s.colors,
                        },
                    )
                })
                .collect(),
        )
    }
}

impl FromIterator<(String, ManaSymbol)> for ManaSymbols {
    fn from_iter<I: IntoIterator<Item = (String, ManaSymbol)>>(iter: I) -> Self {
        ManaSymbols(iter.into_iter().collect())
    }
}

fn color_rank(color: &str) -> usize {
    COLOR_ORDER
        .iter()
        .position(|c| *c == color)
        .unwrap_or(COLOR_ORDER.len())
}

impl ManaSymbols {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mana value and color identity of a cost string such as "{2}{W}{U}".
    ///
    /// Only the first face of a "//"-joined cost counts. Unknown symbols
    /// contribute nothing; colors come out in WUBRG order.
    pub fn parse_cost(&self, mana_cost: &str) -> (u32, Vec<String>) {
        let cost = match mana_cost.split_once("//") {
            Some((front, _)) => front.trim(),
            None => mana_cost,
        };
        let mut value = 0.0;
        let mut colors = BTreeSet::new();
        for symbol in SYMBOL.find_iter(cost) {
            if let Some(known) = self.0.get(symbol.as_str()) {
                value += known.cmc;
                colors.extend(known.colors.iter().cloned());
            }
        }
        let mut colors: Vec<String> = colors.into_iter().collect();
        colors.sort_by_key(|c| color_rank(c));
        (value as u32, colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> ManaSymbols {
        let entry = |symbol: &str, cmc: f64, colors: &[&str]| {
            (
                symbol.to_string(),
                ManaSymbol {
                    cmc,
                    colors: colors.iter().map(|c| c.to_string()).collect(),
                },
            )
        };
        [
            entry("{X}", 0.0, &[]),
            entry("{1}", 1.0, &[]),
            entry("{2}", 2.0, &[]),
            entry("{W}", 1.0, &["W"]),
            entry("{U}", 1.0, &["U"]),
            entry("{B}", 1.0, &["B"]),
            entry("{R}", 1.0, &["R"]),
            entry("{G}", 1.0, &["G"]),
            entry("{G/U}", 1.0, &["G", "U"]),
            entry("{H/R}", 0.5, &["R"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn generic_and_colored_symbols() {
        let symbols = symbols();
        assert_eq!(symbols.parse_cost("{1}{U}{U}"), (3, vec!["U".to_string()]));
        assert_eq!(symbols.parse_cost("{2}{W}{W}"), (4, vec!["W".to_string()]));
        assert_eq!(symbols.parse_cost("{X}{R}"), (1, vec!["R".to_string()]));
    }

    #[test]
    fn colors_follow_wubrg_order() {
        let symbols = symbols();
        let (value, colors) = symbols.parse_cost("{G}{R}{B}{U}{W}");
        assert_eq!(value, 5);
        assert_eq!(colors, vec!["W", "U", "B", "R", "G"]);
        assert_eq!(symbols.parse_cost("{G/U}").1, vec!["U", "G"]);
    }

    #[test]
    fn only_the_front_face_counts() {
        let symbols = symbols();
        assert_eq!(symbols.parse_cost("{R} // {2}{U}"), (1, vec!["R".to_string()]));
    }

    #[test]
    fn fractional_and_unknown_symbols() {
        let symbols = symbols();
        assert_eq!(symbols.parse_cost("{H/R}{H/R}{H/R}").0, 1);
        assert_eq!(symbols.parse_cost("{Z}{1}"), (1, vec![]));
        assert_eq!(symbols.parse_cost(""), (0, vec![]));
    }

    #[test]
    fn converts_symbology_response() {
        let raw = r#"{"data": [
            {"symbol": "{T}", "cmc": null, "colors": []},
            {"symbol": "{W}", "cmc": 1, "colors": ["W"]}
        ]}"#;
        let symbology: Symbology = serde_json::from_str(raw).unwrap();
        let table = ManaSymbols::from(symbology);
        assert_eq!(table.len(), 2);
        assert_eq!(table.parse_cost("{T}{W}"), (1, vec!["W".to_string()]));
    }
}
