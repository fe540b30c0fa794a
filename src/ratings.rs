use crate::cache;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

lazy_static! {
    static ref PRO_RATING: Regex = Regex::new(
        r"([^\s][^\n]+)\n\n.*\n?\*Pro Rating: ([0-9]*\.?[0-9]*( // ([0-9]*\.?[0-9]*))?)\*"
    )
    .unwrap();
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ratings(BTreeMap<String, f64>);

impl Ratings {
    pub fn new(ratings: BTreeMap<String, f64>) -> Self {
        Ratings(ratings)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `other` replace ours.
    pub fn extend(&mut self, other: Ratings) {
        self.0.extend(other.0);
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    /// Base table merged with the scraped table, rescraping the pages when
    /// `scraped_path` is missing or `force` is set.
    pub fn load(base_path: &Path, pages_dir: &Path, scraped_path: &Path, force: bool) -> Result<Self> {
        let mut ratings = if base_path.exists() {
            Ratings(cache::read_json(base_path)?)
        } else {
            warn!(path = %base_path.display(), "No base ratings file");
            Ratings::default()
        };

        if cache::is_fresh(scraped_path, force) {
            ratings.extend(Ratings(cache::read_json(scraped_path)?));
        } else {
            let scraped = scrape_dir(pages_dir)?;
            ratings.extend(scraped);
            cache::write_json(scraped_path, &ratings.0)?;
        }
        info!(ratings = ratings.len(), "Ratings loaded");
        Ok(ratings)
    }
}

/// Parses every `*.htm*` page in `dir`.
pub fn scrape_dir(dir: &Path) -> Result<Ratings> {
    let mut ratings = Ratings::default();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "No rating pages directory");
        return Ok(ratings);
    }
    let mut pages: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.starts_with("htm"))
        })
        .collect();
    pages.sort();
    for page in pages {
        let text = std::fs::read_to_string(&page)?;
        let found = scrape_page(&text);
        info!(page = %page.display(), matches = found.len(), "Extracted ratings");
        ratings.extend(found);
    }
    Ok(ratings)
}

/// Card names followed by "*Pro Rating: 3.5*"; split ratings ("3.0 // 2.5")
/// are averaged.
pub fn scrape_page(text: &str) -> Ratings {
    let mut ratings = BTreeMap::new();
    for caps in PRO_RATING.captures_iter(text) {
        let raw_rating = &caps[2];
        if raw_rating.is_empty() {
            continue;
        }
        let Some(rating) = parse_rating(raw_rating) else {
            debug!(rating = raw_rating, "Unparsable rating");
            continue;
        };
        let name = unescape(&caps[1]);
        debug!(card = %name, rating, "Rating");
        ratings.insert(name, rating);
    }
    Ratings(ratings)
}

fn parse_rating(raw: &str) -> Option<f64> {
    if let Ok(rating) = raw.parse::<f64>() {
        return Some(rating);
    }
    let (front, back) = raw.split_once("//")?;
    let front: f64 = front.trim().parse().ok()?;
    let back: f64 = back.trim().parse().ok()?;
    Some((front + back) / 2.0)
}

/// Decodes HTML entities ("Jace&#8217;s" -> "Jace’s").
fn unescape(name: &str) -> String {
    Html::parse_fragment(name)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}
