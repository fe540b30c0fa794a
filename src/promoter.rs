use crate::card::ExternalCardRecord;
use crate::linker::IdentityLinks;
use crate::rules::RemasterRule;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct PromotionCandidate {
    pub set: String,
    pub released_at: Option<NaiveDate>,
    pub frame: String,
    pub image: Option<String>,
}

impl PromotionCandidate {
    fn from_record(record: &ExternalCardRecord) -> Self {
        PromotionCandidate {
            set: record.set_code(),
            released_at: record.released_at,
            frame: record.frame.clone(),
            image: record.image().map(str::to_string),
        }
    }
}

/// Frame versions are years ("1997", "2015"); anything else ranks lowest.
fn frame_rank(frame: &str) -> u32 {
    frame.parse().unwrap_or(0)
}

/// Whether `challenger` should replace `current` as the chosen printing.
pub fn should_replace(
    current: Option<&PromotionCandidate>,
    challenger: &PromotionCandidate,
    sources: &[String],
) -> bool {
    if sources.contains(&challenger.set) {
        return true;
    }
    let Some(current) = current else {
        return true;
    };
    if sources.contains(&current.set) {
        return false;
    }
    match challenger.released_at.cmp(&current.released_at) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => frame_rank(&challenger.frame) > frame_rank(&current.frame),
    }
}

struct RemasterScan {
    rule: RemasterRule,
    names: BTreeSet<String>,
    /// name -> lang -> chosen printing
    winners: HashMap<String, HashMap<String, PromotionCandidate>>,
}

pub struct SpecialPrintingPromoter {
    scans: Vec<RemasterScan>,
}

#[derive(Debug, Default)]
pub struct PromotionReport {
    pub patched: usize,
    /// Remaster set -> names that found no printing at all.
    pub missing: BTreeMap<String, Vec<String>>,
}

impl SpecialPrintingPromoter {
    pub fn new(rules: &[RemasterRule], links: &IdentityLinks) -> Self {
        let scans = rules
            .iter()
            .map(|rule| RemasterScan {
                rule: rule.clone(),
                names: links
                    .remaster_table(&rule.set)
                    .map(|table| table.keys().cloned().collect())
                    .unwrap_or_default(),
                winners: HashMap::new(),
            })
            .collect();
        SpecialPrintingPromoter { scans }
    }

    /// Must see every catalog record, including the ones the filter drops.
    pub fn observe(&mut self, record: &ExternalCardRecord) {
        for scan in &mut self.scans {
            if !scan.names.contains(&record.name) {
                continue;
            }
            let challenger = PromotionCandidate::from_record(record);
            let by_lang = scan.winners.entry(record.name.clone()).or_default();
            if should_replace(by_lang.get(&record.lang), &challenger, &scan.rule.sources) {
                by_lang.insert(record.lang.clone(), challenger);
            }
        }
    }

    /// Replaces the image of every remaster printing with its chosen printing's.
    pub fn apply(&self, records: &mut [ExternalCardRecord]) -> PromotionReport {
        let mut report = PromotionReport::default();
        for scan in &self.scans {
            let missing: Vec<String> = scan
                .names
                .iter()
                .filter(|name| !scan.winners.contains_key(*name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                warn!(set = %scan.rule.set, ?missing, "Remastered cards without a source printing");
                report.missing.insert(scan.rule.set.clone(), missing);
            }
        }

        for record in records.iter_mut() {
            let set = record.set_code();
            let Some(scan) = self.scans.iter().find(|s| s.rule.set == set) else {
                continue;
            };
            let image = scan
                .winners
                .get(&record.name)
                .and_then(|by_lang| by_lang.get(&record.lang))
                .and_then(|winner| winner.image.clone());
            if let Some(image) = image {
                record.set_image(image);
                report.patched += 1;
            }
        }
        info!(patched = report.patched, "Remaster images promoted");
        report
    }
}
