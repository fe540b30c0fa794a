use crate::booster;
use crate::card::{collapse_repeated_faces, CardFace, ExternalCardRecord};
use crate::linker::IdentityLinks;
use crate::rules::RuleBook;
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub seen: usize,
    pub kept: usize,
    pub rejected_layout: usize,
    pub missing_fields: usize,
    pub linked: usize,
}

pub struct CandidateFilter<'a> {
    links: &'a IdentityLinks,
    rules: &'a RuleBook,
    stats: FilterStats,
}

impl<'a> CandidateFilter<'a> {
    pub fn new(links: &'a IdentityLinks, rules: &'a RuleBook) -> Self {
        CandidateFilter {
            links,
            rules,
            stats: FilterStats::default(),
        }
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    pub fn is_rejected_layout(&self, record: &ExternalCardRecord) -> bool {
        let filter = &self.rules.filter;
        filter.rejected_layouts.contains(&record.layout)
            && !filter.playable_exceptions.contains(&record.name)
    }

    /// Returns the annotated record, or `None` if it must be dropped.
    pub fn admit(&mut self, mut record: ExternalCardRecord) -> Option<ExternalCardRecord> {
        self.stats.seen += 1;
        if self.is_rejected_layout(&record) {
            self.stats.rejected_layout += 1;
            return None;
        }
        if !fill_from_faces(&mut record) {
            self.stats.missing_fields += 1;
            return None;
        }

        if let Some(repaired) = collapse_repeated_faces(&record.name) {
            record.name = repaired;
        }

        let set = record.set_code();
        record.linked_id = self
            .links
            .resolve(&record.name, &record.collector_number, &set)
            .or_else(|| {
                self.links
                    .resolve(record.front_name(), &record.collector_number, &set)
            });
        if record.linked_id.is_some() {
            self.stats.linked += 1;
        }

        record.booster = booster::cascade(
            &self.rules.filter.source_corrections,
            &record,
            record.booster,
        );

        self.stats.kept += 1;
        Some(record)
    }
}

/// Some double-faced printings only carry `type_line` and `oracle_id` on their
/// faces. Copies them up when the faces agree (or, for reversible cards, from
/// the front face). Returns false when the record stays incomplete.
pub fn fill_from_faces(record: &mut ExternalCardRecord) -> bool {
    let reversible = record.layout == "reversible_card";
    let faces = record.faces();

    let recovered = |field: fn(&CardFace) -> Option<&String>| -> Option<String> {
        match faces {
            [front, back, ..] if field(front).is_some() && field(front) == field(back) => {
                field(front).cloned()
            }
            [front, ..] if reversible => field(front).cloned(),
            _ => None,
        }
    };
    let type_line = match &record.type_line {
        Some(_) => None,
        None => recovered(face_type_line),
    };
    let oracle_id = match &record.oracle_id {
        Some(_) => None,
        None => recovered(face_oracle_id),
    };

    if type_line.is_some() {
        record.type_line = type_line;
    }
    if oracle_id.is_some() {
        record.oracle_id = oracle_id;
    }

    for (field, present) in [
        ("type_line", record.type_line.is_some()),
        ("oracle_id", record.oracle_id.is_some()),
    ] {
        if !present {
            warn!(card = %record.name, set = %record.set, id = %record.id, field, "Missing field, record skipped");
            return false;
        }
    }
    true
}

fn face_type_line(face: &CardFace) -> Option<&String> {
    face.type_line.as_ref()
}

fn face_oracle_id(face: &CardFace) -> Option<&String> {
    face.oracle_id.as_ref()
}
