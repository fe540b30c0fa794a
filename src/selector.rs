use crate::card::{collector_number_prefix, front_name, ExternalCardRecord, FACE_SEPARATOR};
use crate::linker::IdentityLinks;
use crate::rules::SelectorPolicy;
use chrono::NaiveDate;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashSet};

/// The parts of a printing the selector looks at.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionCandidate {
    pub id: String,
    pub name: String,
    pub set: String,
    pub collector_number: String,
    pub released_at: Option<NaiveDate>,
    pub promo: bool,
    pub image_status: String,
    pub finishes: Vec<String>,
    pub frame_effects: Vec<String>,
    pub linked_id: Option<u32>,
    /// False for printings that were only ever released in other languages.
    pub english: bool,
}

impl SelectionCandidate {
    pub fn from_record(record: &ExternalCardRecord, english: bool) -> Self {
        SelectionCandidate {
            id: record.id.clone(),
            name: record.name.clone(),
            set: record.set_code(),
            collector_number: record.collector_number.clone(),
            released_at: record.released_at,
            promo: record.promo,
            image_status: record.image_status.clone(),
            finishes: record.finishes.clone(),
            frame_effects: record.frame_effects.clone(),
            linked_id: record.linked_id,
            english,
        }
    }
}

/// Orders collector numbers so the lower one sorts first: numeric prefix,
/// then the full string. Numbers without digits sort after numbered ones.
/// Mixed pairs like "7a" vs "141" still compare by their numeric prefix, so
/// the order stays total where a parse-or-string comparison would not be.
fn collector_number_key(collector_number: &str) -> (u32, &str) {
    (
        collector_number_prefix(collector_number).unwrap_or(u32::MAX),
        collector_number,
    )
}

/// Picks the maximum of a total order, so the winner does not depend on the
/// order printings were seen in.
pub struct PrintingSelector<'a> {
    policy: &'a SelectorPolicy,
    links: &'a IdentityLinks,
    primary_sets: &'a HashSet<String>,
}

impl<'a> PrintingSelector<'a> {
    pub fn new(
        policy: &'a SelectorPolicy,
        links: &'a IdentityLinks,
        primary_sets: &'a HashSet<String>,
    ) -> Self {
        PrintingSelector {
            policy,
            links,
            primary_sets,
        }
    }

    fn is_conjure_only(&self, c: &SelectionCandidate) -> bool {
        self.policy.conjure_only.iter().any(|rule| {
            rule.set == c.set
                && c.collector_number
                    .parse::<u32>()
                    .is_ok_and(|n| n >= rule.min_collector_number)
        })
    }

    fn has_excluded_finish(&self, c: &SelectionCandidate) -> bool {
        c.finishes
            .iter()
            .any(|f| self.policy.excluded_finishes.contains(f))
    }

    fn has_excluded_frame(&self, c: &SelectionCandidate) -> bool {
        c.frame_effects
            .iter()
            .any(|f| self.policy.excluded_frame_effects.contains(f))
    }

    /// Preference flags in decreasing priority; `true` is better.
    fn preferences(&self, c: &SelectionCandidate) -> [bool; 10] {
        [
            c.english,
            !self.is_conjure_only(c),
            !self.policy.unimportable_sets.contains(&c.set),
            self.links.contains(&c.name, &c.collector_number, &c.set),
            c.linked_id.is_some(),
            !self.has_excluded_finish(c),
            !self.has_excluded_frame(c),
            c.image_status == self.policy.preferred_image_status,
            self.primary_sets.contains(&c.set),
            !c.promo,
        ]
    }

    /// `Greater` when `a` is the better printing.
    pub fn compare(&self, a: &SelectionCandidate, b: &SelectionCandidate) -> Ordering {
        self.preferences(a)
            .cmp(&self.preferences(b))
            .then_with(|| a.released_at.cmp(&b.released_at))
            .then_with(|| {
                Reverse(collector_number_key(&a.collector_number))
                    .cmp(&Reverse(collector_number_key(&b.collector_number)))
            })
            .then_with(|| b.id.cmp(&a.id))
    }

    /// Pairwise reduction step.
    pub fn select_card<'c>(
        &self,
        a: &'c SelectionCandidate,
        b: &'c SelectionCandidate,
    ) -> &'c SelectionCandidate {
        match self.compare(a, b) {
            Ordering::Less => b,
            _ => a,
        }
    }

    pub fn best<'c>(&self, group: &'c [SelectionCandidate]) -> Option<&'c SelectionCandidate> {
        group.iter().reduce(|a, b| self.select_card(a, b))
    }

    /// Name -> winning id, plus front-face aliases for joined names.
    pub fn select_all(&self, groups: &BTreeMap<String, Vec<SelectionCandidate>>) -> BTreeMap<String, String> {
        let mut by_name: BTreeMap<String, String> = groups
            .iter()
            .filter_map(|(name, group)| Some((name.clone(), self.best(group)?.id.clone())))
            .collect();
        add_front_name_aliases(&mut by_name);
        by_name
    }
}

/// Registers "Fire" for "Fire // Ice" unless some card is already called "Fire".
pub fn add_front_name_aliases(by_name: &mut BTreeMap<String, String>) {
    let aliases: Vec<(String, String)> = by_name
        .iter()
        .filter(|(name, _)| name.contains(FACE_SEPARATOR))
        .map(|(name, id)| (front_name(name).to_string(), id.clone()))
        .collect();
    for (alias, id) in aliases {
        by_name.entry(alias).or_insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_db::DigitalClientCardRecord;
    use crate::rules::RuleBook;

    fn candidate(id: &str, set: &str, cn: &str, date: &str) -> SelectionCandidate {
        SelectionCandidate {
            id: id.into(),
            name: "Lightning Bolt".into(),
            set: set.into(),
            collector_number: cn.into(),
            released_at: date.parse().ok(),
            image_status: "highres_scan".into(),
            english: true,
            ..Default::default()
        }
    }

    struct Fixture {
        rules: RuleBook,
        links: IdentityLinks,
        primary: HashSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let rules = RuleBook::builtin().unwrap();
            let links = IdentityLinks::build(
                &[DigitalClientCardRecord {
                    grp_id: 100,
                    title_id: 1,
                    title: Some("Lightning Bolt".into()),
                    expansion_code: "M21".into(),
                    collector_number: "1".into(),
                    rarity: 2,
                    is_primary_card: Some(true),
                    is_rebalanced: false,
                }],
                &rules,
            );
            let primary = ["m21", "2xm", "m10"].iter().map(|s| s.to_string()).collect();
            Fixture {
                rules,
                links,
                primary,
            }
        }

        fn selector(&self) -> PrintingSelector<'_> {
            PrintingSelector::new(&self.rules.selector, &self.links, &self.primary)
        }
    }

    #[test]
    fn linked_core_printing_beats_newer_promo() {
        let fixture = Fixture::new();
        let selector = fixture.selector();
        let mut core = candidate("core", "m21", "2", "2021-01-01");
        core.linked_id = Some(100);
        let mut masters = candidate("masters", "2xm", "3", "2022-01-01");
        masters.promo = true;
        assert_eq!(selector.select_card(&core, &masters).id, "core");
        assert_eq!(selector.select_card(&masters, &core).id, "core");
    }

    #[test]
    fn english_and_importable_printings_come_first() {
        let fixture = Fixture::new();
        let selector = fixture.selector();
        let mut foreign = candidate("foreign", "m21", "1", "2021-01-01");
        foreign.english = false;
        let plain = candidate("plain", "m10", "5", "2009-07-17");
        assert_eq!(selector.select_card(&foreign, &plain).id, "plain");

        let conjured = candidate("conjured", "j21", "780", "2021-08-12");
        let regular = candidate("regular", "j21", "12", "2021-08-12");
        assert_eq!(selector.select_card(&conjured, &regular).id, "regular");

        let vintage = candidate("vintage", "vma", "1", "2022-01-01");
        assert_eq!(selector.select_card(&vintage, &plain).id, "plain");
    }

    #[test]
    fn special_frames_and_scans() {
        let fixture = Fixture::new();
        let selector = fixture.selector();
        let mut showcase = candidate("showcase", "m10", "300", "2009-07-17");
        showcase.frame_effects = vec!["showcase".into()];
        let plain = candidate("plain", "m10", "5", "2009-07-17");
        assert_eq!(selector.select_card(&showcase, &plain).id, "plain");

        let mut etched = candidate("etched", "m10", "4", "2009-07-17");
        etched.finishes = vec!["etched".into()];
        assert_eq!(selector.select_card(&etched, &plain).id, "plain");

        let mut lowres = candidate("lowres", "m10", "1", "2009-07-17");
        lowres.image_status = "lowres".into();
        assert_eq!(selector.select_card(&lowres, &plain).id, "plain");
    }

    #[test]
    fn primary_then_promo_then_recency_then_number() {
        let fixture = Fixture::new();
        let selector = fixture.selector();
        let primary = candidate("primary", "m10", "5", "2009-07-17");
        let secondary = candidate("secondary", "sld", "5", "2023-01-01");
        assert_eq!(selector.select_card(&secondary, &primary).id, "primary");

        let mut promo = candidate("promo", "m10", "4", "2009-07-17");
        promo.promo = true;
        assert_eq!(selector.select_card(&promo, &primary).id, "primary");

        let newer = candidate("newer", "2xm", "140", "2020-08-07");
        assert_eq!(selector.select_card(&primary, &newer).id, "newer");

        let nine = candidate("nine", "m10", "9", "2009-07-17");
        let ten = candidate("ten", "m10", "10", "2009-07-17");
        assert_eq!(selector.select_card(&ten, &nine).id, "nine");
        let lettered = candidate("lettered", "m10", "9a", "2009-07-17");
        assert_eq!(selector.select_card(&lettered, &nine).id, "nine");
    }

    #[test]
    fn front_names_alias_without_stealing() {
        let mut by_name = BTreeMap::from([
            ("Fire // Ice".to_string(), "fire-ice".to_string()),
            ("Bonecrusher Giant // Stomp".to_string(), "giant".to_string()),
            ("Fire".to_string(), "plain-fire".to_string()),
        ]);
        add_front_name_aliases(&mut by_name);
        assert_eq!(by_name["Fire"], "plain-fire");
        assert_eq!(by_name["Bonecrusher Giant"], "giant");
        assert_eq!(by_name.len(), 4);
    }
}
