use crate::api::{self, ApiClient};
use crate::cache::{self, CardCache};
use crate::catalog;
use crate::client_db::{self, DigitalClientCardRecord};
use crate::config::{Config, ForceFlags};
use crate::error::{Error, Result};
use crate::extract::{CanonicalCard, CardMap, FieldExtractor};
use crate::filter::CandidateFilter;
use crate::linker::IdentityLinks;
use crate::list_sheets::SheetResolver;
use crate::persist;
use crate::promoter::SpecialPrintingPromoter;
use crate::ratings::Ratings;
use crate::rules::RuleBook;
use crate::selector::{PrintingSelector, SelectionCandidate};
use crate::sets::{BonusSheet, MetadataBuilder, SetCatalog};
use crate::supplemental::{self, PackResolver};
use crate::symbols::ManaSymbols;
use crate::translations::TranslationAggregator;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BULK_DATA_FILE: &str = "scryfall-all-cards.json";
pub const SET_LIST_FILE: &str = "scryfall-sets.json";
pub const LINK_DUMP_FILE: &str = "MTGADataDebug.json";
pub const CARDS_BY_NAME_FILE: &str = "CardsByName.json";
pub const RATINGS_BASE_FILE: &str = "ratings_base.json";
pub const RATINGS_FILE: &str = "ratings.json";
pub const RATING_PAGES_DIR: &str = "LimitedRatings";
pub const PACK_LISTS_DIR: &str = "JumpstartBoosters";
pub const PACK_SWAPS_FILE: &str = "JumpstartSwaps.json";
pub const LIST_SHEETS_DIR: &str = "TheList";

pub const CLIENT_CARDS_FILE: &str = "MTGACards.json";
pub const CLIENT_ALTERNATES_FILE: &str = "MTGAAlternates.json";
pub const BASIC_LANDS_FILE: &str = "BasicLandIDs.json";
pub const SETS_FILE: &str = "SetsInfos.json";
pub const PRIMARY_SETS_FILE: &str = "PrimarySets.json";
pub const PACKS_FILE: &str = "JumpstartBoosters.json";
pub const MANA_SYMBOLS_FILE: &str = "mana_symbols.json";

const ENGLISH: &str = "en";

/// `J21MTGACollectorNumbers.json` for `j21`.
pub fn client_numbers_file(set: &str) -> String {
    format!("{}MTGACollectorNumbers.json", set.to_uppercase())
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct WrittenArtifacts {
    /// Files written by this run.
    pub written: Vec<PathBuf>,
    /// Existing files that were reused as is.
    pub reused: Vec<PathBuf>,
    /// Canonical cards in the cache.
    pub cards: usize,
}

impl WrittenArtifacts {
    fn wrote(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    fn reuse(&mut self, path: PathBuf) {
        info!(path = %path.display(), "Reusing");
        self.reused.push(path);
    }
}

/// One batch run. Every stage reuses its artifact when present, so an
/// interrupted run resumes from the last artifact it completed.
pub fn run(config: &Config, force: &ForceFlags) -> Result<WrittenArtifacts> {
    config.validate()?;
    let rules = match &config.rules_path {
        Some(path) => RuleBook::load(path)?,
        None => RuleBook::builtin()?,
    };
    Pipeline {
        config,
        force,
        rules,
    }
    .run()
}

struct Pipeline<'a> {
    config: &'a Config,
    force: &'a ForceFlags,
    rules: RuleBook,
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {pos} records ({elapsed})") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(200));
    bar
}

impl Pipeline<'_> {
    fn api(&self) -> Result<ApiClient> {
        ApiClient::new(&self.config.api_base, &self.config.user_agent)
    }

    fn run(&self) -> Result<WrittenArtifacts> {
        let mut out = WrittenArtifacts::default();

        let links = IdentityLinks::build(&self.client_records()?, &self.rules);
        let dump_path = self.config.data_path(LINK_DUMP_FILE);
        if cache::is_fresh(&dump_path, self.force.extract || self.force.cache) {
            out.reuse(dump_path);
        } else {
            cache::write_json(&dump_path, &links.debug_dump())?;
            out.wrote(dump_path);
        }
        self.client_numbers(&links, &mut out)?;

        let symbols = self.mana_symbols(&mut out)?;
        let bulk_path = self.bulk_data(&mut out)?;
        let set_catalog = self.set_catalog(&mut out)?;
        self.refresh_sets(&bulk_path)?;

        let first_shard = cache::shard_path(&self.config.data_dir, 0);
        if !cache::is_fresh(&first_shard, self.force.rebuilds_cache()) {
            let ratings = Ratings::load(
                &self.config.data_path(RATINGS_BASE_FILE),
                &self.config.data_path(RATING_PAGES_DIR),
                &self.config.data_path(RATINGS_FILE),
                self.force.ratings,
            )?;
            let primary = set_catalog.primary_sets(&self.rules.sets);
            self.build_card_cache(&bulk_path, &links, &symbols, &ratings, &primary, &mut out)?;
        } else {
            out.reuse(first_shard);
        }

        let mut cards = CardCache::new();
        cards.load_shards(&self.config.data_dir)?;
        out.cards = cards.len();
        info!(cards = cards.len(), "Cards in database");

        let basic_lands = self.config.output_path(BASIC_LANDS_FILE);
        cache::write_json(&basic_lands, &persist::basic_land_ids(cards.iter()))?;
        out.wrote(basic_lands);

        self.supplemental_packs(&links, &cards, &mut out)?;
        self.list_sheets(&cards, &mut out)?;
        self.set_metadata(&set_catalog, &cards, &mut out)?;
        Ok(out)
    }

    fn client_records(&self) -> Result<Vec<DigitalClientCardRecord>> {
        match (&self.config.client_db_json, &self.config.client_db_dir) {
            (Some(json), _) => client_db::read_json(json),
            (None, Some(dir)) => client_db::read_sqlite_dir(dir),
            (None, None) => Err(Error::config(
                "either client_db_dir or client_db_json must be set",
            )),
        }
    }

    fn client_numbers(&self, links: &IdentityLinks, out: &mut WrittenArtifacts) -> Result<()> {
        for set in &self.rules.linker.client_number_sets {
            let path = self.config.data_path(&client_numbers_file(set));
            if cache::is_fresh(&path, self.force.extract || self.force.cache) {
                out.reuse(path);
                continue;
            }
            let empty = BTreeMap::new();
            cache::write_json(&path, links.client_numbers(set).unwrap_or(&empty))?;
            out.wrote(path);
        }
        Ok(())
    }

    fn mana_symbols(&self, out: &mut WrittenArtifacts) -> Result<ManaSymbols> {
        let path = self.config.output_path(MANA_SYMBOLS_FILE);
        if cache::is_fresh(&path, self.force.symbology) {
            out.reuse(path.clone());
            return ManaSymbols::load(&path);
        }
        let symbols = self.api()?.symbology()?;
        cache::write_json(&path, &symbols)?;
        out.wrote(path);
        Ok(symbols)
    }

    fn bulk_data(&self, out: &mut WrittenArtifacts) -> Result<PathBuf> {
        let path = self.config.data_path(BULK_DATA_FILE);
        if cache::is_fresh(&path, self.force.download) {
            out.reuse(path.clone());
        } else if self.api()?.download_bulk(api::ALL_CARDS, &path, false)? {
            out.wrote(path.clone());
        }
        Ok(path)
    }

    fn set_catalog(&self, out: &mut WrittenArtifacts) -> Result<SetCatalog> {
        let path = self.config.data_path(SET_LIST_FILE);
        if cache::is_fresh(&path, self.force.download) {
            out.reuse(path.clone());
        } else {
            cache::write_json(&path, &self.api()?.sets()?)?;
            out.wrote(path.clone());
        }
        SetCatalog::load(&path)
    }

    fn refresh_sets(&self, bulk_path: &Path) -> Result<()> {
        if self.force.fetch_sets.is_empty() {
            return Ok(());
        }
        let api = self.api()?;
        let mut fresh = Vec::new();
        for code in &self.force.fetch_sets {
            fresh.extend(api.set_cards(code)?);
        }
        let (updated, added) = catalog::merge_refreshed(bulk_path, fresh)?;
        info!(updated, added, "Bulk data refreshed");
        Ok(())
    }

    /// Single pass over the bulk catalog, then aggregation, extraction and
    /// selection over the filtered records.
    fn build_card_cache(
        &self,
        bulk_path: &Path,
        links: &IdentityLinks,
        symbols: &ManaSymbols,
        ratings: &Ratings,
        primary_sets: &HashSet<String>,
        out: &mut WrittenArtifacts,
    ) -> Result<()> {
        let mut promoter = SpecialPrintingPromoter::new(&self.rules.remasters, links);
        let mut filter = CandidateFilter::new(links, &self.rules);
        let mut filtered = Vec::new();

        let bar = spinner("Filtering catalog");
        for record in catalog::open(bulk_path)? {
            let record = record?;
            promoter.observe(&record);
            if let Some(kept) = filter.admit(record) {
                filtered.push(kept);
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
        let stats = filter.stats();
        info!(
            seen = stats.seen,
            kept = stats.kept,
            rejected_layout = stats.rejected_layout,
            missing_fields = stats.missing_fields,
            linked = stats.linked,
            "Catalog filtered"
        );
        let report = promoter.apply(&mut filtered);
        for (set, names) in &report.missing {
            warn!(set = %set, missing = names.len(), "Remaster names without a printing");
        }

        let extractor = FieldExtractor::new(symbols, ratings, &self.rules);
        let mut aggregator = TranslationAggregator::new();
        let mut card_map = CardMap::default();
        let mut groups: BTreeMap<String, Vec<SelectionCandidate>> = BTreeMap::new();

        let bar = spinner("Extracting cards");
        for record in &filtered {
            card_map.seed(&record.id);
            aggregator.observe(record);
            if record.lang == ENGLISH {
                card_map.merge(extractor.extract(record));
                groups
                    .entry(record.name.clone())
                    .or_default()
                    .push(SelectionCandidate::from_record(record, true));
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        let mut translations = aggregator.finish();
        for record in translations.take_foreign_only() {
            let mut card = extractor.extract(&record);
            card.no_english_print = true;
            card_map.merge(card);
            groups
                .entry(record.name.clone())
                .or_default()
                .push(SelectionCandidate::from_record(&record, false));
        }
        drop(filtered);

        let mut cards: Vec<CanonicalCard> = card_map.into_cards();
        for card in &mut cards {
            card.translations = translations.get(&card.identity_key());
        }

        let maps = persist::client_maps(&cards);
        let client_cards = self.config.output_path(CLIENT_CARDS_FILE);
        cache::write_json(&client_cards, &maps.cards)?;
        out.wrote(client_cards);
        let alternates = self.config.output_path(CLIENT_ALTERNATES_FILE);
        cache::write_json(&alternates, &maps.alternates)?;
        out.wrote(alternates);

        let selector = PrintingSelector::new(&self.rules.selector, links, primary_sets);
        let by_name = selector.select_all(&groups);
        let by_name_path = self.config.data_path(CARDS_BY_NAME_FILE);
        cache::write_json(&by_name_path, &by_name)?;
        out.wrote(by_name_path);

        for path in persist::write_shards(&self.config.data_dir, &cards, self.config.shard_count)? {
            out.wrote(path);
        }
        Ok(())
    }

    fn supplemental_packs(&self, links: &IdentityLinks, cards: &CardCache, out: &mut WrittenArtifacts) -> Result<()> {
        let path = self.config.output_path(PACKS_FILE);
        if cache::is_fresh(&path, self.force.supplemental) {
            out.reuse(path);
            return Ok(());
        }
        let lists = self.config.data_path(PACK_LISTS_DIR);
        if !lists.is_dir() {
            warn!(dir = %lists.display(), "No supplemental pack lists, skipping");
            return Ok(());
        }
        let swaps = supplemental::load_swaps(&self.config.data_path(PACK_SWAPS_FILE))?;
        let resolver = PackResolver::new(links, cards, &swaps, &self.rules.supplemental.home_set);
        let packs = resolver.read_dir(&lists)?;
        cache::write_json(&path, &packs)?;
        out.wrote(path);
        Ok(())
    }

    /// Converted on every run.
    fn list_sheets(&self, cards: &CardCache, out: &mut WrittenArtifacts) -> Result<()> {
        let lists = self.config.data_path(LIST_SHEETS_DIR);
        if !lists.is_dir() {
            debug!(dir = %lists.display(), "No reprint sheet lists");
            return Ok(());
        }
        let resolver = SheetResolver::new(cards, &self.rules.list_sheets.sheet_sets);
        for path in resolver.convert_dir(&lists, &self.config.output_path(LIST_SHEETS_DIR))? {
            out.wrote(path);
        }
        Ok(())
    }

    fn set_metadata(&self, catalog: &SetCatalog, cards: &CardCache, out: &mut WrittenArtifacts) -> Result<()> {
        let bonus_sheets: Vec<BonusSheet> = match &self.rules.sets.bonus_sheets {
            Some(rule) => {
                let path = self.config.data_path(&rule.file);
                if path.exists() {
                    cache::read_json(&path)?
                } else {
                    warn!(path = %path.display(), "No bonus sheet list");
                    Vec::new()
                }
            }
            None => Vec::new(),
        };

        let api = if self.config.fetch_set_icons {
            Some(self.api()?)
        } else {
            None
        };
        let mut builder = MetadataBuilder::new(catalog, &self.rules.sets, &self.config.icon_dir);
        if let Some(api) = &api {
            builder = builder.with_fetcher(api);
        }
        let report = builder.build(cards.iter(), &bonus_sheets)?;

        let sets_path = self.config.output_path(SETS_FILE);
        cache::write_json(&sets_path, &report.metadata)?;
        out.wrote(sets_path);
        let primary_path = self.config.output_path(PRIMARY_SETS_FILE);
        cache::write_json(&primary_path, &report.primary)?;
        out.wrote(primary_path);
        Ok(())
    }
}
