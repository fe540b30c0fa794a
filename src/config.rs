use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "cardindex.toml";

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Inputs and intermediate artifacts (bulk catalog, ratings, shards).
    pub data_dir: PathBuf,
    /// Client-facing artifacts.
    pub output_dir: PathBuf,
    /// Directory holding the client's `Raw_CardDatabase_*.mtga` files.
    pub client_db_dir: Option<PathBuf>,
    /// JSON export of the client database, used instead of the SQLite files.
    pub client_db_json: Option<PathBuf>,
    /// Replaces the embedded exception tables.
    pub rules_path: Option<PathBuf>,
    pub shard_count: usize,
    pub fetch_set_icons: bool,
    pub icon_dir: PathBuf,
    pub api_base: String,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("client/src/data"),
            client_db_dir: None,
            client_db_json: None,
            rules_path: None,
            shard_count: 4,
            fetch_set_icons: false,
            icon_dir: PathBuf::from("client/public"),
            api_base: "https://api.scryfall.com".to_string(),
            user_agent: format!("cardindex/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Loads `path` if it exists (a missing default file is not an error),
    /// then applies environment overrides. Call `validate` once every
    /// override is in.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(format!(
                "config file {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("CARDINDEX_DATA_DIR") {
            self.data_dir = v.into();
        }
        if let Some(v) = var("CARDINDEX_OUTPUT_DIR") {
            self.output_dir = v.into();
        }
        if let Some(v) = var("CARDINDEX_CLIENT_DB_DIR") {
            self.client_db_dir = Some(v.into());
        }
        if let Some(v) = var("CARDINDEX_CLIENT_DB_JSON") {
            self.client_db_json = Some(v.into());
        }
        if let Some(v) = var("CARDINDEX_RULES") {
            self.rules_path = Some(v.into());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(Error::config("shard_count must be at least 1"));
        }
        if self.client_db_dir.is_none() && self.client_db_json.is_none() {
            return Err(Error::config(
                "either client_db_dir or client_db_json must be set",
            ));
        }
        Ok(())
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }
}

/// Which cached stages to recompute. The default rebuilds only what is missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForceFlags {
    pub download: bool,
    pub extract: bool,
    pub cache: bool,
    pub ratings: bool,
    pub supplemental: bool,
    pub symbology: bool,
    /// Set codes whose records are refreshed from the API before extraction.
    pub fetch_sets: Vec<String>,
}

impl ForceFlags {
    pub fn all() -> Self {
        ForceFlags {
            download: false,
            extract: true,
            cache: true,
            ratings: true,
            supplemental: true,
            symbology: false,
            fetch_sets: Vec::new(),
        }
    }

    /// Ratings and refreshed sets feed every card, so forcing either one
    /// rebuilds the card cache too.
    pub fn rebuilds_cache(&self) -> bool {
        self.cache || self.ratings || !self.fetch_sets.is_empty()
    }

    pub fn from_mode(mode: Option<&Mode>) -> Self {
        let mut flags = ForceFlags::default();
        match mode {
            None => {}
            Some(Mode::Download) => {
                flags.download = true;
                flags.cache = true;
            }
            Some(Mode::Extract) => {
                flags.extract = true;
                flags.cache = true;
            }
            Some(Mode::Cache) => flags.cache = true,
            Some(Mode::Ratings) => flags.ratings = true,
            Some(Mode::Supplemental) => flags.supplemental = true,
            Some(Mode::Symbology) => flags.symbology = true,
            Some(Mode::FetchSets(codes)) => {
                flags.fetch_sets = codes.clone();
                flags.cache = true;
            }
        }
        flags
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Download,
    Extract,
    Cache,
    Ratings,
    Supplemental,
    Symbology,
    FetchSets(Vec<String>),
}

impl Mode {
    pub fn parse(mode: &str, sets: Option<&str>) -> Result<Self> {
        let mode = match mode.to_lowercase().as_str() {
            "dl" => Mode::Download,
            "extract" => Mode::Extract,
            "cache" => Mode::Cache,
            "ratings" => Mode::Ratings,
            "jmp" => Mode::Supplemental,
            "symb" => Mode::Symbology,
            "set" => {
                let codes: Vec<String> = sets
                    .unwrap_or_default()
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if codes.is_empty() {
                    return Err(Error::config("mode 'set' needs a comma separated list of set codes"));
                }
                Mode::FetchSets(codes)
            }
            other => return Err(Error::config(format!("unknown mode '{}'", other))),
        };
        Ok(mode)
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(' ') {
            Some((mode, sets)) => Mode::parse(mode, Some(sets)),
            None => Mode::parse(s, None),
        }
    }
}
