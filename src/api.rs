use crate::error::{Error, Result};
use crate::sets::{IconFetcher, SetInfo, SetList};
use crate::symbols::{ManaSymbols, Symbology};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, info};
use url::Url;

pub const ALL_CARDS: &str = "all_cards";

#[derive(Deserialize, Debug)]
pub struct BulkDataEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub download_uri: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct BulkDataIndex {
    pub data: Vec<BulkDataEntry>,
}

impl BulkDataIndex {
    pub fn find(&self, kind: &str) -> Option<&BulkDataEntry> {
        self.data.iter().find(|e| e.kind == kind)
    }
}

/// One page of a card search.
#[derive(Deserialize, Debug)]
pub struct SearchPage {
    #[serde(default)]
    pub total_cards: Option<u64>,
    pub data: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Whether a local copy written at `local` is at least as new as `remote`.
pub fn is_up_to_date(local: SystemTime, remote: DateTime<Utc>) -> bool {
    DateTime::<Utc>::from(local) >= remote
}

pub fn default_headers(user_agent: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .map_err(|_| Error::config(format!("invalid user agent '{}'", user_agent)))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Ok(headers)
}

pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(api_base: &str, user_agent: &str) -> Result<Self> {
        let base = Url::parse(api_base)
            .map_err(|e| Error::config(format!("invalid api base '{}': {}", api_base, e)))?;
        let client = Client::builder()
            .default_headers(default_headers(user_agent)?)
            .build()?;
        Ok(ApiClient { client, base })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::config(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn send(&self, url: &str) -> Result<Response> {
        debug!(url, "GET");
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedResponse {
                url: url.to_string(),
                message: format!("status {}", response.status()),
            });
        }
        Ok(response)
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send(url)?
            .json::<T>()
            .map_err(|e| Error::UnexpectedResponse {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    pub fn bulk_data_index(&self) -> Result<BulkDataIndex> {
        self.get_json(self.endpoint("bulk-data")?.as_str())
    }

    /// Downloads the `kind` bulk file to `dest` unless the local copy is
    /// newer than the published one. Returns whether a download happened.
    pub fn download_bulk(&self, kind: &str, dest: &Path, force: bool) -> Result<bool> {
        let index = self.bulk_data_index()?;
        let entry = index.find(kind).ok_or_else(|| Error::UnexpectedResponse {
            url: self.base.to_string(),
            message: format!("no '{}' bulk data", kind),
        })?;

        if !force && dest.exists() {
            let modified = std::fs::metadata(dest)?.modified()?;
            if is_up_to_date(modified, entry.updated_at) {
                info!(path = %dest.display(), online = %entry.updated_at, "Bulk data is already up to date");
                return Ok(false);
            }
        }

        info!(url = %entry.download_uri, "Downloading bulk data");
        self.download(&entry.download_uri, dest)?;
        Ok(true)
    }

    /// Streams `url` to `dest` through a temporary file.
    pub fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self.send(url)?;
        let bar = match response.content_length() {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({bytes_per_sec})")
        {
            bar.set_style(style);
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let partial = dest.with_extension("part");
        let mut writer = BufWriter::new(File::create(&partial)?);
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = response.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read])?;
            bar.inc(read as u64);
        }
        writer.flush()?;
        drop(writer);
        std::fs::rename(&partial, dest)?;
        bar.finish();
        Ok(())
    }

    pub fn symbology(&self) -> Result<ManaSymbols> {
        let symbology: Symbology = self.get_json(self.endpoint("symbology")?.as_str())?;
        Ok(symbology.into())
    }

    pub fn sets(&self) -> Result<SetList> {
        self.get_json(self.endpoint("sets")?.as_str())
    }

    pub fn set(&self, code: &str) -> Result<SetInfo> {
        self.get_json(self.endpoint(&format!("sets/{}", code))?.as_str())
    }

    /// Every printing of every card of `set_code`, following pagination.
    pub fn set_cards(&self, set_code: &str) -> Result<Vec<Value>> {
        let mut url = self.endpoint("cards/search")?;
        url.query_pairs_mut()
            .append_pair("include_extras", "true")
            .append_pair("include_variations", "true")
            .append_pair("order", "set")
            .append_pair("unique", "prints")
            .append_pair("q", &format!("e:{}", set_code));
        let cards = self.search(url.as_str())?;
        info!(set = set_code, cards = cards.len(), "Fetched set");
        Ok(cards)
    }

    pub fn search(&self, first_page: &str) -> Result<Vec<Value>> {
        let mut page: SearchPage = self.get_json(first_page)?;
        if let Some(total) = page.total_cards {
            debug!(total, "Expected cards");
        }
        let mut cards = std::mem::take(&mut page.data);
        while page.has_more {
            let next = page.next_page.take().ok_or_else(|| Error::UnexpectedResponse {
                url: first_page.to_string(),
                message: "has_more without next_page".into(),
            })?;
            page = self.get_json(&next)?;
            cards.append(&mut page.data);
        }
        Ok(cards)
    }
}

impl IconFetcher for ApiClient {
    fn fetch_icon(&self, set: &SetInfo, dest: &Path) -> Result<bool> {
        let uri = match &set.icon_svg_uri {
            Some(uri) => uri.clone(),
            None => match self.set(&set.code)?.icon_svg_uri {
                Some(uri) => uri,
                None => return Ok(false),
            },
        };
        info!(set = %set.code, "Downloading set icon");
        self.download(&uri, dest)?;
        Ok(true)
    }
}
