use crate::card::ExternalCardRecord;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Start,
    Array,
    Concatenated,
    Done,
}

/// Yields one element of a JSON array at a time, so the multi-gigabyte
/// catalog is never parsed whole. Concatenated objects are accepted too.
pub struct CatalogStream<R, T> {
    reader: R,
    state: State,
    read: usize,
    _item: PhantomData<T>,
}

pub fn open(path: &Path) -> Result<CatalogStream<BufReader<File>, ExternalCardRecord>> {
    open_as(path)
}

pub fn open_as<T: DeserializeOwned>(path: &Path) -> Result<CatalogStream<BufReader<File>, T>> {
    if !path.exists() {
        return Err(Error::MissingInput(format!("catalog {}", path.display())));
    }
    let file = File::open(path)?;
    Ok(CatalogStream::new(BufReader::with_capacity(1 << 20, file)))
}

impl<R: BufRead, T: DeserializeOwned> CatalogStream<R, T> {
    pub fn new(reader: R) -> Self {
        CatalogStream {
            reader,
            state: State::Start,
            read: 0,
            _item: PhantomData,
        }
    }

    /// Number of elements yielded so far.
    pub fn read(&self) -> usize {
        self.read
    }

    /// Consumes whitespace (and commas inside an array) and returns the next
    /// significant byte without consuming it.
    fn peek_significant(&mut self) -> Result<Option<u8>> {
        let skip_commas = self.state == State::Array;
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            let skipped = buf
                .iter()
                .take_while(|b| b.is_ascii_whitespace() || (skip_commas && **b == b','))
                .count();
            if skipped < buf.len() {
                let next = buf[skipped];
                self.reader.consume(skipped);
                return Ok(Some(next));
            }
            let len = buf.len();
            self.reader.consume(len);
        }
    }

    fn next_item(&mut self) -> Result<Option<T>> {
        loop {
            let next = self.peek_significant()?;
            match (self.state, next) {
                (State::Done, _) => return Ok(None),
                (State::Start, None) => return Ok(None),
                (State::Start, Some(b'[')) => {
                    self.reader.consume(1);
                    self.state = State::Array;
                }
                (State::Start, Some(b'{')) => self.state = State::Concatenated,
                (State::Start, Some(other)) => {
                    return Err(Error::UnexpectedResponse {
                        url: "catalog".into(),
                        message: format!("unexpected leading byte {:?}", other as char),
                    })
                }
                (State::Array, None) => {
                    return Err(Error::UnexpectedResponse {
                        url: "catalog".into(),
                        message: format!("array ended without ']' after {} items", self.read),
                    })
                }
                (State::Array, Some(b']')) => {
                    self.reader.consume(1);
                    return Ok(None);
                }
                (State::Concatenated, None) => return Ok(None),
                (State::Array | State::Concatenated, Some(_)) => {
                    let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
                    let item = T::deserialize(&mut de)?;
                    self.read += 1;
                    return Ok(Some(item));
                }
            }
        }
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for CatalogStream<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(err) => {
                self.state = State::Done;
                Some(Err(err))
            }
        }
    }
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

/// Replaces catalog records by id with `fresh` ones and appends the rest.
///
/// The merged catalog is written next to the original and swapped in; the
/// previous file is kept as `<name>.bak`. Returns (updated, added).
pub fn merge_refreshed(path: &Path, fresh: Vec<Value>) -> Result<(usize, usize)> {
    let mut order = Vec::with_capacity(fresh.len());
    let mut by_id: HashMap<String, Value> = HashMap::with_capacity(fresh.len());
    for card in fresh {
        let IdOnly { id } = serde_json::from_value(card.clone())?;
        if by_id.insert(id.clone(), card).is_none() {
            order.push(id);
        }
    }
    info!(cards = by_id.len(), "Merging refreshed cards into the catalog");

    let tmp_path = sibling(path, "tmp");
    let mut out = BufWriter::new(File::create(&tmp_path)?);
    out.write_all(b"[\n")?;
    let mut first = true;
    let mut updated = 0;

    for value in open_as::<Value>(path)? {
        let value = value?;
        let replacement = value
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| by_id.remove(id));
        if !first {
            out.write_all(b",\n")?;
        }
        first = false;
        match replacement {
            Some(card) => {
                debug!(name = ?card.get("name"), "Updating");
                updated += 1;
                serde_json::to_writer(&mut out, &card)?;
            }
            None => serde_json::to_writer(&mut out, &value)?,
        }
    }

    let mut added = 0;
    for id in order {
        if let Some(card) = by_id.remove(&id) {
            if !first {
                out.write_all(b",\n")?;
            }
            first = false;
            debug!(name = ?card.get("name"), "Adding");
            added += 1;
            serde_json::to_writer(&mut out, &card)?;
        }
    }
    out.write_all(b"]")?;
    out.flush()?;
    drop(out);

    let backup = sibling(path, "bak");
    if backup.exists() {
        std::fs::remove_file(&backup)?;
    }
    std::fs::rename(path, &backup)?;
    std::fs::rename(&tmp_path, path)?;
    info!(updated, added, "Catalog refreshed");
    Ok((updated, added))
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
