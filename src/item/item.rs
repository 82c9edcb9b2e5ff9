//! Units of work: [`Item`] and [`Batch`].
//!
//! # Examples
//!
//! ```rust
//! use ferry::item::{Batch, Item};
//! use std::convert::TryFrom;
//!
//! // The id is extracted from the last path segment.
//! let item = Item::try_from("https://example.com/images/Blue%20Nose.png")?;
//! assert_eq!(item.id, "Blue Nose.png");
//!
//! // Or pick the id and persist the payload.
//! let catalog = Item::new("catalog", &reqwest::Url::parse("https://example.com/model.xml")?)
//!     .with_destination("data/model.xml");
//!
//! let batch = Batch::new(vec![item, catalog]);
//! assert_eq!(batch.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::Error;

use reqwest::Url;
use serde::Serialize;
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single URL to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable identifier, unique among the items known to an engine.
    pub id: String,
    /// URL to GET.
    pub url: Url,
    /// Where to persist the payload. `None` keeps it in memory.
    pub destination: Option<PathBuf>,
}

impl Item {
    /// Creates a new [`Item`] that keeps its payload in memory.
    pub fn new(id: impl Into<String>, url: &Url) -> Self {
        Self {
            id: id.into(),
            url: url.clone(),
            destination: None,
        }
    }

    /// Persist the payload at `path` once downloaded.
    pub fn with_destination(mut self, path: impl AsRef<Path>) -> Self {
        self.destination = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl TryFrom<&Url> for Item {
    type Error = crate::error::Error;

    fn try_from(value: &Url) -> Result<Self, Self::Error> {
        value
            .path_segments()
            .ok_or_else(|| {
                Error::InvalidUrl(format!(
                    "The url \"{}\" does not contain a valid path",
                    value
                ))
            })?
            .next_back()
            .filter(|segment| !segment.is_empty())
            .map(|segment| Item {
                url: value.clone(),
                id: form_urlencoded::parse(segment.as_bytes())
                    .map(|(key, val)| [key, val].concat())
                    .collect(),
                destination: None,
            })
            .ok_or_else(|| {
                Error::InvalidUrl(format!("The url \"{}\" does not contain a filename", value))
            })
    }
}

impl TryFrom<&str> for Item {
    type Error = crate::error::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Url::parse(value)
            .map_err(|e| {
                Error::InvalidUrl(format!("The url \"{}\" cannot be parsed: {}", value, e))
            })
            .and_then(|u| Item::try_from(&u))
    }
}

/// Handle of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BatchId(pub(crate) u64);

impl BatchId {
    /// Raw numeric value, unique per engine.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// An ordered collection of items tracked to a single terminal event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    items: Vec<Item>,
}

impl Batch {
    /// Creates a batch from the given items, keeping their order.
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// Build a batch from URLs, deriving each id from its URL.
    ///
    /// Ids already taken within the batch get a `#2`, `#3`, ... suffix, so
    /// the same file name (or the same URL) can appear more than once.
    pub fn from_urls<I, S>(urls: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut taken = HashSet::new();
        let mut items = Vec::new();
        for url in urls {
            let item = Item::try_from(url.as_ref())?;
            let mut id = item.id.clone();
            let mut n = 1;
            while taken.contains(&id) {
                n += 1;
                id = format!("{}#{}", item.id, n);
            }
            taken.insert(id.clone());
            items.push(item.with_id(id));
        }
        Ok(Self::new(items))
    }

    /// Append an item.
    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    /// The items, in submission order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn into_items(self) -> Vec<Item> {
        self.items
    }
}

impl FromIterator<Item> for Batch {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_from_url() {
        let item = Item::try_from("https://example.com/a/b/file-0.1.2.png").unwrap();
        assert_eq!(item.id, "file-0.1.2.png");
        assert!(item.destination.is_none());
    }

    #[test]
    fn test_item_id_is_decoded() {
        let item = Item::try_from("http://x/images/Blue_20Nose%20Thumb.png").unwrap();
        assert_eq!(item.id, "Blue_20Nose Thumb.png");
    }

    #[test]
    fn test_item_without_filename() {
        assert!(matches!(
            Item::try_from("https://example.com/"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(Item::try_from("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_batch_from_urls_keeps_order() {
        let batch = Batch::from_urls(["http://x/a.png", "http://x/b.png"]).unwrap();
        let ids: Vec<_> = batch.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a.png", "b.png"]);
    }

    #[test]
    fn test_batch_from_urls_distinct_ids() {
        let batch = Batch::from_urls([
            "http://x/a.png",
            "http://y/a.png",
            "http://x/a.png",
        ])
        .unwrap();
        let ids: Vec<_> = batch.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a.png", "a.png#2", "a.png#3"]);
        assert_eq!(batch.items()[2].url.as_str(), "http://x/a.png");
    }

    #[test]
    fn test_batch_id_display() {
        assert_eq!(BatchId(7).to_string(), "batch-7");
    }
}
