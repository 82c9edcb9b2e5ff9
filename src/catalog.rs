//! The catalog flow: fetch one remote XML document, persist it, read it
//! back from the same path.
//!
//! The document is opaque to this crate; parsing it is up to the host.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferry::catalog::CatalogSource;
//! use ferry::orchestrator::EngineBuilder;
//! use ferry::storage::FsArtifactWriter;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ferry::Error> {
//! let engine = EngineBuilder::new().spawn()?;
//! let catalog = CatalogSource::remote_default("data/model.xml")?;
//!
//! if let Some(xml) = catalog.refresh(&engine, &FsArtifactWriter::new()).await? {
//!     println!("{} bytes of catalog", xml.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::item::{Batch, Item, ItemState, Phase};
use crate::orchestrator::EngineHandle;
use crate::storage::ArtifactWriter;

use bytes::Bytes;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the image catalog is published.
pub const CATALOG_URL: &str = "https://developer.blackberry.com/cascades/images/model.xml";

/// Item id of the catalog download.
pub const CATALOG_ID: &str = "model.xml";

/// Default location of the persisted catalog, relative to the working
/// directory.
pub const DEFAULT_CATALOG_PATH: &str = "data/model.xml";

/// A remote catalog and the file it is persisted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSource {
    url: Url,
    path: PathBuf,
}

impl CatalogSource {
    pub fn new(url: Url, path: impl AsRef<Path>) -> Self {
        Self {
            url,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The published catalog, persisted at `path`.
    pub fn remote_default(path: impl AsRef<Path>) -> Result<Self> {
        let url = Url::parse(CATALOG_URL).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(url, path))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The single path the catalog is written to and read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The download item, persisting to [`CatalogSource::path`].
    pub fn item(&self) -> Item {
        Item::new(CATALOG_ID, &self.url).with_destination(&self.path)
    }

    pub fn batch(&self) -> Batch {
        Batch::new(vec![self.item()])
    }

    /// Read the last persisted payload.
    pub async fn read_persisted(&self, writer: &dyn ArtifactWriter) -> Result<Bytes> {
        Ok(writer.read(&self.path).await?)
    }

    /// Download and persist the catalog, then read it back.
    ///
    /// Returns `None` when the download did not complete; the item's final
    /// record then says why.
    pub async fn refresh(
        &self,
        engine: &EngineHandle,
        writer: &dyn ArtifactWriter,
    ) -> Result<Option<Bytes>> {
        let states = engine.download(self.batch()).await?;
        match states.iter().find(|s| s.id == CATALOG_ID) {
            Some(ItemState {
                phase: Phase::Done, ..
            }) => {
                debug!("Catalog persisted to {:?}", self.path);
                self.read_persisted(writer).await.map(Some)
            }
            Some(state) => {
                warn!(
                    "Catalog download ended {} ({:?})",
                    state.phase, state.last_error_kind
                );
                Ok(None)
            }
            None => Err(Error::Internal("catalog item missing from snapshot".into())),
        }
    }
}
