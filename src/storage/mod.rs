//! Storage: the artifact writer used for persisted payloads.

pub mod writer;

pub use writer::{ArtifactWriter, FsArtifactWriter, WriteError};
