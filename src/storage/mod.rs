//! Storage module for compiled artifacts

pub mod artifacts;

pub use artifacts::{
    remove_if_exists, write_text, ArtifactConfig, ArtifactStore, StorageError,
};
