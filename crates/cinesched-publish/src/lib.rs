//! Schedule artifact publishing for cinesched.
//!
//! Writes the validated schedule as one JSON document, swapped in
//! atomically so readers only ever see a complete artifact, and reads the
//! previously published one back for status and audit.

/// Artifact document shapes.
pub mod artifact;
mod error;
mod paths;
mod store;

pub use artifact::{Audit, LoadedArtifact};
pub use error::PublishError;
pub use paths::{BaseDir, resolve_path};
pub use store::{ArtifactStore, PublishReceipt};
