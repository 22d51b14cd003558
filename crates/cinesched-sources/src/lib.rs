//! Cinema listing extractors for cinesched.
//!
//! Each cinema publishes its programme in its own shape (JSON API, HTML
//! page, XML feed). The extractors here fetch and parse those into
//! `RawListing` values; normalization happens in `cinesched-core`.

mod client;
mod extractor;
mod rate_limiter;
mod runner;
mod sources;

pub use client::{SourceClient, SourceClientBuilder};
pub use extractor::{
    DEFAULT_DAYS_AHEAD, Extractor, LocalExtractor, SourceExtractor, SourceSettings,
    build_extractor, default_url,
};
pub use runner::extract_all;
pub use sources::{
    BfiImaxExtractor, CurzonExtractor, EverymanExtractor, OdeonExtractor, PicturehouseExtractor,
};
