//! Shuffled playback over a YouTube channel's uploads.
//!
//! ```text
//!   locator ──► CatalogCache::resolve ──► Session (catalog + ShuffleHistory)
//!                                             │
//!                 StateStore::save ◄──────────┤ every navigation
//!                                             │
//!          PlayerController::load_and_play ◄──┤
//!                                             │
//!              MetadataEnricher::enrich ──────┘ ─► EnrichmentUpdate (mpsc)
//!                                                   └─► Session::apply_enrichment
//! ```

pub mod catalog;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod history;
pub mod platform;
pub mod player;
pub mod session;
pub mod state;

pub use error::{Result, ShuffleError};
