//! Background completion of per-video metadata.
//!
//! The flat channel listing only carries ids and titles (dates, views and
//! durations are often missing).  After a video starts playing we fetch its
//! full metadata off the interactive path and hand the result back through
//! an mpsc channel; the owner of the catalog decides whether it still applies.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::catalog::{parse_item, VideoMetadata};
use crate::fetch::Fetcher;
use crate::ShuffleError;

/// Result of one enrichment, tagged with enough context to detect that the
/// catalog was replaced while the fetch was in flight.
#[derive(Debug, Clone)]
pub struct EnrichmentUpdate {
    pub locator: String,
    pub generation: u64,
    pub index: usize,
    pub url: String,
    pub metadata: VideoMetadata,
}

/// What to enrich.  Built by the session from its current catalog.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub locator: String,
    pub generation: u64,
    pub index: usize,
    pub url: String,
}

#[derive(Clone)]
pub struct MetadataEnricher {
    fetcher: Fetcher,
    delay: Duration,
    tx: mpsc::Sender<EnrichmentUpdate>,
}

impl MetadataEnricher {
    pub fn new(fetcher: Fetcher, delay: Duration, tx: mpsc::Sender<EnrichmentUpdate>) -> Self {
        Self { fetcher, delay, tx }
    }

    /// Fire-and-forget.  Failures are logged and dropped.
    pub fn enrich(&self, request: EnrichmentRequest) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Some(update) = this.run(request).await {
                if this.tx.send(update).await.is_err() {
                    debug!("enrich: receiver gone, dropping result");
                }
            }
        });
    }

    async fn run(&self, request: EnrichmentRequest) -> Option<EnrichmentUpdate> {
        debug!("enrich: fetching metadata for #{} in {:?}", request.index, self.delay);
        tokio::time::sleep(self.delay).await;

        let metadata = match self.fetcher.fetch_item(&request.url).await {
            Ok(data) => parse_item(&data),
            Err(e) => Err(e),
        };
        match metadata {
            Ok(metadata) => Some(EnrichmentUpdate {
                locator: request.locator,
                generation: request.generation,
                index: request.index,
                url: request.url,
                metadata,
            }),
            Err(e) => {
                let err = ShuffleError::Enrichment(format!("{}: {}", request.url, e));
                warn!("enrich: {}", err);
                None
            }
        }
    }
}
