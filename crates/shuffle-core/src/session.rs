//! The single owner of catalog, history and current channel.
//!
//! Every navigation is computed first, the player is told to load the chosen
//! video, and only then is the move committed and persisted.  A failed
//! playback command therefore leaves history exactly as it was.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::{normalize_locator, CatalogCache, CatalogOrigin, VideoRecord};
use crate::config::Config;
use crate::enrich::{EnrichmentRequest, EnrichmentUpdate, MetadataEnricher};
use crate::fetch::Fetcher;
use crate::history::ShuffleHistory;
use crate::player::PlayerController;
use crate::state::{ChannelState, StateDocument, StateStore};
use crate::{Result, ShuffleError};

#[derive(Debug)]
pub struct LoadOutcome {
    pub locator: String,
    pub channel_name: String,
    pub video_count: usize,
    pub origin: CatalogOrigin,
    /// Saved history was picked up again.
    pub resumed: bool,
    /// Recoverable problems (corrupt cache, failed cache write), already logged.
    pub warnings: Vec<ShuffleError>,
}

/// The video under the cursor.
#[derive(Debug, Clone, Copy)]
pub struct NowPlaying<'a> {
    pub index: usize,
    /// 1-based position in history.
    pub position: usize,
    pub history_len: usize,
    pub video: &'a VideoRecord,
}

pub struct Session {
    cache: CatalogCache,
    store: StateStore,
    player: PlayerController,
    enricher: MetadataEnricher,
    states: StateDocument,
    locator: Option<String>,
    videos: Vec<VideoRecord>,
    history: ShuffleHistory,
    /// Bumped whenever `videos` is replaced; stale enrichment results carry
    /// an older value.
    generation: u64,
}

impl Session {
    /// Build a session from config and read the state document.  Enrichment
    /// results are delivered on `enrich_tx`; feed them back through
    /// [`Session::apply_enrichment`].
    pub fn new(config: &Config, enrich_tx: mpsc::Sender<EnrichmentUpdate>) -> Self {
        let fetcher = Fetcher::from_config(&config.fetch);
        let enricher = MetadataEnricher::new(
            fetcher.clone(),
            Duration::from_millis(config.enrich.delay_ms),
            enrich_tx,
        );
        let store = StateStore::new(config.paths.state_file.clone());
        let states = store.load();

        Self {
            cache: CatalogCache::new(config.paths.cache_dir.clone(), fetcher),
            store,
            player: PlayerController::new(&config.player),
            enricher,
            states,
            locator: None,
            videos: Vec::new(),
            history: ShuffleHistory::new(),
            generation: 0,
        }
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn history(&self) -> &ShuffleHistory {
        &self.history
    }

    pub fn player(&mut self) -> &mut PlayerController {
        &mut self.player
    }

    /// Known channels, most recently used first.
    pub fn channels(&self) -> Vec<(&str, &ChannelState)> {
        let mut list: Vec<_> = self
            .states
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        list.sort_by(|a, b| b.1.last_used.cmp(&a.1.last_used));
        list
    }

    pub fn current(&self) -> Option<NowPlaying<'_>> {
        let index = self.history.current()?;
        let video = self.videos.get(index)?;
        Some(NowPlaying {
            index,
            position: self.history.position() as usize + 1,
            history_len: self.history.len(),
            video,
        })
    }

    /// Switch to (or reload) a channel.
    ///
    /// Resumes saved history unless `force_refresh` is set, in which case the
    /// catalog is refetched and history starts over.  Nothing changes if the
    /// catalog cannot be resolved.
    pub async fn load_source(&mut self, input: &str, force_refresh: bool) -> Result<LoadOutcome> {
        let locator = normalize_locator(input)?;

        if let Some(previous) = self.locator.as_deref() {
            if previous != locator {
                info!("session: switching from {} to {}", previous, locator);
                self.persist();
            }
        }

        let resolution = self.cache.resolve(&locator, force_refresh).await?;
        for w in &resolution.warnings {
            warn!("session: {}", w);
        }

        self.videos = resolution.videos;
        self.generation += 1;
        self.locator = Some(locator.clone());

        let saved = if force_refresh {
            None
        } else {
            self.states.get(&locator)
        };
        let resumed = saved.is_some();
        self.history = match saved {
            Some(state) => state.to_history(self.videos.len()),
            None => ShuffleHistory::new(),
        };
        if resumed {
            info!("session: resuming with {} videos in history", self.history.len());
        } else if force_refresh {
            info!("session: forced refresh, history cleared");
        }
        self.persist();

        Ok(LoadOutcome {
            channel_name: self
                .videos
                .first()
                .map(|v| v.channel_name.clone())
                .unwrap_or_default(),
            video_count: self.videos.len(),
            locator,
            origin: resolution.origin,
            resumed,
            warnings: resolution.warnings,
        })
    }

    /// Move forward: replay the next entry or draw a new random video.
    /// Returns the catalog index now playing.
    pub async fn next(&mut self) -> Result<usize> {
        if self.locator.is_none() {
            return Err(ShuffleError::NoSource);
        }
        let step = self
            .history
            .plan_advance(self.videos.len(), &mut rand::thread_rng())?;
        let index = step.index();

        self.play_index(index).await?;
        self.history.apply(step);
        debug!("session: now at {} / {}", self.history.position() + 1, self.history.len());
        self.persist();
        Ok(index)
    }

    /// Step back in history.  `Ok(None)` when already at the first entry.
    pub async fn previous(&mut self) -> Result<Option<usize>> {
        if self.locator.is_none() {
            return Err(ShuffleError::NoSource);
        }
        let Some(position) = self.history.plan_retreat() else {
            return Ok(None);
        };
        let index = self.history.entries()[position];

        self.play_index(index).await?;
        self.history.set_cursor(position);
        self.persist();
        Ok(Some(index))
    }

    /// Reload the video under the cursor without moving.
    pub async fn play_current(&mut self) -> Result<usize> {
        let index = self
            .history
            .current()
            .ok_or_else(|| ShuffleError::Validation("No video to play".to_string()))?;
        self.play_index(index).await?;
        Ok(index)
    }

    /// Forget this channel's history and start a fresh shuffle.
    pub fn new_shuffle(&mut self) {
        self.history.reset();
        info!("session: new shuffle started");
        self.persist();
    }

    async fn play_index(&mut self, index: usize) -> Result<()> {
        let (url, title) = {
            let video = self.videos.get(index).ok_or(ShuffleError::EmptyCatalog)?;
            (video.url.clone(), video.title.clone())
        };
        self.player.load_and_play(&url).await?;
        info!("session: playing {}", title);

        if let Some(locator) = &self.locator {
            self.enricher.enrich(EnrichmentRequest {
                locator: locator.clone(),
                generation: self.generation,
                index,
                url,
            });
        }
        Ok(())
    }

    /// Merge a finished enrichment into the catalog if it still applies.
    /// Returns true when the merged video is the one under the cursor, so
    /// the display should refresh.
    pub async fn apply_enrichment(&mut self, update: EnrichmentUpdate) -> bool {
        if self.locator.as_deref() != Some(update.locator.as_str())
            || self.generation != update.generation
        {
            debug!("session: dropping enrichment for replaced catalog");
            return false;
        }
        let Some(video) = self.videos.get_mut(update.index) else {
            debug!("session: dropping enrichment for out-of-range #{}", update.index);
            return false;
        };
        if video.url != update.url {
            debug!("session: dropping enrichment, #{} is now a different video", update.index);
            return false;
        }

        video.merge(&update.metadata);
        info!("session: updated metadata for {}", video.title);

        if let Err(e) = self.cache.store(&update.locator, &self.videos).await {
            warn!("session: could not update cache: {}", e);
        }
        self.history.current() == Some(update.index)
    }

    /// Snapshot the current channel into the state document and save it.
    /// Failures are logged; the in-memory state stays authoritative.
    fn persist(&mut self) {
        let Some(locator) = &self.locator else {
            return;
        };
        self.states
            .insert(locator.clone(), ChannelState::snapshot(&self.history));
        if let Err(e) = self.store.save(&self.states) {
            warn!("session: error saving states: {}", e);
        }
    }
}
