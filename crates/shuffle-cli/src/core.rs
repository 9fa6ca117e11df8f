//! ShuffleCore: single-owner event loop for the session.
//!
//! Every input arrives as a `ShuffleEvent` on one channel.  `ShuffleCore`
//! owns the `Session` exclusively; background tasks never touch it, they
//! only send events.

use std::time::Duration;

use shuffle_core::catalog::CatalogOrigin;
use shuffle_core::config::Config;
use shuffle_core::enrich::EnrichmentUpdate;
use shuffle_core::player;
use shuffle_core::session::Session;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::command::{self, Command, HELP};
use crate::render;

// ── ShuffleEvent ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ShuffleEvent {
    /// A line typed on stdin.
    Input(String),
    /// stdin reached EOF.
    InputClosed,
    /// Metadata for a played video came back.
    Enriched(EnrichmentUpdate),
    /// Result of one health probe: is the player socket answering?
    Health(bool),
}

// ── ShuffleCore ───────────────────────────────────────────────────────────────

pub struct ShuffleCore {
    session: Session,
    event_tx: mpsc::Sender<ShuffleEvent>,
    /// Last reported player health; `None` until the first probe.
    player_alive: Option<bool>,
    health_interval: Duration,
    probe_timeout: Duration,
    socket_path: std::path::PathBuf,
}

impl ShuffleCore {
    pub fn new(config: &Config, event_tx: mpsc::Sender<ShuffleEvent>) -> Self {
        // Enrichment results are forwarded into the main event channel.
        let (enrich_tx, mut enrich_rx) = mpsc::channel::<EnrichmentUpdate>(64);
        let forward_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(update) = enrich_rx.recv().await {
                if forward_tx.send(ShuffleEvent::Enriched(update)).await.is_err() {
                    break;
                }
            }
        });

        Self {
            session: Session::new(config, enrich_tx),
            event_tx,
            player_alive: None,
            health_interval: config.player.health_interval(),
            probe_timeout: Duration::from_millis(config.player.probe_timeout_ms),
            socket_path: config.player.socket_path.clone(),
        }
    }

    /// Run until `quit` or stdin closes.  `initial` is loaded first.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<ShuffleEvent>,
        initial: Option<(String, bool)>,
    ) -> anyhow::Result<()> {
        info!("ShuffleCore: starting event loop");
        self.spawn_stdin_reader();
        self.spawn_health_poll();

        if let Some((locator, refresh)) = initial {
            self.dispatch(Command::Load { locator, refresh }).await;
        }
        println!("type 'help' for commands");

        while let Some(evt) = event_rx.recv().await {
            match evt {
                ShuffleEvent::Input(line) => match command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => {
                        info!("ShuffleCore: quit requested");
                        break;
                    }
                    Ok(Some(cmd)) => self.dispatch(cmd).await,
                    Err(msg) => println!("{}", msg),
                },

                ShuffleEvent::InputClosed => {
                    info!("ShuffleCore: stdin closed, shutting down");
                    break;
                }

                ShuffleEvent::Enriched(update) => {
                    if self.session.apply_enrichment(update).await {
                        if let Some(now) = self.session.current() {
                            println!("  {}", render::meta_line(now.video));
                        }
                    }
                }

                ShuffleEvent::Health(alive) => self.set_player_health(alive),
            }
        }

        Ok(())
    }

    fn spawn_stdin_reader(&self) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let evt = match lines.next_line().await {
                    Ok(Some(line)) => ShuffleEvent::Input(line),
                    Ok(None) => ShuffleEvent::InputClosed,
                    Err(e) => {
                        warn!("ShuffleCore: stdin read error: {}", e);
                        ShuffleEvent::InputClosed
                    }
                };
                let closed = matches!(evt, ShuffleEvent::InputClosed);
                if tx.send(evt).await.is_err() || closed {
                    break;
                }
            }
        });
    }

    /// Probe the player socket on a fixed interval.  Only the probe result is
    /// sent back; the core decides whether it is a transition.
    fn spawn_health_poll(&self) {
        let tx = self.event_tx.clone();
        let socket_path = self.socket_path.clone();
        let interval = self.health_interval;
        let timeout = self.probe_timeout;
        tokio::spawn(async move {
            loop {
                let alive = player::probe(&socket_path, timeout).await;
                if tx.send(ShuffleEvent::Health(alive)).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    fn set_player_health(&mut self, alive: bool) {
        if self.player_alive == Some(alive) {
            return;
        }
        // Stay quiet about a player that was never started.
        if self.player_alive.is_some() || alive {
            println!("mpv: {}", if alive { "running" } else { "not running" });
        }
        debug!("ShuffleCore: player health {:?} → {}", self.player_alive, alive);
        self.player_alive = Some(alive);
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn dispatch(&mut self, cmd: Command) {
        debug!("ShuffleCore: command {:?}", cmd);
        if let Err(e) = self.handle_command(cmd).await {
            error!("ShuffleCore: command error: {}", e);
            println!("error: {}", e);
        }
    }

    async fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::Load { locator, refresh } => self.load(&locator, refresh).await?,
            Command::Next => {
                self.session.next().await?;
                self.show_current();
            }
            Command::Prev => match self.session.previous().await? {
                Some(_) => self.show_current(),
                None => println!("already at the first video"),
            },
            Command::Play => {
                self.session.play_current().await?;
                self.show_current();
            }
            Command::NewShuffle => {
                self.session.new_shuffle();
                println!("new shuffle started");
            }
            Command::Channels => self.list_channels(),
            Command::Status => self.status(),
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn load(&mut self, locator: &str, refresh: bool) -> anyhow::Result<()> {
        println!(
            "{} {}...",
            if refresh { "refreshing" } else { "loading" },
            locator
        );
        let outcome = self.session.load_source(locator, refresh).await?;
        let source = match outcome.origin {
            CatalogOrigin::Cache => "cache",
            CatalogOrigin::Fetched => "fetched",
        };
        println!(
            "{}: {} videos ({})",
            outcome.channel_name, outcome.video_count, source
        );
        if !outcome.warnings.is_empty() {
            println!("  ({} warning(s), see log)", outcome.warnings.len());
        }
        if outcome.resumed && !self.session.history().is_empty() {
            println!("resumed history:");
            self.show_current();
        }
        Ok(())
    }

    fn show_current(&self) {
        if let Some(now) = self.session.current() {
            println!("{}", render::now_playing(&now));
        }
    }

    fn status(&self) {
        match self.session.locator() {
            None => println!("no channel loaded"),
            Some(locator) => {
                println!("{} ({} videos)", locator, self.session.videos().len());
                match self.session.current() {
                    Some(now) => println!("{}", render::now_playing(&now)),
                    None => println!("nothing played yet"),
                }
            }
        }
        let health = match self.player_alive {
            Some(true) => "running",
            _ => "not running",
        };
        println!("mpv: {}", health);
    }

    fn list_channels(&self) {
        let channels = self.session.channels();
        if channels.is_empty() {
            println!("no channels yet");
            return;
        }
        let current = self.session.locator();
        for (locator, state) in channels {
            let marker = if Some(locator) == current { '*' } else { ' ' };
            println!(
                "{} {}  ({} played, last {})",
                marker,
                locator,
                state.history.len(),
                state.last_used.format("%Y-%m-%d %H:%M")
            );
        }
    }
}
