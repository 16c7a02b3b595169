//! The now-playing session task.
//!
//! One spawned task owns the whole mutable state: current track, transport
//! state, cover pipeline and the platform sink. Everything else talks to it
//! through a cloneable [`SessionHandle`], so no lock ever guards the
//! session or the cover cache.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use npcovers::{ArtPipeline, ArtSource, CoverImage, FetchOutcome, PipelineConfig, Resolution};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::{self, KeyAction, MediaKey, TransportCommand};
use crate::errors::SessionError;
use crate::events::ControlEventBus;
use crate::model::{
    ControlEvent, NowPlayingUpdate, PlaybackSnapshot, RenderPayload, RenderedState, TrackMetadata,
};
use crate::sink::SessionSink;

/// Commands sent to the session task.
#[derive(Debug)]
enum SessionCommand {
    Update(NowPlayingUpdate),
    Transport(TransportCommand),
    Release,
}

/// Handle to the spawned session task.
pub struct NowPlayingSession {
    join_handle: JoinHandle<()>,
}

impl NowPlayingSession {
    /// Spawns the session task: activates the sink, seeds a paused state at
    /// position zero, then serves commands and cover deliveries until
    /// released.
    pub fn spawn(
        sink: Box<dyn SessionSink>,
        source: Arc<dyn ArtSource>,
        config: PipelineConfig,
    ) -> (Self, SessionHandle) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let bus = ControlEventBus::new();
        let handle = SessionHandle {
            commands: tx,
            bus: bus.clone(),
        };

        let join_handle = tokio::spawn(async move {
            info!("Starting now-playing session");

            let mut state = SessionState::new(sink, source, config, outcome_tx, bus);
            state.activate();

            loop {
                tokio::select! {
                    command = rx.recv() => {
                        match command {
                            Some(command) => {
                                state.handle_command(command);
                                if state.shutdown {
                                    break;
                                }
                            }
                            // Every handle is gone, no command can arrive
                            None => break,
                        }
                    }
                    outcome = outcome_rx.recv() => {
                        match outcome {
                            Some(outcome) => state.handle_outcome(outcome),
                            None => break,
                        }
                    }
                }
            }

            state.teardown();
            info!("Now-playing session stopped");
        });

        (Self { join_handle }, handle)
    }

    /// Waits for the session task to finish.
    pub async fn wait(self) -> Result<()> {
        if let Err(err) = self.join_handle.await {
            if err.is_cancelled() {
                warn!("Session task cancelled: {err}");
                return Ok(());
            }
            return Err(anyhow!("Session task join error: {}", err));
        }
        Ok(())
    }
}

/// Cloneable entry point to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    bus: ControlEventBus,
}

impl SessionHandle {
    /// Pushes a "now playing" update from the external player.
    ///
    /// Numeric fields are validated here, synchronously; the update itself
    /// is applied by the session task.
    pub fn update_now_playing(&self, update: NowPlayingUpdate) -> Result<(), SessionError> {
        update.validate()?;
        self.send(SessionCommand::Update(update))
    }

    /// Feeds a transport command from a session controller callback.
    pub fn transport(&self, command: TransportCommand) -> Result<(), SessionError> {
        self.send(SessionCommand::Transport(command))
    }

    /// Feeds a notification or intent action string. Unknown actions are
    /// ignored.
    pub fn notification_action(&self, action: &str) -> Result<(), SessionError> {
        match bridge::translate_action(action) {
            Some(command) => self.send(SessionCommand::Transport(command)),
            None => {
                debug!("Ignoring unknown action {}", action);
                Ok(())
            }
        }
    }

    /// Feeds a hardware media key event. Key-up transitions are ignored.
    pub fn media_key(&self, key: MediaKey, action: KeyAction) -> Result<(), SessionError> {
        match bridge::translate_media_key(key, action) {
            Some(command) => self.send(SessionCommand::Transport(command)),
            None => Ok(()),
        }
    }

    /// Seek request from the session controller, position in milliseconds.
    pub fn seek(&self, position_ms: u64) -> Result<(), SessionError> {
        self.send(SessionCommand::Transport(TransportCommand::Seek { position_ms }))
    }

    /// Subscribes to the outbound control events.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<ControlEvent> {
        self.bus.subscribe()
    }

    /// Releases the session. Idempotent, safe to call on a session that
    /// already stopped.
    pub fn release(&self) {
        let _ = self.commands.send(SessionCommand::Release);
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::NotRunning)
    }
}

struct SessionState {
    sink: Box<dyn SessionSink>,
    pipeline: ArtPipeline,
    bus: ControlEventBus,
    metadata: TrackMetadata,
    playback: PlaybackSnapshot,
    /// Bitmap attached to the current track, if any
    cover: Option<CoverImage>,
    rendered: RenderedState,
    has_track: bool,
    shutdown: bool,
}

impl SessionState {
    fn new(
        sink: Box<dyn SessionSink>,
        source: Arc<dyn ArtSource>,
        config: PipelineConfig,
        outcomes: mpsc::UnboundedSender<FetchOutcome>,
        bus: ControlEventBus,
    ) -> Self {
        Self {
            sink,
            pipeline: ArtPipeline::new(source, config, outcomes),
            bus,
            metadata: TrackMetadata::default(),
            playback: PlaybackSnapshot::default(),
            cover: None,
            rendered: RenderedState::default(),
            has_track: false,
            shutdown: false,
        }
    }

    /// Activates the sink and seeds it with a paused state at position zero.
    fn activate(&mut self) {
        if let Err(err) = self.sink.activate() {
            warn!("Session sink activation failed: {}", err);
        }
        self.push_transport();
    }

    fn handle_command(&mut self, command: SessionCommand) {
        debug!(?command, "Session command");
        match command {
            SessionCommand::Update(update) => self.apply(update),
            SessionCommand::Transport(command) => self.execute(command),
            SessionCommand::Release => self.shutdown = true,
        }
    }

    /// Applies an inbound update: replaces the whole track state, then
    /// decides what the sink must be told.
    fn apply(&mut self, update: NowPlayingUpdate) {
        let metadata = TrackMetadata::from_update(&update);
        let playback = PlaybackSnapshot::from_update(&update);
        let art_changed = metadata.art_url != self.metadata.art_url;

        self.metadata = metadata;
        self.playback = playback;
        self.has_track = true;

        // Transport always goes out first, before any metadata work
        self.push_transport();

        match self.metadata.art_url.clone() {
            None => {
                self.cover = None;
                self.pipeline.resolve(None);
                self.render_current();
            }
            Some(_) if !art_changed && self.cover.is_some() => {
                // Same URL and the bitmap is at hand, plain re-render
                self.render_current();
            }
            Some(url) => {
                self.cover = None;
                match self.pipeline.resolve(Some(&url)) {
                    Resolution::Ready(cover) => {
                        self.cover = Some(cover);
                        self.render_current();
                    }
                    Resolution::Fetching | Resolution::Unchanged => {
                        // Metadata render is deferred until the fetch
                        // delivers; the sink keeps showing the previous
                        // track in the meantime
                    }
                    Resolution::Cleared => self.render_current(),
                }
            }
        }
    }

    /// Feeds a completed fetch back to the pipeline. On delivery the image
    /// is merged with whatever the metadata is now, not at request time.
    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        if let Some(cover) = self.pipeline.complete(outcome) {
            self.cover = Some(cover);
            self.render_current();
        }
    }

    /// Resolves and broadcasts a control command, then reflects play/pause
    /// optimistically without waiting for the player's next update.
    fn execute(&mut self, command: TransportCommand) {
        let event = bridge::resolve_command(command, self.playback.is_playing);
        debug!(action = event.action(), "Broadcasting control event");
        self.bus.broadcast(event.clone());

        match event {
            ControlEvent::Play => self.echo_playing(true),
            ControlEvent::Pause => self.echo_playing(false),
            _ => {}
        }
    }

    /// Optimistic transport echo: flips the playing flag, keeps the
    /// position, refreshes the toggle on the rendered surface.
    fn echo_playing(&mut self, is_playing: bool) {
        self.playback.is_playing = is_playing;
        self.push_transport();
        if self.has_track {
            self.render_current();
        }
    }

    fn push_transport(&mut self) {
        if let Err(err) = self.sink.update_transport(&self.playback) {
            warn!("Transport update failed: {}", err);
        }
    }

    fn render_current(&mut self) {
        let payload = RenderPayload {
            title: self.metadata.title.clone(),
            artist: self.metadata.artist.clone(),
            duration_ms: self.metadata.duration_ms,
            cover: self.cover.clone(),
            is_playing: self.playback.is_playing,
        };
        if let Err(err) = self.render(payload) {
            warn!("{}", err);
        }
    }

    fn render(&mut self, payload: RenderPayload) -> Result<(), SessionError> {
        if self.rendered.matches(&payload) {
            debug!("Skipping redundant render for '{}'", payload.title);
            return Ok(());
        }
        self.sink
            .render(&payload)
            .map_err(|err| SessionError::render(&err.to_string()))?;
        self.rendered.record(payload);
        Ok(())
    }

    /// Cancels any in-flight fetch, empties the cover cache and releases
    /// the sink session.
    fn teardown(&mut self) {
        debug!("Tearing down now-playing session");
        self.pipeline.clear();
        if let Err(err) = self.sink.release() {
            warn!("Session sink release failed: {}", err);
        }
    }
}
