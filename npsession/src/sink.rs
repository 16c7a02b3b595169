use crate::errors::SinkError;
use crate::model::{RenderPayload, TransportState};

/// Boundary to the platform media session and its notification.
///
/// Implementations are driven from the session task only, in this order:
/// `activate` once, then any interleaving of `update_transport` and
/// `render`, then `release`. `activate` and `release` must be idempotent.
///
/// `render` replaces the whole visible surface: track texts, cover art (or
/// none), and the play/pause toggle derived from `is_playing`. The flag
/// also tells the sink whether the notification must stay pinned (playing)
/// or become dismissible (paused). `update_transport` only refreshes the
/// playing flag and position and is expected to be cheap.
pub trait SessionSink: Send {
    fn activate(&mut self) -> Result<(), SinkError>;

    fn update_transport(&mut self, transport: &TransportState) -> Result<(), SinkError>;

    fn render(&mut self, payload: &RenderPayload) -> Result<(), SinkError>;

    fn release(&mut self) -> Result<(), SinkError>;
}
