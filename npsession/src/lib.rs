mod events;

pub mod bridge;
pub mod errors;
pub mod model;
pub mod session;
pub mod sink;

pub use bridge::{
    ACTION_NEXT, ACTION_PAUSE, ACTION_PLAY, ACTION_PREVIOUS, KeyAction, MediaKey,
    TransportCommand,
};
pub use errors::{SessionError, SinkError};
pub use model::{
    CONTROL_CENTER_EVENT, ControlCenterEvent, ControlEvent, NowPlayingUpdate, PlaybackSnapshot,
    RenderPayload, TrackMetadata, TransportState,
};
pub use session::{NowPlayingSession, SessionHandle};
pub use sink::SessionSink;
