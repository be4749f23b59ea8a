//! Parallel scoring: one hub, many spokes.
//!
//! The hub ([`MatchHub`]) partitions the current records, launches one
//! spoke per partition through a [`SpokeLauncher`], streams each spoke its
//! inputs and collects the similarity candidates it reports. Spokes share
//! no memory with the hub or each other; everything crosses a transport.
//!
//! ## Protocol
//!
//! Ordered and reliable, one transport per spoke:
//!
//! 1. hub → spoke: non-empty batches of current or next records
//! 2. hub → spoke: one end-of-input frame (both lists empty) with the
//!    threshold and property cap
//! 3. spoke → hub: progress `info` frames and one match frame per pair at
//!    or above the threshold
//! 4. spoke → hub: `{"finished": true}`
//!
//! Every send waits until the transport has accepted the frame.

pub mod coordinator;
pub mod launcher;
pub mod messages;
pub mod spoke;
pub mod transport;

pub use coordinator::MatchHub;
pub use launcher::{
    InProcessLauncher, ProcessLauncher, SpokeConnection, SpokeHandle, SpokeLauncher,
    DEFAULT_CHANNEL_CAPACITY, SPOKE_SUBCOMMAND,
};
pub use messages::{RequestKind, ScoringParams, SpokeRequest, SpokeResponse};
pub use spoke::{run_spoke, SpokeSummary};
pub use transport::{
    channel, ChannelSink, ChannelSource, FrameSink, FrameSource, LineSink, LineSource,
    TransportError,
};
