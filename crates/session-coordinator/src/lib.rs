//! Session Coordinator Library
//!
//! This library provides a provider-agnostic RTC session coordinator - a
//! stateful control layer between an application and interchangeable
//! media/messaging provider backends, responsible for:
//!
//! - Connection and session lifecycle (configure, login, join, leave)
//! - Audio settings with local snapshots and backend-first writes
//! - Proactive token renewal with bounded retry and backoff
//! - Volume detection aggregation and dominant-speaker tracking
//! - Media relay orchestration across destination channels
//! - Transcoded stream push with observable start/stop transitions
//!
//! # Architecture
//!
//! The coordinator uses a single-actor confinement model:
//!
//! ```text
//! CoordinatorHandle (cloneable, message-passing API)
//! └── CoordinatorActor (one per coordinator instance)
//!     ├── owns all session state
//!     ├── spawns long-running backend calls (epoch-guarded)
//!     └── spawns token renewal tasks (one per channel)
//! ```
//!
//! # Key Design Decisions
//!
//! - **All state on the actor loop**: mutation only via mailbox messages,
//!   so no locks and no torn snapshots
//! - **One in-flight operation per resource**: conflicting requests fail
//!   fast with `OperationInProgress`; teardowns supersede and cancel
//! - **Best-effort teardown**: leave/logout/stop never fail on backend
//!   errors, local cleanup always completes
//! - **Watch channels for hot state**: connection state and the volume
//!   view are published through `tokio::sync::watch`, slow readers miss
//!   intermediate values instead of stalling the actor
//!
//! # Modules
//!
//! - [`actors`] - Actor implementation, mailbox messages, metrics
//! - [`config`] - Coordinator configuration from environment
//! - [`errors`] - Error types with stable kind labels
//! - [`events`] - Broadcast event stream for subscribers
//! - [`relay`] - Media relay orchestration state machine
//! - [`state`] - Session, audio, volume, relay, and push state types
//! - [`stream_push`] - Stream push state machine
//! - [`tokens`] - Token renewal scheduling and retry
//! - [`volume`] - Volume aggregation and dominant-speaker detection

pub mod actors;
pub mod config;
pub mod errors;
pub mod events;
pub mod relay;
pub mod state;
pub mod stream_push;
pub mod tokens;
pub mod volume;

pub use actors::{CoordinatorHandle, CoordinatorStatus};
pub use config::CoordinatorConfig;
pub use errors::CoordinatorError;
pub use events::CoordinatorEvent;
pub use state::{
    AudioSettings, ConnectionState, MediaRelayState, RelayChannelState, RelayOverallState,
    StreamPushState, UserSession, UserVolumeInfo, VolumeDetectionConfig, VolumeView,
};
