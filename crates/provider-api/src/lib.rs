//! Capability interfaces for pluggable RTC/RTM provider backends.
//!
//! Every vendor backend plugs into the session coordinator through two
//! capability traits:
//!
//! - [`MediaTransport`] - real-time media: room join/leave, mute, volume
//!   channels, volume indication, stream push, and cross-channel media relay
//! - [`Messaging`] - real-time messaging: login, channels, peer/channel
//!   messages, attributes, and presence
//!
//! Backends never mutate coordinator state directly. They report changes
//! exclusively through [`events::ProviderEvent`] values sent into the event
//! channel handed over at construction time.
//!
//! # Modules
//!
//! - [`error`] - `BackendError`, the wrapped provider failure type
//! - [`events`] - event types backends emit toward the coordinator
//! - [`factory`] - provider factory and capability reporting
//! - [`messaging`] - the `Messaging` capability trait
//! - [`secret`] - secret types that prevent accidental logging
//! - [`token_supply`] - the external token-minting collaborator interface
//! - [`transport`] - the `MediaTransport` capability trait
//! - [`types`] - identifiers and wire-level configuration shared by both traits

pub mod error;
pub mod events;
pub mod factory;
pub mod messaging;
pub mod secret;
pub mod token_supply;
pub mod transport;
pub mod types;

pub use error::BackendError;
pub use events::ProviderEvent;
pub use factory::{ProviderCapabilities, ProviderFactory, ProviderPair, StaticProviderFactory};
pub use messaging::Messaging;
pub use token_supply::{TokenSupplier, TokenSupplyError};
pub use transport::MediaTransport;
pub use types::{
    ChannelKind, ConnectionChange, LayoutRegion, MediaRelayConfig, ProviderCredentials,
    ProviderKind, RelayChannel, RoomId, StreamLayout, StreamPushConfig, UserId, UserRole,
    VolumeSample,
};
