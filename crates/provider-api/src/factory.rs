//! Provider factory and capability reporting.
//!
//! Given a [`ProviderKind`], the factory produces a matched media/messaging
//! backend pair and reports which optional capabilities that pair supports.
//! The coordinator uses the capability set to fail unsupported operations
//! fast, before touching any state.

use crate::error::BackendError;
use crate::events::ProviderEvent;
use crate::messaging::Messaging;
use crate::transport::MediaTransport;
use crate::types::ProviderKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Optional capabilities a provider pair may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Outbound transcoded stream push.
    pub stream_push: bool,
    /// Cross-channel media relay.
    pub media_relay: bool,
    /// Periodic per-participant volume reporting.
    pub volume_indicator: bool,
}

impl ProviderCapabilities {
    /// A pair supporting every optional capability.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            stream_push: true,
            media_relay: true,
            volume_indicator: true,
        }
    }

    /// A pair supporting none of the optional capabilities.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            stream_push: false,
            media_relay: false,
            volume_indicator: false,
        }
    }

    /// Enable or disable stream push support.
    #[must_use]
    pub const fn with_stream_push(mut self, supported: bool) -> Self {
        self.stream_push = supported;
        self
    }

    /// Enable or disable media relay support.
    #[must_use]
    pub const fn with_media_relay(mut self, supported: bool) -> Self {
        self.media_relay = supported;
        self
    }

    /// Enable or disable volume indicator support.
    #[must_use]
    pub const fn with_volume_indicator(mut self, supported: bool) -> Self {
        self.volume_indicator = supported;
        self
    }
}

/// A matched media/messaging backend pair produced by the factory.
#[derive(Clone)]
pub struct ProviderPair {
    /// The media transport backend.
    pub media: Arc<dyn MediaTransport>,
    /// The messaging backend.
    pub messaging: Arc<dyn Messaging>,
    /// Optional capabilities this pair supports.
    pub capabilities: ProviderCapabilities,
}

/// Produces provider backend pairs by kind.
///
/// The event sender is handed to the backends at construction; it is their
/// only path for reporting state changes back to the coordinator.
pub trait ProviderFactory: Send + Sync {
    /// Create the backend pair for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unsupported`] if no backend is registered
    /// for `kind`.
    fn create(
        &self,
        kind: &ProviderKind,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<ProviderPair, BackendError>;
}

/// Constructor closure for one registered provider.
type ProviderBuilder = Box<dyn Fn(mpsc::Sender<ProviderEvent>) -> ProviderPair + Send + Sync>;

/// Registry-backed factory mapping provider kinds to constructors.
///
/// Vendor binding crates register themselves at startup; the coordinator is
/// handed the populated factory as an explicit dependency (no process-wide
/// singleton).
#[derive(Default)]
pub struct StaticProviderFactory {
    builders: HashMap<ProviderKind, ProviderBuilder>,
}

impl StaticProviderFactory {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider constructor, replacing any previous registration
    /// for the same kind.
    pub fn register<F>(&mut self, kind: ProviderKind, builder: F)
    where
        F: Fn(mpsc::Sender<ProviderEvent>) -> ProviderPair + Send + Sync + 'static,
    {
        self.builders.insert(kind, Box::new(builder));
    }

    /// Kinds currently registered.
    #[must_use]
    pub fn registered_kinds(&self) -> Vec<ProviderKind> {
        self.builders.keys().cloned().collect()
    }
}

impl ProviderFactory for StaticProviderFactory {
    fn create(
        &self,
        kind: &ProviderKind,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<ProviderPair, BackendError> {
        let builder = self
            .builders
            .get(kind)
            .ok_or(BackendError::Unsupported("provider not registered"))?;
        Ok(builder(events))
    }
}
