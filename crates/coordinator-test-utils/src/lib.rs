//! # Coordinator Test Utilities
//!
//! Shared test utilities for the session coordinator.
//!
//! This crate provides mock provider backends and test fixtures for
//! isolated coordinator testing without any real vendor SDK.
//!
//! ## Modules
//!
//! - `mock_provider` - Scriptable media/messaging backend pair with call
//!   recording and per-operation failure injection
//! - `token_supply` - Token suppliers for renewal tests (static, flaky,
//!   always-failing)
//! - `fixtures` - Pre-built credentials, relay and push configurations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coordinator_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let provider = MockProvider::new();
//!     let handle = CoordinatorHandle::new(
//!         CoordinatorConfig::default(),
//!         provider.factory(),
//!         StaticTokenSupplier::shared("fresh-token"),
//!     );
//!
//!     handle.configure(MockProvider::kind(), test_credentials()).await.unwrap();
//!
//!     // Script a backend failure for the next join
//!     provider.media.fail("join_room");
//!
//!     // Inject provider events as if the vendor SDK raised them
//!     provider.emit(ProviderEvent::ActiveSpeaker(UserId::new("alice"))).await;
//! }
//! ```

pub mod fixtures;
pub mod mock_provider;
pub mod token_supply;

pub use fixtures::*;
pub use mock_provider::*;
pub use token_supply::*;
