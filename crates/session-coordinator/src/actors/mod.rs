//! Actor implementation of the session coordinator.
//!
//! One `CoordinatorActor` per coordinator instance owns all mutable state;
//! the cloneable `CoordinatorHandle` is the only way in.

pub mod coordinator;
pub mod messages;
pub mod metrics;

pub use coordinator::CoordinatorHandle;
pub use messages::{CoordinatorMessage, CoordinatorStatus, OpResource};
pub use metrics::{CoordinatorMetrics, MailboxLevel, MailboxMonitor};
