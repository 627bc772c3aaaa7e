//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use them for
//! every sensitive value the coordinator touches: provider app certificates,
//! join/login tokens, and renewal tokens.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` and contains a secret gets safe logging behavior for
//! free. Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use provider_api::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credentials {
//!     app_id: String,
//!     app_certificate: SecretString,
//! }
//!
//! let creds = Credentials {
//!     app_id: "app-123".to_string(),
//!     app_certificate: SecretString::from("cert-value"),
//! };
//!
//! // Debug output redacts the certificate.
//! let debug = format!("{creds:?}");
//! assert!(!debug.contains("cert-value"));
//!
//! // Access requires an explicit expose_secret() call.
//! assert_eq!(creds.app_certificate.expose_secret(), "cert-value");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
