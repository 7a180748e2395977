//! # certify-id
//!
//! Typed identifiers for issued certificates and HTTP requests.
//!
//! ## ID Format
//!
//! Every ID uses a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `cert_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `req_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//!
//! The ULID half carries a millisecond timestamp plus 80 random bits, so two
//! IDs minted in the same millisecond still differ. The whole string only uses
//! `[a-z0-9_]` and Crockford base32, which keeps it safe as a file name stem.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
