//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Request / response headers
//!     → headers.rs (mask Authorization credentials)
//!     → log formatter (only masked values leave the process)
//! ```

pub mod headers;

pub use headers::{mask_value, MaskedHeaders, MASKED};
