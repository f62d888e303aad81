//! Common value types shared by the order book crates

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod types;

pub use types::*;
