//! Types shared between the toadbox crates.

pub mod errors;

pub use errors::{ToadboxError, ToadboxResult};
