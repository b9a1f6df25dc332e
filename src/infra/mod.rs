//! Infrastructure layer
//!
//! Handles host filesystem inspection. Nothing here writes to the host.

pub mod filesystem;
pub mod resolve;
