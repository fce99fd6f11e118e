//! # Ports Layer
//!
//! Inbound (driving) APIs and outbound (driven) dependencies.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
