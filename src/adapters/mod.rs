//! Adapters Layer
//!
//! Inbound adapters receive requests, outbound adapters implement the
//! domain ports against concrete infrastructure.

pub mod inbound;
pub mod outbound;
