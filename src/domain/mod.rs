//! Domain Layer
//!
//! Read-model views, value objects and the ports the rest of the
//! application is wired through.

pub mod entities;
pub mod ports;
pub mod value_objects;
