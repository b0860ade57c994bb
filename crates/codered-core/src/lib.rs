//! Core types and trait definitions for the Code Red coordination service.
//!
//! Free of HTTP and database dependencies; every other crate in the
//! workspace builds on it.

pub mod assignment;
pub mod clock;
pub mod error;
pub mod event;
pub mod gateway;
pub mod pack;
pub mod projector;
pub mod role;
pub mod store;

pub use error::{Error, Result};
