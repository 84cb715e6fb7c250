//! Core types and trait definitions for the Strayline rescue engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod authority;
pub mod case;
pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod geo;
pub mod notification;
pub mod responder;
pub mod store;

pub use error::{Error, Result};
