//! External-service integrations used by HTTP routes.
//!
//! The hub shares nothing with these: they talk to third-party APIs and the
//! filesystem, and surface only through their own routes.

pub mod spotify;
