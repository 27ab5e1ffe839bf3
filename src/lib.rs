//! Tally - a collaborative todo service with @mention support.
//!
//! The crate has two halves: the server side (`db` + `api`) persists todos,
//! tags, notes and mentions in SQLite and exposes them over HTTP, and the
//! client side (`sync`) keeps a local cache consistent with the server using
//! optimistic mutations that roll back on failure. `mentions` is the shared
//! text-scanning and resolution logic used by both halves.

pub mod api;
pub mod db;
pub mod export;
pub mod mentions;
pub mod models;
pub mod sync;
