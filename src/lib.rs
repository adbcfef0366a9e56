//! Differential synchronization of fantasy football records (scores, teams,
//! players) into a bucketed, file-backed key/value store.

pub mod config;
pub mod entities;
pub mod error;
pub mod sources;
pub mod store;
pub mod sync;
