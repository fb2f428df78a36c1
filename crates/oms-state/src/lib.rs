//! oms-state: embedded state store for OMS.
//!
//! Backed by [redb](https://docs.rs/redb), persists uploaded package blobs,
//! their metadata records, and config entries.
//!
//! # Architecture
//!
//! Package tables are keyed by monotonically increasing `u64` ids allocated
//! inside the inserting write transaction; config entries are keyed by their
//! string key. Records and config entries are JSON-serialized into `&[u8]`
//! columns; package payloads are stored as raw bytes.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Config values are read through the
//! [`ConfigLookup`] trait so callers can layer static settings over the store.

pub mod error;
pub mod lookup;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use lookup::{ChainedLookup, ConfigLookup, StaticConfig};
pub use store::StateStore;
pub use types::*;
