//! # lovewall-store
//!
//! Flat-file storage for the love wall: confession messages and photo album
//! entries persisted as pretty-printed JSON arrays, plus the upload directory
//! holding the photos themselves.
//!
//! Each collection is rewritten in full on every mutation. [`RecordStore`]
//! serializes its mutations behind a single async mutex so concurrent
//! requests inside one process cannot lose each other's updates.

pub mod collection;
pub mod images;
pub mod models;
pub mod records;

mod error;

pub use collection::JsonCollection;
pub use error::{Result, StoreError};
pub use images::ImageStore;
pub use models::*;
pub use records::RecordStore;
