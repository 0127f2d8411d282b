//! Tessera: sortable byte-array encodings and a typed, directed, edge-labeled
//! adjacency structure over an ordered key-value store.
//!
//! This crate is the storage-encoding core of a knowledge-graph engine. It
//! defines the binary invariants every higher layer depends on: byte ordering
//! that matches numeric/string ordering exactly, stable edge identity across
//! buffered and persisted representations, and deduplicated merged iteration
//! over in-memory and durable edge sets.

#![warn(missing_docs)]

pub mod bytes;
pub mod encoding;
pub mod error;
pub mod graph;
pub mod logging;
pub mod storage;

pub use bytes::ByteArray;
pub use error::{GraphError, Result};
