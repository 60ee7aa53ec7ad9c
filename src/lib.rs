//! # vekto-core
//!
//! Embeddable vector database kernel: a storage backend, a pluggable
//! similarity index (exhaustive flat scan or an approximate HNSW graph),
//! an optional vector quantizer, and an optional snapshot persistence
//! manager, composed behind one [`VectorDatabase`] facade.
//!
//! This crate is the search-engine kernel only. The HTTP/REST surface,
//! CLI shell, metrics plumbing, embedding-model adapters, deployment
//! artifacts, auth and rate limiting are external collaborators that sit
//! on top of [`VectorDatabase`]'s operation set; none of that lives here.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use vekto_core::config::DatabaseConfig;
//! use vekto_core::VectorDatabase;
//!
//! let mut config = DatabaseConfig::default();
//! config.dimensions = 3;
//! let db = VectorDatabase::new(config);
//! db.init()?;
//!
//! let ids = db.insert(&[vec![1.0, 0.0, 0.0]], None)?;
//! let hits = db.search(&[0.9, 0.1, 0.0], 1)?;
//! assert_eq!(hits[0].id, ids[0]);
//! # Ok::<(), vekto_core::error::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod point;
pub mod quantizer;
pub mod storage;

pub use client::VectorDatabase;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use point::{SearchHit, VectorRecord};
