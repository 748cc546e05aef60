//! # TADstore Core Library
//!
//! An incremental indexer for 3D genome structure models: it folds per-region
//! JSON documents produced by Hi-C modelling pipelines into one growing,
//! randomly-addressable binary store keyed by resolution and genomic region.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains the stateless data model for
//!   region documents (`RegionDocument`, `StructureModel`, `ClusterSet`), the
//!   JSON record parser, and the pure coordinate packer that turns
//!   variable-length coordinate lists into fixed-width row blocks.
//!
//! - **[`store`]: The Stateful Core.** Owns the on-disk layout of the model
//!   store: one binary file holding per-resolution coordinate tables, the
//!   region bookkeeping tables, and the set-once group attributes. All
//!   resize/append logic and crash-consistency rules live here.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties `core` and `store` together into the batch indexing run that
//!   callers invoke once per incoming archive of region documents.

pub mod core;
pub mod store;
pub mod workflows;
