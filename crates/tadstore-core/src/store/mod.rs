//! # Store Module
//!
//! This module owns the on-disk model store: one binary file holding every
//! resolution group ever ingested, each with an append-only coordinate table,
//! three per-region bookkeeping tables (model parameters, clusters,
//! centroids), and a set of attributes fixed when the group is first created.
//!
//! ## Overview
//!
//! The store is a single-writer, append-only structure. Coordinate rows are
//! raw little-endian `f32` cells written into a data region that only ever
//! grows; all bookkeeping lives in a bincode-serialized directory written
//! after the data region and referenced from a fixed-size superblock at the
//! start of the file. Committing a region rewrites the directory and then
//! updates the superblock pointer, so the last committed directory is always
//! the source of truth - a crash mid-region leaves orphaned trailing bytes,
//! never a misattributed row.
//!
//! ## Architecture
//!
//! - **File Layout** ([`layout`]) - Magic, version, and the superblock
//! - **Bookkeeping** ([`directory`]) - Resolution groups, region entries,
//!   data extents, and set-once group attributes
//! - **Store Handle** ([`file`]) - Open/create, group management, staged
//!   appends, region commits, and the read-back API
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//!   for batch runs
//! - **Error Handling** ([`error`]) - Store-specific error types

pub mod directory;
pub mod error;
pub mod file;
pub mod layout;
pub mod progress;
