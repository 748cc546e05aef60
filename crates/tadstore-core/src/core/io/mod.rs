//! Provides input functionality for the region document format.
//!
//! The upstream modelling pipeline emits one JSON document per genomic
//! region. This module decodes those documents into the typed model of
//! [`crate::core::models`], validating the fields the indexer depends on and
//! preserving the opaque provenance blobs verbatim.

pub mod json;
