//! The store's bookkeeping: resolution groups, region entries, and extents.
//!
//! The directory is the bincode-serialized image of everything in the store
//! except the coordinate rows themselves. It is small relative to the data
//! region and is rewritten as a whole on every committed region; the
//! superblock pointer flips to the new copy only after the write completes.

use crate::core::models::document::RegionDocument;
use crate::core::pack::ModelAssignment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::StoreError;

/// JSON text stored for blobs the producing document omitted.
pub(crate) const ABSENT_BLOB: &str = "null";

/// The set-once attributes of a resolution group.
///
/// Written when the group is first created and never overwritten; later
/// documents arriving at the same resolution keep the first writer's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupAttrs {
    pub title: String,
    pub experiment_type: String,
    pub species: String,
    pub project: String,
    pub identifier: String,
    pub assembly: String,
    pub cell_type: String,
    pub resolution: u32,
    pub datatype: String,
    pub components: u32,
    pub source: String,
    /// Dataset-level metadata blob, verbatim JSON text.
    pub metadata: String,
    /// Upstream dependency list, verbatim JSON text.
    pub dependencies: String,
    /// Restraints blob, verbatim JSON text.
    pub restraints: String,
    /// Contact-map blob, verbatim JSON text, when the first document carried one.
    pub hic_data: Option<String>,
}

impl GroupAttrs {
    /// Collects the group attributes from the document creating the group.
    pub fn from_document(document: &RegionDocument) -> Self {
        let object = &document.object;
        Self {
            title: object.title.clone(),
            experiment_type: object.experiment_type.clone(),
            species: object.species.clone(),
            project: object.project.clone(),
            identifier: object.identifier.clone(),
            assembly: object.assembly.clone(),
            cell_type: object.cell_type.clone(),
            resolution: object.resolution,
            datatype: object.datatype.clone(),
            components: object.components,
            source: object.source.clone(),
            metadata: document
                .metadata
                .clone()
                .unwrap_or_else(|| ABSENT_BLOB.to_string()),
            dependencies: object
                .dependencies
                .clone()
                .unwrap_or_else(|| ABSENT_BLOB.to_string()),
            restraints: document
                .restraints
                .clone()
                .unwrap_or_else(|| ABSENT_BLOB.to_string()),
            hic_data: document.hic_data.clone(),
        }
    }
}

/// One contiguous run of coordinate rows in the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// File offset of the first row.
    pub offset: u64,
    /// Row index of the first row within the group's coordinate table.
    pub start_row: u64,
    /// Number of rows.
    pub rows: u64,
}

impl Extent {
    pub fn end_row(&self) -> u64 {
        self.start_row + self.rows
    }
}

/// The model-parameters entry for one indexed region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    /// First coordinate row belonging to this region.
    pub start_row: u64,
    /// One past the last coordinate row belonging to this region.
    pub end_row: u64,
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    /// Per-model reference ids and resolved cluster ids, in row order.
    pub models: Vec<ModelAssignment>,
}

impl RegionEntry {
    /// The half-open row range this region occupies in the coordinate table.
    pub fn rows(&self) -> std::ops::Range<u64> {
        self.start_row..self.end_row
    }
}

/// One resolution's on-disk subtree: coordinate-table bookkeeping plus the
/// three per-region metadata tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionGroup {
    pub attrs: GroupAttrs,
    /// Bead slots per coordinate row, fixed at group creation.
    pub slot_width: u32,
    /// Committed rows in the coordinate table; the next append range starts here.
    pub total_rows: u64,
    /// Where the committed rows live in the file, in row order.
    pub extents: Vec<Extent>,
    /// Model parameters per region, keyed by region uuid.
    pub model_params: BTreeMap<String, RegionEntry>,
    /// Raw cluster membership lists per region, keyed by region uuid.
    pub clusters: BTreeMap<String, Vec<Vec<u64>>>,
    /// Centroid blobs (verbatim JSON text) per region, keyed by region uuid.
    pub centroids: BTreeMap<String, String>,
}

impl ResolutionGroup {
    pub fn new(attrs: GroupAttrs, slot_width: u32) -> Self {
        Self {
            attrs,
            slot_width,
            total_rows: 0,
            extents: Vec::new(),
            model_params: BTreeMap::new(),
            clusters: BTreeMap::new(),
            centroids: BTreeMap::new(),
        }
    }

    /// The extent holding a given row, if the row is committed.
    pub fn extent_containing(&self, row: u64) -> Option<&Extent> {
        self.extents
            .iter()
            .find(|extent| extent.start_row <= row && row < extent.end_row())
    }
}

/// The complete bookkeeping image of a store file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    /// Resolution groups, keyed by resolution in base pairs per bead.
    pub groups: BTreeMap<u32, ResolutionGroup>,
}

impl Directory {
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes)
            .map_err(|e| StoreError::Corrupt(format!("directory decode failed: {e}")))
    }
}
