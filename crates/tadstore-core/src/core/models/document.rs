use super::cluster::ClusterSet;
use super::model::StructureModel;

/// The descriptive metadata of one region document.
///
/// These fields come from the document's `object` block. `uuid` and
/// `resolution` identify the document and its partition key and are required
/// by the parser; the remaining descriptive fields default to empty values
/// when the producer omitted them, since they are only carried into the
/// set-once attributes of a resolution group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectData {
    /// Unique identifier of this region document; the region key in the store.
    pub uuid: String,
    pub title: String,
    pub experiment_type: String,
    pub species: String,
    pub project: String,
    pub identifier: String,
    /// Genome assembly accession the models were computed against.
    pub assembly: String,
    pub cell_type: String,
    /// Genomic bin size in base pairs per bead; the store's partition key.
    pub resolution: u32,
    pub datatype: String,
    /// Number of components in the modelling run.
    pub components: u32,
    pub source: String,
    /// Chromosome of the modelled interval.
    pub chromosome: String,
    /// Interval start, in base pairs.
    pub start: u64,
    /// Interval end, in base pairs.
    pub end: u64,
    /// Upstream dependency list, preserved verbatim as JSON text.
    pub dependencies: Option<String>,
}

/// One fully parsed and validated region document.
///
/// This is the in-memory form of a single JSON file emitted by the upstream
/// modelling pipeline: the object metadata, the simulated structures, the
/// cluster membership sets, and the opaque provenance blobs that are carried
/// into the store untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDocument {
    pub object: ObjectData,
    pub models: Vec<StructureModel>,
    pub clusters: ClusterSet,
    /// Dataset-level metadata blob, preserved verbatim as JSON text.
    pub metadata: Option<String>,
    /// Centroid coordinates blob, preserved verbatim as JSON text.
    pub centroids: Option<String>,
    /// Restraints blob, preserved verbatim as JSON text.
    pub restraints: Option<String>,
    /// Optional contact-map blob, preserved verbatim as JSON text.
    pub hic_data: Option<String>,
}

impl RegionDocument {
    /// The largest bead count across this document's models.
    pub fn max_bead_count(&self) -> usize {
        self.models
            .iter()
            .map(StructureModel::bead_count)
            .max()
            .unwrap_or(0)
    }
}
