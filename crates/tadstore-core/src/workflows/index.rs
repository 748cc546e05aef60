use crate::core::io::json::DocumentError;
use crate::core::models::document::RegionDocument;
use crate::core::pack::{PackError, pack};
use crate::store::directory::{ABSENT_BLOB, GroupAttrs};
use crate::store::error::StoreError;
use crate::store::file::{ModelStore, RegionMetadata};
use crate::store::layout::DEFAULT_SLOT_WIDTH;
use crate::store::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("malformed region document: {0}")]
    Document(#[from] DocumentError),

    #[error("coordinate packing failed: {0}")]
    Pack(#[from] PackError),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("indexing aborted at '{path}': {source}")]
    Aborted { path: PathBuf, source: StoreError },

    #[error("all {} input document(s) failed to index", .failures.len())]
    AllInputsFailed { failures: Vec<FileFailure> },
}

/// One input file that could not be indexed, and why.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: IndexError,
}

/// Settings of one indexing run.
///
/// Everything has a sensible default; the pass-through identifiers exist so a
/// calling workflow can thread its own bookkeeping into the report without
/// the core interpreting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Bead slots per coordinate row for groups created by this run.
    pub default_slot_width: u32,
    /// Genome assembly accession, passed through to the report.
    pub assembly: Option<String>,
    /// Identifier of the originating archive, passed through to the report.
    pub source_file_id: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            default_slot_width: DEFAULT_SLOT_WIDTH,
            assembly: None,
            source_file_id: None,
        }
    }
}

impl IndexConfig {
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct IndexConfigBuilder {
    default_slot_width: Option<u32>,
    assembly: Option<String>,
    source_file_id: Option<String>,
}

impl IndexConfigBuilder {
    pub fn default_slot_width(mut self, slots: u32) -> Self {
        self.default_slot_width = Some(slots);
        self
    }
    pub fn assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }
    pub fn source_file_id(mut self, id: impl Into<String>) -> Self {
        self.source_file_id = Some(id.into());
        self
    }

    pub fn build(self) -> IndexConfig {
        IndexConfig {
            default_slot_width: self.default_slot_width.unwrap_or(DEFAULT_SLOT_WIDTH),
            assembly: self.assembly,
            source_file_id: self.source_file_id,
        }
    }
}

/// The outcome of one indexing run.
#[derive(Debug)]
pub struct IndexReport {
    /// The store file the run wrote into.
    pub store_path: PathBuf,
    /// Number of documents indexed successfully.
    pub indexed: usize,
    /// The documents that were skipped, in input order.
    pub failures: Vec<FileFailure>,
    /// Pass-through assembly accession from the configuration.
    pub assembly: Option<String>,
    /// Pass-through originating-archive identifier from the configuration.
    pub source_file_id: Option<String>,
}

impl IndexReport {
    /// Number of documents that failed.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether the run succeeded for some documents but not all.
    pub fn is_partial(&self) -> bool {
        self.indexed > 0 && !self.failures.is_empty()
    }
}

enum FileOutcome {
    /// The file is skipped and recorded; the batch continues.
    Skipped(IndexError),
    /// The store cannot accept any further region; the run stops.
    Fatal(StoreError),
}

/// Indexes a batch of region documents into one model store.
///
/// The store file is created when absent and appended to when present. Files
/// are processed strictly in the given order, each attempted exactly once:
/// a file that fails to parse, pack, or commit is recorded in the report and
/// the batch moves on. Only two situations end the run early: the store
/// itself cannot be opened, or a group cannot be created - in both cases no
/// further region could be written anyway.
///
/// # Errors
///
/// Returns [`IndexError::AllInputsFailed`] when every file of a non-empty
/// batch failed, [`IndexError::Store`] when the store cannot be opened, and
/// [`IndexError::Aborted`] when the run stopped at a group-level storage
/// failure. Partial failure is not an error; inspect
/// [`IndexReport::failures`] for per-file details.
#[instrument(skip_all, name = "index_workflow")]
pub fn run(
    store_path: &Path,
    documents: &[PathBuf],
    config: &IndexConfig,
    reporter: &ProgressReporter,
) -> Result<IndexReport, IndexError> {
    reporter.report(Progress::BatchStart {
        total_files: documents.len() as u64,
    });
    info!(
        "Indexing {} region document(s) into '{}'.",
        documents.len(),
        store_path.display()
    );

    let mut store = ModelStore::open_or_create(store_path)?;

    let mut indexed = 0usize;
    let mut failures = Vec::new();
    for path in documents {
        match index_one(&mut store, path, config) {
            Ok(resolution) => {
                indexed += 1;
                reporter.report(Progress::FileIndexed {
                    path: path.clone(),
                    resolution,
                });
            }
            Err(FileOutcome::Skipped(error)) => {
                warn!("Skipping '{}': {}", path.display(), error);
                reporter.report(Progress::FileSkipped {
                    path: path.clone(),
                    reason: error.to_string(),
                });
                failures.push(FileFailure {
                    path: path.clone(),
                    error,
                });
            }
            Err(FileOutcome::Fatal(source)) => {
                reporter.report(Progress::Message(format!(
                    "aborting run: {source}"
                )));
                return Err(IndexError::Aborted {
                    path: path.clone(),
                    source,
                });
            }
        }
    }

    if indexed == 0 && !documents.is_empty() {
        return Err(IndexError::AllInputsFailed { failures });
    }

    info!(
        "Indexing finished: {} succeeded, {} failed.",
        indexed,
        failures.len()
    );
    reporter.report(Progress::BatchFinish {
        indexed: indexed as u64,
        skipped: failures.len() as u64,
    });

    Ok(IndexReport {
        store_path: store_path.to_path_buf(),
        indexed,
        failures,
        assembly: config.assembly.clone(),
        source_file_id: config.source_file_id.clone(),
    })
}

fn index_one(
    store: &mut ModelStore,
    path: &Path,
    config: &IndexConfig,
) -> Result<u32, FileOutcome> {
    let document =
        RegionDocument::from_path(path).map_err(|e| FileOutcome::Skipped(e.into()))?;
    let resolution = document.object.resolution;

    // The group's width wins once the group exists; the configured default
    // only sizes groups this document creates.
    let slot_width = store
        .slot_width(resolution)
        .unwrap_or(config.default_slot_width);
    let (block, assignments) = pack(&document.models, &document.clusters, slot_width as usize)
        .map_err(|e| FileOutcome::Skipped(e.into()))?;

    let group = store
        .open_or_create_group(resolution, GroupAttrs::from_document(&document), slot_width)
        .map_err(FileOutcome::Fatal)?;

    let (start_row, end_row) = store
        .append(group, &block)
        .map_err(|e| FileOutcome::Skipped(e.into()))?;

    let object = document.object;
    store
        .write_region_metadata(
            group,
            RegionMetadata {
                region_id: object.uuid,
                start_row,
                end_row,
                chromosome: object.chromosome,
                start: object.start,
                end: object.end,
                models: assignments,
                clusters: document.clusters.members().to_vec(),
                centroids: document
                    .centroids
                    .unwrap_or_else(|| ABSENT_BLOB.to_string()),
            },
        )
        .map_err(|e| FileOutcome::Skipped(e.into()))?;

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Builds a valid region document; `models` is a list of
    /// `(reference, bead_count)` pairs.
    fn document_json(uuid: &str, resolution: u32, models: &[(u64, usize)]) -> String {
        let models_json = models
            .iter()
            .map(|(reference, beads)| {
                let coordinates = (0..beads * 3)
                    .map(|i| format!("{}.25", i % 9))
                    .collect::<Vec<_>>()
                    .join(",");
                format!(r#"{{"ref": {reference}, "data": [{coordinates}]}}"#)
            })
            .collect::<Vec<_>>()
            .join(",");

        format!(
            r#"{{
                "object": {{
                    "uuid": "{uuid}",
                    "title": "GM12878 models",
                    "experimentType": "Hi-C",
                    "species": "Homo sapiens",
                    "assembly": "GRCh38",
                    "resolution": {resolution},
                    "chrom": ["chr19"],
                    "chromStart": [400000],
                    "chromEnd": [500000]
                }},
                "metadata": {{"modelled_with": "TADbit"}},
                "models": [{models_json}],
                "clusters": [[0, 1], [2]],
                "centroids": [[0.0, 0.0, 0.0]],
                "restraints": {{}}
            }}"#
        )
    }

    fn write_documents(dir: &Path, documents: &[(&str, String)]) -> Vec<PathBuf> {
        documents
            .iter()
            .map(|(name, text)| {
                let path = dir.join(name);
                fs::write(&path, text).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn indexes_a_batch_and_reports_full_success() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", document_json("uuid-a", 10000, &[(0, 5), (1, 5)])),
                ("b.json", document_json("uuid-b", 10000, &[(0, 4)])),
            ],
        );

        let config = IndexConfig::builder().default_slot_width(8).build();
        let report = run(&store_path, &paths, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.failed(), 0);
        assert!(!report.is_partial());
        assert_eq!(report.store_path, store_path);

        let store = ModelStore::open(&store_path).unwrap();
        let group = store.group(10000).unwrap();
        assert_eq!(group.total_rows, 3);
        assert_eq!(group.model_params["uuid-a"].rows(), 0..2);
        assert_eq!(group.model_params["uuid-b"].rows(), 2..3);
        assert_eq!(group.attrs.assembly, "GRCh38");
        assert_eq!(group.attrs.metadata, r#"{"modelled_with": "TADbit"}"#);
    }

    #[test]
    fn two_regions_at_one_resolution_get_stacked_ranges() {
        // Fresh 10 kb group: region A has 2 models of 1000 triples each,
        // region B has 3 models; their ranges stack as [0,2) then [2,5).
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                (
                    "a.json",
                    document_json("uuid-a", 10000, &[(0, 1000), (1, 1000)]),
                ),
                (
                    "b.json",
                    document_json("uuid-b", 10000, &[(0, 900), (1, 950), (2, 1000)]),
                ),
            ],
        );

        let report = run(
            &store_path,
            &paths,
            &IndexConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.indexed, 2);

        let store = ModelStore::open(&store_path).unwrap();
        let group = store.group(10000).unwrap();
        assert_eq!(group.slot_width, 1000);
        assert_eq!(group.total_rows, 5);
        assert_eq!(group.model_params.len(), 2);
        assert_eq!(group.model_params["uuid-a"].rows(), 0..2);
        assert_eq!(group.model_params["uuid-b"].rows(), 2..5);
    }

    #[test]
    fn one_bad_file_out_of_five_is_recorded_not_fatal() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", document_json("uuid-a", 10000, &[(0, 3)])),
                ("b.json", document_json("uuid-b", 10000, &[(0, 3)])),
                ("broken.json", "{not valid json".to_string()),
                ("c.json", document_json("uuid-c", 10000, &[(0, 3)])),
                ("d.json", document_json("uuid-d", 10000, &[(0, 3)])),
            ],
        );

        let config = IndexConfig::builder().default_slot_width(4).build();
        let report = run(&store_path, &paths, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(report.indexed, 4);
        assert_eq!(report.failed(), 1);
        assert!(report.is_partial());
        assert!(report.failures[0].path.ends_with("broken.json"));
        assert!(matches!(
            report.failures[0].error,
            IndexError::Document(DocumentError::Json(_))
        ));

        let store = ModelStore::open(&store_path).unwrap();
        assert_eq!(store.group(10000).unwrap().total_rows, 4);
        assert_eq!(store.group(10000).unwrap().model_params.len(), 4);
    }

    #[test]
    fn a_fully_failed_batch_is_a_run_level_error() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", "".to_string()),
                ("b.json", "[1, 2, 3]".to_string()),
            ],
        );

        let err = run(
            &store_path,
            &paths,
            &IndexConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();

        assert!(matches!(
            &err,
            IndexError::AllInputsFailed { failures } if failures.len() == 2
        ));

        // The store file was created, but holds no regions.
        let store = ModelStore::open(&store_path).unwrap();
        assert_eq!(store.resolutions().count(), 0);
    }

    #[test]
    fn re_ingesting_a_region_is_recorded_as_a_duplicate() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", document_json("uuid-a", 10000, &[(0, 3)])),
                ("a-again.json", document_json("uuid-a", 10000, &[(0, 3)])),
            ],
        );

        let config = IndexConfig::builder().default_slot_width(4).build();
        let report = run(&store_path, &paths, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.failures[0].error,
            IndexError::Store(StoreError::DuplicateRegion { .. })
        ));

        let store = ModelStore::open(&store_path).unwrap();
        assert_eq!(store.group(10000).unwrap().total_rows, 1);
    }

    #[test]
    fn an_oversized_model_is_recorded_and_skipped() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", document_json("uuid-a", 10000, &[(0, 2)])),
                // The group now stores 4-slot rows; 6 beads cannot fit.
                ("b.json", document_json("uuid-b", 10000, &[(0, 6)])),
            ],
        );

        let config = IndexConfig::builder().default_slot_width(4).build();
        let report = run(&store_path, &paths, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(report.indexed, 1);
        assert!(matches!(
            report.failures[0].error,
            IndexError::Pack(PackError::OversizedModel {
                reference: 0,
                beads: 6,
                slot_width: 4,
            })
        ));
    }

    #[test]
    fn a_second_run_appends_to_the_same_store() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let config = IndexConfig::builder().default_slot_width(4).build();

        let first = write_documents(
            dir.path(),
            &[("a.json", document_json("uuid-a", 10000, &[(0, 3), (1, 3)]))],
        );
        run(&store_path, &first, &config, &ProgressReporter::new()).unwrap();

        let second = write_documents(
            dir.path(),
            &[("b.json", document_json("uuid-b", 10000, &[(0, 2)]))],
        );
        run(&store_path, &second, &config, &ProgressReporter::new()).unwrap();

        let store = ModelStore::open(&store_path).unwrap();
        let group = store.group(10000).unwrap();
        assert_eq!(group.total_rows, 3);
        assert_eq!(group.model_params["uuid-a"].rows(), 0..2);
        assert_eq!(group.model_params["uuid-b"].rows(), 2..3);
    }

    #[test]
    fn documents_at_different_resolutions_get_separate_groups() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", document_json("uuid-a", 10000, &[(0, 3)])),
                ("b.json", document_json("uuid-b", 50000, &[(0, 3)])),
            ],
        );

        let config = IndexConfig::builder().default_slot_width(4).build();
        run(&store_path, &paths, &config, &ProgressReporter::new()).unwrap();

        let store = ModelStore::open(&store_path).unwrap();
        assert_eq!(store.resolutions().collect::<Vec<_>>(), vec![10000, 50000]);
        assert_eq!(store.group(10000).unwrap().total_rows, 1);
        assert_eq!(store.group(50000).unwrap().total_rows, 1);
    }

    #[test]
    fn an_empty_batch_succeeds_with_an_empty_report() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");

        let report = run(
            &store_path,
            &[],
            &IndexConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(report.indexed, 0);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn progress_events_follow_the_batch() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");
        let paths = write_documents(
            dir.path(),
            &[
                ("a.json", document_json("uuid-a", 10000, &[(0, 2)])),
                ("broken.json", "oops".to_string()),
            ],
        );

        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            let label = match event {
                Progress::BatchStart { total_files } => format!("start:{total_files}"),
                Progress::FileIndexed { resolution, .. } => format!("indexed:{resolution}"),
                Progress::FileSkipped { .. } => "skipped".to_string(),
                Progress::BatchFinish { indexed, skipped } => {
                    format!("finish:{indexed}/{skipped}")
                }
                Progress::Message(_) => "message".to_string(),
            };
            events.lock().unwrap().push(label);
        }));

        let config = IndexConfig::builder().default_slot_width(4).build();
        run(&store_path, &paths, &config, &reporter).unwrap();
        drop(reporter);

        assert_eq!(
            events.into_inner().unwrap(),
            vec!["start:2", "indexed:10000", "skipped", "finish:1/1"]
        );
    }

    #[test]
    fn pass_through_metadata_lands_in_the_report() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("dataset.tad");

        let config = IndexConfig::builder()
            .assembly("GRCh38")
            .source_file_id("archive-0042")
            .build();
        let report = run(&store_path, &[], &config, &ProgressReporter::new()).unwrap();

        assert_eq!(report.assembly.as_deref(), Some("GRCh38"));
        assert_eq!(report.source_file_id.as_deref(), Some("archive-0042"));
        assert_eq!(config.default_slot_width, DEFAULT_SLOT_WIDTH);
    }
}
