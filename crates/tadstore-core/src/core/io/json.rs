use crate::core::models::cluster::ClusterSet;
use crate::core::models::document::{ObjectData, RegionDocument};
use crate::core::models::model::StructureModel;
use serde::Deserialize;
use serde_json::Number;
use serde_json::value::RawValue;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is invalid: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("model {reference} has {count} coordinates, which is not a multiple of 3")]
    RaggedCoordinates { reference: u64, count: usize },
}

/// A value the producer emits either bare or wrapped in a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self, field: &'static str) -> Result<T, DocumentError> {
        match self {
            OneOrMany::One(value) => Ok(value),
            OneOrMany::Many(values) => {
                values
                    .into_iter()
                    .next()
                    .ok_or_else(|| DocumentError::InvalidField {
                        field,
                        message: "array is empty".to_string(),
                    })
            }
        }
    }
}

/// A model reference id, emitted either as a number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reference {
    Number(u64),
    Text(String),
}

impl Reference {
    fn into_u64(self, field: &'static str) -> Result<u64, DocumentError> {
        match self {
            Reference::Number(value) => Ok(value),
            Reference::Text(text) => {
                text.parse().map_err(|_| DocumentError::InvalidField {
                    field,
                    message: format!("'{text}' is not an integer reference"),
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    uuid: Option<String>,
    resolution: Option<Number>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    experiment_type: String,
    #[serde(default)]
    species: String,
    #[serde(default)]
    project: String,
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    assembly: String,
    #[serde(default)]
    cell_type: String,
    #[serde(default)]
    datatype: String,
    #[serde(default)]
    components: u32,
    #[serde(default)]
    source: String,
    chrom: Option<OneOrMany<String>>,
    chrom_start: Option<OneOrMany<Number>>,
    chrom_end: Option<OneOrMany<Number>>,
    dependencies: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(rename = "ref")]
    reference: Reference,
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    object: Option<RawObject>,
    models: Option<Vec<RawModel>>,
    clusters: Option<Vec<Vec<Reference>>>,
    metadata: Option<Box<RawValue>>,
    centroids: Option<Box<RawValue>>,
    restraints: Option<Box<RawValue>>,
    hic_data: Option<Box<RawValue>>,
}

fn number_to_u64(value: Number, field: &'static str) -> Result<u64, DocumentError> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| DocumentError::InvalidField {
            field,
            message: format!("'{value}' is not a non-negative integer"),
        })
}

fn blob_text(blob: Option<Box<RawValue>>) -> Option<String> {
    blob.map(|raw| raw.get().to_string())
}

fn build_object(raw: RawObject) -> Result<ObjectData, DocumentError> {
    let uuid = raw.uuid.ok_or(DocumentError::MissingField("object.uuid"))?;
    let resolution = raw
        .resolution
        .ok_or(DocumentError::MissingField("object.resolution"))
        .and_then(|n| number_to_u64(n, "object.resolution"))?;
    let resolution =
        u32::try_from(resolution).map_err(|_| DocumentError::InvalidField {
            field: "object.resolution",
            message: format!("{resolution} exceeds the supported resolution range"),
        })?;
    let chromosome = raw
        .chrom
        .ok_or(DocumentError::MissingField("object.chrom"))?
        .into_first("object.chrom")?;
    let start = raw
        .chrom_start
        .ok_or(DocumentError::MissingField("object.chromStart"))?
        .into_first("object.chromStart")
        .and_then(|n| number_to_u64(n, "object.chromStart"))?;
    let end = raw
        .chrom_end
        .ok_or(DocumentError::MissingField("object.chromEnd"))?
        .into_first("object.chromEnd")
        .and_then(|n| number_to_u64(n, "object.chromEnd"))?;

    Ok(ObjectData {
        uuid,
        title: raw.title,
        experiment_type: raw.experiment_type,
        species: raw.species,
        project: raw.project,
        identifier: raw.identifier,
        assembly: raw.assembly,
        cell_type: raw.cell_type,
        resolution,
        datatype: raw.datatype,
        components: raw.components,
        source: raw.source,
        chromosome,
        start,
        end,
        dependencies: blob_text(raw.dependencies),
    })
}

fn build_models(raw: Vec<RawModel>) -> Result<Vec<StructureModel>, DocumentError> {
    raw.into_iter()
        .map(|model| {
            let reference = model.reference.into_u64("models[].ref")?;
            StructureModel::from_flat(reference, &model.data).ok_or(
                DocumentError::RaggedCoordinates {
                    reference,
                    count: model.data.len(),
                },
            )
        })
        .collect()
}

fn build_clusters(raw: Vec<Vec<Reference>>) -> Result<ClusterSet, DocumentError> {
    let members = raw
        .into_iter()
        .map(|cluster| {
            cluster
                .into_iter()
                .map(|reference| reference.into_u64("clusters[]"))
                .collect()
        })
        .collect::<Result<Vec<Vec<u64>>, DocumentError>>()?;
    Ok(ClusterSet::new(members))
}

impl FromStr for RegionDocument {
    type Err = DocumentError;

    /// Parses and validates one region document from JSON text.
    ///
    /// # Errors
    ///
    /// Fails when the text is not valid JSON, when `object`, `models` or
    /// `clusters` are absent, when `object.uuid` or `object.resolution` are
    /// missing, or when a model's coordinate count is not a multiple of 3.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw: RawDocument = serde_json::from_str(text)?;

        let object = build_object(raw.object.ok_or(DocumentError::MissingField("object"))?)?;
        let models = build_models(raw.models.ok_or(DocumentError::MissingField("models"))?)?;
        let clusters =
            build_clusters(raw.clusters.ok_or(DocumentError::MissingField("clusters"))?)?;

        Ok(RegionDocument {
            object,
            models,
            clusters,
            metadata: blob_text(raw.metadata),
            centroids: blob_text(raw.centroids),
            restraints: blob_text(raw.restraints),
            hic_data: blob_text(raw.hic_data),
        })
    }
}

impl RegionDocument {
    /// Reads one region document from a reader.
    pub fn from_reader(reader: &mut impl Read) -> Result<Self, DocumentError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        text.parse()
    }

    /// Reads one region document from a file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        fs::read_to_string(path)?.parse()
    }
}
