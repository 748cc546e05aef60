//! Packs variable-length model coordinate lists into fixed-width row blocks.
//!
//! A resolution group's coordinate table has one row per model, each row
//! holding `slot_width` bead slots of three `f32` cells. Packing fills the
//! leading slots of every row in bead order, zero-fills the remainder, and
//! pairs each model with the id of the cluster containing it. The transform
//! is pure: no I/O, and identical inputs always produce identical output.

use crate::core::models::cluster::ClusterSet;
use crate::core::models::model::StructureModel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The value written into bead slots beyond a model's last bead.
pub const FILL_VALUE: f32 = 0.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    #[error(
        "model {reference} has {beads} beads, exceeding the {slot_width}-slot row width of its resolution group"
    )]
    OversizedModel {
        reference: u64,
        beads: usize,
        slot_width: usize,
    },
}

/// A model's row assignment: its reference id and resolved cluster id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAssignment {
    pub reference: u64,
    pub cluster: u64,
}

/// A fixed-width block of coordinate rows, one row per model.
///
/// Logically shaped `(model_count, slot_width, 3)`; physically a contiguous
/// row-major `f32` buffer, which is exactly the byte layout the store appends.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedBlock {
    slot_width: usize,
    cells: Vec<f32>,
}

impl PackedBlock {
    fn empty(slot_width: usize) -> Self {
        Self {
            slot_width,
            cells: Vec::new(),
        }
    }

    /// The number of rows (models) in this block.
    pub fn model_count(&self) -> usize {
        if self.slot_width == 0 {
            0
        } else {
            self.cells.len() / (self.slot_width * 3)
        }
    }

    /// The number of bead slots per row.
    pub fn slot_width(&self) -> usize {
        self.slot_width
    }

    /// The x,y,z cells of one bead slot.
    ///
    /// # Panics
    ///
    /// Panics if `model` or `slot` is out of bounds.
    pub fn cell(&self, model: usize, slot: usize) -> [f32; 3] {
        assert!(model < self.model_count() && slot < self.slot_width);
        let base = (model * self.slot_width + slot) * 3;
        [self.cells[base], self.cells[base + 1], self.cells[base + 2]]
    }

    /// Serializes the block into the store's little-endian byte layout.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.cells.len() * 4);
        for cell in &self.cells {
            bytes.extend_from_slice(&cell.to_le_bytes());
        }
        bytes
    }

    /// Rebuilds a block from the store's little-endian byte layout.
    ///
    /// Returns `None` when the byte count is not a whole number of rows of
    /// the given slot width.
    pub fn from_le_bytes(slot_width: usize, bytes: &[u8]) -> Option<Self> {
        let row_bytes = slot_width * 3 * 4;
        if row_bytes == 0 || !bytes.len().is_multiple_of(row_bytes) {
            return None;
        }
        let cells = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Some(Self { slot_width, cells })
    }
}

/// Packs a document's models into a fixed-width row block and resolves each
/// model's cluster id.
///
/// Model `m`'s beads fill row `m`'s slots `0..bead_count` in input order;
/// trailing slots hold [`FILL_VALUE`]. The cluster id is the lowest index of
/// a cluster containing the model's reference, or the cluster count when no
/// cluster does.
///
/// # Errors
///
/// Fails with [`PackError::OversizedModel`] if any model has more beads than
/// `slot_width`; no partial block is produced.
pub fn pack(
    models: &[StructureModel],
    clusters: &ClusterSet,
    slot_width: usize,
) -> Result<(PackedBlock, Vec<ModelAssignment>), PackError> {
    let mut block = PackedBlock::empty(slot_width);
    block.cells.reserve(models.len() * slot_width * 3);
    let mut assignments = Vec::with_capacity(models.len());

    for model in models {
        if model.bead_count() > slot_width {
            return Err(PackError::OversizedModel {
                reference: model.reference,
                beads: model.bead_count(),
                slot_width,
            });
        }

        for bead in model.beads() {
            block.cells.push(bead.x as f32);
            block.cells.push(bead.y as f32);
            block.cells.push(bead.z as f32);
        }
        let padding = (slot_width - model.bead_count()) * 3;
        block.cells.extend(std::iter::repeat_n(FILL_VALUE, padding));

        assignments.push(ModelAssignment {
            reference: model.reference,
            cluster: clusters.assignment(model.reference),
        });
    }

    Ok((block, assignments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(reference: u64, coordinates: &[f64]) -> StructureModel {
        StructureModel::from_flat(reference, coordinates).unwrap()
    }

    #[test]
    fn packs_beads_in_input_order_and_zero_fills_the_tail() {
        let models = vec![model(1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])];
        let (block, _) = pack(&models, &ClusterSet::default(), 4).unwrap();

        assert_eq!(block.model_count(), 1);
        assert_eq!(block.slot_width(), 4);
        assert_eq!(block.cell(0, 0), [1.0, 2.0, 3.0]);
        assert_eq!(block.cell(0, 1), [4.0, 5.0, 6.0]);
        assert_eq!(block.cell(0, 2), [FILL_VALUE; 3]);
        assert_eq!(block.cell(0, 3), [FILL_VALUE; 3]);
    }

    #[test]
    fn clustered_models_get_indices_below_the_cluster_count() {
        let clusters = ClusterSet::new(vec![vec![10], vec![20, 30]]);
        let models = vec![model(10, &[]), model(30, &[]), model(20, &[])];
        let (_, assignments) = pack(&models, &clusters, 8).unwrap();

        for assignment in &assignments {
            assert!(assignment.cluster < clusters.len() as u64);
        }
        assert_eq!(assignments[0].cluster, 0);
        assert_eq!(assignments[1].cluster, 1);
        assert_eq!(assignments[2].cluster, 1);
    }

    #[test]
    fn unclustered_models_get_the_sentinel_id() {
        let clusters = ClusterSet::new(vec![vec![10]]);
        let models = vec![model(99, &[])];
        let (_, assignments) = pack(&models, &clusters, 8).unwrap();

        assert_eq!(assignments[0].cluster, 1);
        assert_eq!(assignments[0].cluster, clusters.unclustered_id());
    }

    #[test]
    fn oversized_models_fail_the_whole_pack() {
        let models = vec![
            model(1, &[0.0; 6]),
            model(2, &[0.0; 12]), // 4 beads, over the width of 3
        ];
        let err = pack(&models, &ClusterSet::default(), 3).unwrap_err();

        assert_eq!(
            err,
            PackError::OversizedModel {
                reference: 2,
                beads: 4,
                slot_width: 3,
            }
        );
    }

    #[test]
    fn a_model_exactly_at_the_slot_width_fits() {
        let models = vec![model(1, &[0.5; 9])];
        let (block, _) = pack(&models, &ClusterSet::default(), 3).unwrap();

        assert_eq!(block.model_count(), 1);
        assert_eq!(block.cell(0, 2), [0.5; 3]);
    }

    #[test]
    fn packing_is_deterministic() {
        let clusters = ClusterSet::new(vec![vec![1, 2]]);
        let models = vec![model(1, &[1.0, 2.0, 3.0]), model(2, &[4.0, 5.0, 6.0])];

        let first = pack(&models, &clusters, 5).unwrap();
        let second = pack(&models, &clusters, 5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn byte_layout_round_trips() {
        let models = vec![model(1, &[1.5, -2.5, 3.25]), model(2, &[0.0; 6])];
        let (block, _) = pack(&models, &ClusterSet::default(), 2).unwrap();

        let bytes = block.to_le_bytes();
        assert_eq!(bytes.len(), 2 * 2 * 3 * 4);

        let rebuilt = PackedBlock::from_le_bytes(2, &bytes).unwrap();
        assert_eq!(rebuilt, block);
    }

    #[test]
    fn empty_model_list_packs_to_an_empty_block() {
        let (block, assignments) = pack(&[], &ClusterSet::default(), 4).unwrap();
        assert_eq!(block.model_count(), 0);
        assert!(assignments.is_empty());
        assert!(block.to_le_bytes().is_empty());
    }
}
