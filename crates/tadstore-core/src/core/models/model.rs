use nalgebra::Point3;

/// One simulated 3D structure of a genomic region.
///
/// A model is an ordered sequence of bead positions, one bead per genomic bin
/// at the region's resolution, together with the reference id assigned by the
/// upstream modelling run. The bead list is kept private so that a model can
/// only be built from a coordinate list whose length is a whole number of
/// x,y,z triples.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureModel {
    /// The reference id of this model within its document.
    pub reference: u64,
    beads: Vec<Point3<f64>>,
}

impl StructureModel {
    /// Builds a model from a flat coordinate list.
    ///
    /// The list is consumed three values at a time, in input order, as
    /// x,y,z triples.
    ///
    /// # Return
    ///
    /// Returns `None` if `coordinates.len()` is not a multiple of 3.
    pub fn from_flat(reference: u64, coordinates: &[f64]) -> Option<Self> {
        if !coordinates.len().is_multiple_of(3) {
            return None;
        }
        let beads = coordinates
            .chunks_exact(3)
            .map(|xyz| Point3::new(xyz[0], xyz[1], xyz[2]))
            .collect();
        Some(Self { reference, beads })
    }

    /// Builds a model directly from bead positions.
    pub fn from_beads(reference: u64, beads: Vec<Point3<f64>>) -> Self {
        Self { reference, beads }
    }

    /// The bead positions of this model, in genomic order.
    pub fn beads(&self) -> &[Point3<f64>] {
        &self.beads
    }

    /// The number of beads (x,y,z triples) in this model.
    pub fn bead_count(&self) -> usize {
        self.beads.len()
    }
}
