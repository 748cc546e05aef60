use serde::{Deserialize, Serialize};

/// The cluster membership sets computed for one region's models.
///
/// Each cluster is the list of model reference ids that the upstream
/// modelling process judged structurally similar. The lists are preserved
/// verbatim for provenance; on top of them this type answers the one question
/// the indexer needs: which cluster does a given model belong to?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSet {
    members: Vec<Vec<u64>>,
}

impl ClusterSet {
    /// Creates a cluster set from raw membership lists.
    pub fn new(members: Vec<Vec<u64>>) -> Self {
        Self { members }
    }

    /// The number of clusters.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` when no clusters were computed for the region.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The raw membership lists, in upstream order.
    pub fn members(&self) -> &[Vec<u64>] {
        &self.members
    }

    /// The sentinel cluster id assigned to models that no cluster contains.
    ///
    /// Equal to the cluster count, so real cluster ids are always strictly
    /// smaller than it.
    pub fn unclustered_id(&self) -> u64 {
        self.members.len() as u64
    }

    /// The cluster id for a model reference.
    ///
    /// When several clusters contain the reference, the lowest cluster index
    /// wins. References contained in no cluster get [`Self::unclustered_id`].
    pub fn assignment(&self, reference: u64) -> u64 {
        self.members
            .iter()
            .position(|cluster| cluster.contains(&reference))
            .map(|index| index as u64)
            .unwrap_or_else(|| self.unclustered_id())
    }
}
