use indexmap::IndexMap;

use crate::query_planner::estimator::histogram::histogram_total;
use crate::query_planner::match_graph::{EdgeId, HistogramBucket, MatchGraph, NodeId};

/// Join selectivities from the estimator's annotations: sink histograms
/// where two edges meet, node-identity density everywhere else.
pub struct SelectivityCalculator<'a> {
    graph: &'a MatchGraph,
}

impl<'a> SelectivityCalculator<'a> {
    pub fn new(graph: &'a MatchGraph) -> Self {
        SelectivityCalculator { graph }
    }

    /// Equality join on the node-identity column: the catalog density,
    /// falling back to `1 / rows`.
    pub fn node_join_selectivity(&self, target: NodeId) -> f64 {
        let node = self.graph.node(target);
        if node.node_id_density > 0.0 && node.node_id_density < 1.0 {
            node.node_id_density
        } else if node.table_row_count > 1.0 {
            1.0 / node.table_row_count
        } else {
            1.0
        }
    }

    /// A cycle-closing edge meeting `other` at the same sink matches on
    /// their histogram overlap; otherwise the density prior applies.
    pub fn joint_edge_selectivity(
        &self,
        edge: EdgeId,
        target: NodeId,
        other: Option<EdgeId>,
    ) -> f64 {
        if let Some(other) = other {
            let left = &self.graph.edge(edge).statistics.histogram;
            let right = &self.graph.edge(other).statistics.histogram;
            if let Some(selectivity) = histogram_overlap(left, right) {
                return selectivity;
            }
        }
        self.node_join_selectivity(target)
    }
}

/// Expected match fraction of two sink distributions: summed minimum
/// bucket heights over the cross product, floored at one matching pair.
fn histogram_overlap(
    left: &IndexMap<i64, HistogramBucket>,
    right: &IndexMap<i64, HistogramBucket>,
) -> Option<f64> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    let denominator = histogram_total(left) * histogram_total(right);
    if denominator <= 0.0 {
        return None;
    }
    let overlap: f64 = left
        .iter()
        .filter_map(|(sink_id, bucket)| {
            right
                .get(sink_id)
                .map(|other| bucket.height.min(other.height))
        })
        .sum();
    Some((overlap.max(1.0) / denominator).min(1.0))
}
