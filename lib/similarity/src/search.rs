//! Exact nearest-neighbor search
//!
//! Every candidate is scored against the query (in parallel with rayon), then
//! the scores are ordered by ascending distance. Ties are broken by
//! identifier and NaN distances rank last, so results are deterministic.

use crate::metric::DistanceFunction;
use ahash::AHashSet;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tonematch_core::{DataSet, Error, Point, Result};
use tracing::debug;

/// Default number of neighbors returned per query
pub const DEFAULT_QUANTITY: usize = 30;

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: f32,
}

/// The `quantity` points of `dataset` closest to `query`
///
/// The query itself (by identifier) and every identifier in `exclude` are
/// skipped. Fewer than `quantity` hits are returned when not enough
/// candidates survive.
pub fn nn_search(
    dataset: &DataSet,
    metric: &dyn DistanceFunction,
    query: &Point,
    quantity: usize,
    exclude: &AHashSet<String>,
) -> Vec<Neighbor> {
    if quantity == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(OrderedFloat<f32>, &str)> = dataset
        .points()
        .par_iter()
        .filter(|p| p.id != query.id && !exclude.contains(&p.id))
        .map(|p| (OrderedFloat(metric.distance(query, p)), p.id.as_str()))
        .collect();

    scored.sort_unstable();
    scored.truncate(quantity);
    scored
        .into_iter()
        .map(|(distance, id)| Neighbor {
            id: id.to_string(),
            distance: distance.into_inner(),
        })
        .collect()
}

/// Recommendations for every query identifier, resolved to display labels
///
/// Each query is searched in `dataset` with all `queries` excluded, then both
/// the query and its hits are mapped through `label_descriptor` (falling back
/// to the identifier). Fails with [`Error::PointNotFound`] for an unknown
/// query identifier.
pub fn find_similar_in<S: AsRef<str>>(
    dataset: &DataSet,
    metric: &dyn DistanceFunction,
    queries: &[S],
    quantity: usize,
    label_descriptor: &str,
) -> Result<BTreeMap<String, Vec<String>>> {
    let exclude: AHashSet<String> = queries.iter().map(|q| q.as_ref().to_string()).collect();
    let mut results = BTreeMap::new();

    for id in queries {
        let id = id.as_ref();
        let query = dataset
            .point(id)
            .ok_or_else(|| Error::PointNotFound(id.to_string()))?;
        let neighbors = nn_search(dataset, metric, query, quantity, &exclude);
        debug!(
            query = id,
            found = neighbors.len(),
            closest = ?neighbors.first().map(|n| n.distance),
            "searched neighbors"
        );
        let labels = neighbors
            .iter()
            .map(|n| dataset.label(&n.id, label_descriptor))
            .collect();
        results.insert(dataset.label(id, label_descriptor), labels);
    }
    Ok(results)
}
