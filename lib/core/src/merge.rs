//! Merge and union operators
//!
//! All operators take their inputs by value. When an input can be used as is
//! (its layout already matches the target), it is returned as the result
//! instead of being copied.

use crate::dataset::DataSet;
use crate::point::Point;
use crate::{Error, Result};
use ahash::AHashSet;
use tracing::{debug, info, warn};

/// Row concatenation of two datasets with identical layouts
///
/// Fails with [`Error::LayoutMismatch`] when layouts differ and with
/// [`Error::DuplicatePoint`] when an identifier exists on both sides.
pub fn append(mut first: DataSet, second: DataSet) -> Result<DataSet> {
    if first.layout() != second.layout() {
        return Err(Error::LayoutMismatch(
            first.layout().describe_difference(second.layout()),
        ));
    }
    if let Some(duplicate) = second.iter().find(|p| first.contains(&p.id)) {
        return Err(Error::DuplicatePoint(duplicate.id.clone()));
    }
    let (_, _, points) = second.into_parts();
    for point in points {
        first.push_unchecked(point);
    }
    Ok(first)
}

/// Column union of two datasets holding the same points and disjoint layouts
///
/// The result keeps the point order and the name of `first`.
pub fn column_merge(first: DataSet, second: DataSet) -> Result<DataSet> {
    let overlap = first.layout().overlap(second.layout());
    if !overlap.is_empty() {
        return Err(Error::SchemaOverlap(overlap));
    }
    if first.len() != second.len() || first.iter().any(|p| !second.contains(&p.id)) {
        let missing: Vec<&str> = first
            .iter()
            .filter(|p| !second.contains(&p.id))
            .chain(second.iter().filter(|p| !first.contains(&p.id)))
            .map(|p| p.id.as_str())
            .take(5)
            .collect();
        return Err(Error::PointSetMismatch(format!(
            "{} vs {} points, unmatched: [{}]",
            first.len(),
            second.len(),
            missing.join(", ")
        )));
    }

    let layout = first.layout().union(second.layout())?;
    // for each merged descriptor: which side it comes from and where
    let sources: Vec<(bool, usize)> = layout
        .names()
        .map(|name| match first.layout().index_of(name) {
            Some(i) => Ok((true, i)),
            None => second
                .layout()
                .index_of(name)
                .map(|i| (false, i))
                .ok_or_else(|| Error::UnknownDescriptor(name.to_string())),
        })
        .collect::<Result<_>>()?;

    let mut merged = DataSet::new(first.name(), layout);
    let (_, _, points) = first.into_parts();
    for point in points {
        let Some(other) = second.point(&point.id) else {
            return Err(Error::PointNotFound(point.id));
        };
        let values = sources
            .iter()
            .map(|&(from_first, i)| {
                if from_first {
                    point.values[i].clone()
                } else {
                    other.values[i].clone()
                }
            })
            .collect();
        merged.push_unchecked(Point::new(point.id, values));
    }
    Ok(merged)
}

/// Column union of several datasets, folded left to right
pub fn merge_all(datasets: Vec<DataSet>) -> Result<DataSet> {
    let mut iter = datasets.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::InvalidConfig("no datasets to merge".to_string()))?;
    iter.try_fold(first, column_merge)
}

/// Schema-intersection union
///
/// Points of `second` whose identifier also exists in `first` are dropped
/// (`first` wins), both sides are projected onto the descriptors they share
/// with the same type, then the rows are appended.
pub fn sum(first: DataSet, mut second: DataSet) -> Result<DataSet> {
    let shared: Vec<String> = second
        .iter()
        .filter(|p| first.contains(&p.id))
        .map(|p| p.id.clone())
        .collect();
    if !shared.is_empty() {
        info!(
            first = first.name(),
            second = second.name(),
            count = shared.len(),
            "dropping points already present in first dataset"
        );
        second.remove_points(&shared);
    }

    let common = first.layout().common(second.layout());
    let names: Vec<String> = common.names().map(str::to_string).collect();
    let first = restrict(first, &names)?;
    let second = restrict(second, &names)?;
    append(first, second)
}

fn restrict(dataset: DataSet, names: &[String]) -> Result<DataSet> {
    if dataset.layout().len() == names.len() {
        return Ok(dataset);
    }
    let kept: AHashSet<&str> = names.iter().map(String::as_str).collect();
    let dropped: Vec<&str> = dataset
        .layout()
        .names()
        .filter(|n| !kept.contains(n))
        .collect();
    warn!(
        dataset = dataset.name(),
        dropped = dropped.len(),
        "projecting onto common descriptors, dropping: {}",
        dropped.join(", ")
    );
    dataset.into_projection(names)
}

/// Schema-intersection union of several datasets, folded left to right
pub fn sum_all(datasets: Vec<DataSet>) -> Result<DataSet> {
    let mut iter = datasets.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::InvalidConfig("no datasets to sum".to_string()))?;
    iter.try_fold(first, |acc, next| {
        debug!(into = acc.name(), from = next.name(), "summing datasets");
        sum(acc, next)
    })
}

/// Descriptor names shared by every dataset (same name and type)
pub fn common_descriptors(datasets: &[&DataSet]) -> Vec<String> {
    let Some((first, rest)) = datasets.split_first() else {
        return Vec::new();
    };
    let common = rest
        .iter()
        .fold(first.layout().clone(), |acc, ds| acc.common(ds.layout()));
    common.names().map(str::to_string).collect()
}

/// Point identifiers present in every dataset, sorted
pub fn common_points(datasets: &[&DataSet]) -> Vec<String> {
    let Some((first, rest)) = datasets.split_first() else {
        return Vec::new();
    };
    let mut ids: Vec<String> = first
        .iter()
        .filter(|p| rest.iter().all(|ds| ds.contains(&p.id)))
        .map(|p| p.id.clone())
        .collect();
    ids.sort();
    ids
}
