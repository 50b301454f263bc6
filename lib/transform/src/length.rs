//! Length coercion stages: drop ragged descriptors, fix the remaining lengths

use std::collections::BTreeMap;
use tonematch_core::{DataSet, Descriptor, DescriptorType, Layout, Result, Value};
use tracing::debug;

/// Drop every variable-length descriptor
///
/// Raw per-frame sequences are large and not used for similarity, removing
/// them first keeps whole reference collections small enough to hold resident.
pub fn remove_variable_length(dataset: DataSet) -> Result<DataSet> {
    let kept: Vec<String> = dataset
        .layout()
        .descriptors()
        .iter()
        .filter(|d| d.ty != DescriptorType::VariableLength)
        .map(|d| d.name.clone())
        .collect();
    let removed = dataset.layout().len() - kept.len();
    if removed > 0 {
        debug!(dataset = dataset.name(), removed, "removed variable-length descriptors");
    }
    dataset.into_projection(&kept)
}

/// Coerce numeric descriptors to a fixed length
///
/// Descriptors listed in `lengths` are truncated or zero-padded to the given
/// length. Remaining variable-length descriptors are truncated to the
/// shortest length found in the dataset.
pub fn fix_length(dataset: DataSet, lengths: &BTreeMap<String, usize>) -> Result<DataSet> {
    let targets: Vec<Option<usize>> = dataset
        .layout()
        .descriptors()
        .iter()
        .enumerate()
        .map(|(i, d)| match (d.ty, lengths.get(&d.name)) {
            (DescriptorType::Real(dim), Some(&len)) if dim != len => Some(len),
            (DescriptorType::VariableLength, Some(&len)) => Some(len),
            (DescriptorType::VariableLength, None) => Some(
                dataset
                    .iter()
                    .filter_map(|p| p.values[i].as_real().map(<[f32]>::len))
                    .min()
                    .unwrap_or(0),
            ),
            _ => None,
        })
        .collect();

    if targets.iter().all(Option::is_none) {
        return Ok(dataset);
    }

    let (name, layout, mut points) = dataset.into_parts();
    let descriptors: Vec<Descriptor> = layout
        .descriptors()
        .iter()
        .zip(&targets)
        .map(|(d, target)| match target {
            Some(len) => Descriptor::new(d.name.clone(), DescriptorType::Real(*len)),
            None => d.clone(),
        })
        .collect();

    for point in &mut points {
        for (value, target) in point.values.iter_mut().zip(&targets) {
            if let (Some(len), Value::Real(v)) = (target, value) {
                v.resize(*len, 0.0);
            }
        }
    }

    debug!(
        dataset = name.as_str(),
        fixed = targets.iter().filter(|t| t.is_some()).count(),
        "fixed descriptor lengths"
    );
    DataSet::from_parts(name, Layout::new(descriptors)?, points)
}
