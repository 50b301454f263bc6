use tonematch_core::{DataSet, DescriptorType, Result, Value};
use tracing::debug;

/// Drop descriptors that carry no usable signal
///
/// A descriptor is removed when it is empty (`Real(0)`), holds a non-finite
/// number on any point, or has the same value on every point. Datasets without
/// points are returned unchanged.
pub fn clean(dataset: DataSet) -> Result<DataSet> {
    if dataset.is_empty() {
        return Ok(dataset);
    }

    let kept: Vec<String> = dataset
        .layout()
        .descriptors()
        .iter()
        .enumerate()
        .filter(|(i, d)| {
            if d.ty == DescriptorType::Real(0) {
                return false;
            }
            let mut values = dataset.iter().map(|p| &p.values[*i]);
            let Some(first) = values.next() else {
                return false;
            };
            if !is_finite(first) {
                return false;
            }
            let mut constant = true;
            for value in values {
                if !is_finite(value) {
                    return false;
                }
                constant &= value == first;
            }
            !constant
        })
        .map(|(_, d)| d.name.clone())
        .collect();

    debug!(
        dataset = dataset.name(),
        removed = dataset.layout().len() - kept.len(),
        "cleaned descriptors"
    );
    dataset.into_projection(&kept)
}

fn is_finite(value: &Value) -> bool {
    match value {
        Value::Real(v) => v.iter().all(|x| x.is_finite()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonematch_core::Descriptors;

    #[test]
    fn test_clean_removes_constant_and_non_finite() {
        let rows = [
            ("p1", 1.0, 0.5, f32::NAN, "C"),
            ("p2", 2.0, 0.5, 1.0, "C"),
            ("p3", 3.0, 0.5, 2.0, "D"),
        ];
        let ds = DataSet::from_descriptors(
            "rest",
            rows.iter().map(|&(id, varying, constant, broken, key)| {
                let mut d = Descriptors::new();
                d.insert("lowlevel.varying".to_string(), Value::scalar(varying));
                d.insert("lowlevel.constant".to_string(), Value::scalar(constant));
                d.insert("lowlevel.broken".to_string(), Value::scalar(broken));
                d.insert("tonal.key".to_string(), Value::from(key));
                (id.to_string(), d)
            }),
        )
        .unwrap();

        let cleaned = clean(ds).unwrap();
        assert_eq!(
            cleaned.layout().names().collect::<Vec<_>>(),
            vec!["lowlevel.varying", "tonal.key"]
        );
        assert_eq!(cleaned.len(), 3);
    }

    #[test]
    fn test_clean_empty_dataset_is_noop() {
        let ds = DataSet::default();
        let cleaned = clean(ds).unwrap();
        assert!(cleaned.is_empty());
    }
}
