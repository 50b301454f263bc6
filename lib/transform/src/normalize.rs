use serde::{Deserialize, Serialize};
use tonematch_core::{DataSet, DescriptorType, Result, Value};
use tracing::debug;

/// Per-component rescaling method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Rescale each component to `[0, 1]`
    #[default]
    MinMax,
    /// Center on the mean, divide by the standard deviation
    ZScore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub method: Normalization,
    /// Descriptor patterns left untouched
    pub except: Vec<String>,
}

/// Affine map applied to one component: `(x - offset) * scale`
#[derive(Debug, Clone, Copy)]
struct Affine {
    offset: f64,
    scale: f64,
}

impl Affine {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        ((f64::from(x) - self.offset) * self.scale) as f32
    }
}

/// Normalize every fixed-length numeric descriptor not matching `config.except`
///
/// Statistics are computed per component over all points. Components with no
/// spread map to `0.0`.
pub fn normalize(dataset: DataSet, config: &NormalizeConfig) -> Result<DataSet> {
    let included = dataset.matching_names(&["*".to_string()], &config.except, None)?;
    let mut plans: Vec<Option<Vec<Affine>>> = vec![None; dataset.layout().len()];
    for name in &included {
        let Some(index) = dataset.layout().index_of(name) else {
            continue;
        };
        let DescriptorType::Real(dim) = dataset.layout().descriptors()[index].ty else {
            continue;
        };
        plans[index] = Some(
            (0..dim)
                .map(|c| component_affine(&dataset, index, c, config.method))
                .collect(),
        );
    }

    let touched = plans.iter().filter(|p| p.is_some()).count();
    if touched == 0 || dataset.is_empty() {
        return Ok(dataset);
    }

    let (name, layout, mut points) = dataset.into_parts();
    for point in &mut points {
        for (value, plan) in point.values.iter_mut().zip(&plans) {
            if let (Value::Real(v), Some(plan)) = (value, plan) {
                for (x, affine) in v.iter_mut().zip(plan) {
                    *x = affine.apply(*x);
                }
            }
        }
    }
    debug!(dataset = name.as_str(), method = ?config.method, touched, "normalized descriptors");
    DataSet::from_parts(name, layout, points)
}

fn component_affine(dataset: &DataSet, index: usize, component: usize, method: Normalization) -> Affine {
    let values = || {
        dataset
            .iter()
            .filter_map(move |p| p.values[index].as_real().and_then(|v| v.get(component)))
            .map(|&x| f64::from(x))
    };
    match method {
        Normalization::MinMax => {
            let (min, max) = values().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
            let range = max - min;
            if range > 0.0 && range.is_finite() {
                Affine { offset: min, scale: 1.0 / range }
            } else {
                Affine { offset: min, scale: 0.0 }
            }
        }
        Normalization::ZScore => {
            let n = values().count() as f64;
            let mean = values().sum::<f64>() / n.max(1.0);
            let variance = values().map(|x| (x - mean).powi(2)).sum::<f64>() / n.max(1.0);
            let std = variance.sqrt();
            if std > 0.0 && std.is_finite() {
                Affine { offset: mean, scale: 1.0 / std }
            } else {
                Affine { offset: mean, scale: 0.0 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonematch_core::Descriptors;

    fn dataset() -> DataSet {
        DataSet::from_descriptors(
            "rest",
            [(1.0, 10.0, 4.0), (2.0, 20.0, 4.0), (3.0, 40.0, 4.0)]
                .iter()
                .enumerate()
                .map(|(i, &(a, b, flat))| {
                    let mut d = Descriptors::new();
                    d.insert("lowlevel.pair".to_string(), Value::Real(vec![a, b]));
                    d.insert("lowlevel.flat".to_string(), Value::scalar(flat));
                    d.insert("lowlevel.mfcc.mean".to_string(), Value::scalar(a * 100.0));
                    (format!("p{}", i + 1), d)
                }),
        )
        .unwrap()
    }

    #[test]
    fn test_minmax_per_component() {
        let config = NormalizeConfig {
            except: vec!["lowlevel.mfcc.*".to_string()],
            ..Default::default()
        };
        let ds = normalize(dataset(), &config).unwrap();
        assert_eq!(ds.value("p1", "lowlevel.pair"), Some(&Value::Real(vec![0.0, 0.0])));
        assert_eq!(ds.value("p3", "lowlevel.pair"), Some(&Value::Real(vec![1.0, 1.0])));
        let mid = ds.value("p2", "lowlevel.pair").unwrap().as_real().unwrap();
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert!((mid[1] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(ds.value("p2", "lowlevel.flat"), Some(&Value::scalar(0.0)));
        assert_eq!(ds.value("p2", "lowlevel.mfcc.mean"), Some(&Value::scalar(200.0)));
    }

    #[test]
    fn test_zscore_centers() {
        let config = NormalizeConfig {
            method: Normalization::ZScore,
            except: Vec::new(),
        };
        let ds = normalize(dataset(), &config).unwrap();
        let sum: f32 = ds
            .iter()
            .map(|p| p.real(ds.layout(), "lowlevel.mfcc.mean").unwrap()[0])
            .sum();
        assert!(sum.abs() < 1e-4);
        let p3 = ds.value("p3", "lowlevel.mfcc.mean").unwrap().as_real().unwrap()[0];
        assert!((p3 - 1.224_744_9).abs() < 1e-4);
    }
}
