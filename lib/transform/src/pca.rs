//! Principal component analysis over the fixed-length numeric descriptors
//!
//! The covariance matrix is diagonalized with cyclic Jacobi rotations, which
//! is deterministic for a given input: components are ordered by decreasing
//! eigenvalue and each one is signed so that its largest coefficient is
//! positive.

use serde::{Deserialize, Serialize};
use tonematch_core::{DataSet, Descriptor, DescriptorType, Error, Layout, Point, Result, Value};
use tracing::debug;

/// Default number of retained components
pub const DEFAULT_PCA_DIMENSION: usize = 25;

/// Default name of the produced descriptor
pub const PCA_DESCRIPTOR: &str = "pca";

const MAX_SWEEPS: usize = 64;
const TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaConfig {
    pub dimension: usize,
    /// Descriptor patterns passed through unchanged
    pub except: Vec<String>,
    pub result_name: String,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_PCA_DIMENSION,
            except: Vec::new(),
            result_name: PCA_DESCRIPTOR.to_string(),
        }
    }
}

/// A fitted projection
#[derive(Debug, Clone, PartialEq)]
pub struct PcaModel {
    descriptors: Vec<String>,
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    eigenvalues: Vec<f64>,
}

impl PcaModel {
    /// Fit on the concatenation of the given `Real(n)` descriptors
    pub fn fit(dataset: &DataSet, descriptors: &[String], dimension: usize) -> Result<Self> {
        let indices = descriptors
            .iter()
            .map(|name| {
                let index = dataset
                    .layout()
                    .index_of(name)
                    .ok_or_else(|| Error::UnknownDescriptor(name.clone()))?;
                match dataset.layout().descriptors()[index].ty {
                    DescriptorType::Real(_) => Ok(index),
                    ty => Err(Error::InvalidConfig(format!(
                        "descriptor {} is {}, PCA needs fixed-length numbers",
                        name, ty
                    ))),
                }
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows: Vec<Vec<f64>> = dataset.iter().map(|p| flatten(p, &indices)).collect();
        let dim = descriptors
            .iter()
            .filter_map(|n| dataset.layout().get(n))
            .map(|d| match d.ty {
                DescriptorType::Real(n) => n,
                _ => 0,
            })
            .sum::<usize>();

        let n = rows.len();
        let mut mean = vec![0.0; dim];
        for row in &rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        if n > 0 {
            for m in &mut mean {
                *m /= n as f64;
            }
        }

        let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
        let mut covariance = vec![vec![0.0; dim]; dim];
        for row in &rows {
            let centered: Vec<f64> = row.iter().zip(&mean).map(|(x, m)| x - m).collect();
            for i in 0..dim {
                for j in i..dim {
                    covariance[i][j] += centered[i] * centered[j];
                }
            }
        }
        for i in 0..dim {
            for j in i..dim {
                covariance[i][j] /= denom;
                covariance[j][i] = covariance[i][j];
            }
        }

        let (eigenvalues, vectors) = symmetric_eigen(covariance);
        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]).then(a.cmp(&b)));

        let keep = dimension.min(dim);
        let components: Vec<Vec<f64>> = order[..keep]
            .iter()
            .map(|&k| {
                let mut component: Vec<f64> = vectors.iter().map(|row| row[k]).collect();
                orient(&mut component);
                component
            })
            .collect();
        let eigenvalues = order[..keep].iter().map(|&k| eigenvalues[k]).collect();

        Ok(Self {
            descriptors: descriptors.to_vec(),
            mean,
            components,
            eigenvalues,
        })
    }

    /// Number of output components
    #[inline]
    pub fn dimension(&self) -> usize {
        self.components.len()
    }

    /// Variances along the retained components, decreasing
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Project one point of a dataset sharing the fitted layout
    pub fn project(&self, point: &Point, layout: &Layout) -> Result<Vec<f32>> {
        let indices = self
            .descriptors
            .iter()
            .map(|n| layout.index_of(n).ok_or_else(|| Error::UnknownDescriptor(n.clone())))
            .collect::<Result<Vec<usize>>>()?;
        let row = flatten(point, &indices);
        if row.len() != self.mean.len() {
            return Err(Error::InconsistentPoint {
                id: point.id.clone(),
                reason: format!("{} PCA inputs, model expects {}", row.len(), self.mean.len()),
            });
        }
        Ok(self
            .components
            .iter()
            .map(|c| {
                c.iter()
                    .zip(row.iter().zip(&self.mean))
                    .map(|(w, (x, m))| w * (x - m))
                    .sum::<f64>() as f32
            })
            .collect())
    }
}

fn flatten(point: &Point, indices: &[usize]) -> Vec<f64> {
    indices
        .iter()
        .filter_map(|&i| point.values[i].as_real())
        .flat_map(|v| v.iter().map(|&x| f64::from(x)))
        .collect()
}

/// Flip the sign so the largest-magnitude coefficient is positive
fn orient(component: &mut [f64]) {
    let mut pivot = 0.0_f64;
    for &c in component.iter() {
        if c.abs() > pivot.abs() {
            pivot = c;
        }
    }
    if pivot < 0.0 {
        for c in component.iter_mut() {
            *c = -*c;
        }
    }
}

/// Eigen decomposition of a symmetric matrix by cyclic Jacobi rotations
///
/// Returns the eigenvalues and a matrix whose columns are the eigenvectors.
fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum::<f64>()
            .sqrt();
        if off <= TOLERANCE * scale.max(f64::MIN_POSITIVE) {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in v.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

/// Replace the fixed-length numeric descriptors not matching `config.except`
/// by a single `Real(k)` descriptor holding their principal components
///
/// `k` is `min(config.dimension, input dimension)`. Variable-length and
/// categorical descriptors are passed through with the excepted ones.
pub fn pca(dataset: DataSet, config: &PcaConfig) -> Result<DataSet> {
    let candidates = dataset.matching_names(&["*".to_string()], &config.except, None)?;
    let inputs: Vec<String> = candidates
        .into_iter()
        .filter(|n| matches!(dataset.layout().get(n).map(|d| d.ty), Some(DescriptorType::Real(_))))
        .collect();
    let passthrough: Vec<String> = dataset
        .layout()
        .names()
        .filter(|n| !inputs.iter().any(|i| i == n))
        .map(str::to_string)
        .collect();
    if passthrough.iter().any(|n| *n == config.result_name) {
        return Err(Error::SchemaOverlap(vec![config.result_name.clone()]));
    }

    let model = PcaModel::fit(&dataset, &inputs, config.dimension)?;
    let mut descriptors: Vec<Descriptor> = passthrough
        .iter()
        .filter_map(|n| dataset.layout().get(n).cloned())
        .collect();
    descriptors.push(Descriptor::new(
        config.result_name.clone(),
        DescriptorType::Real(model.dimension()),
    ));
    let layout = Layout::new(descriptors)?;

    let mut points = Vec::with_capacity(dataset.len());
    for point in dataset.iter() {
        let projected = model.project(point, dataset.layout())?;
        let values = layout
            .names()
            .map(|name| {
                if name == config.result_name {
                    Ok(Value::Real(projected.clone()))
                } else {
                    point
                        .value(dataset.layout(), name)
                        .cloned()
                        .ok_or_else(|| Error::UnknownDescriptor(name.to_string()))
                }
            })
            .collect::<Result<Vec<Value>>>()?;
        points.push(Point::new(point.id.clone(), values));
    }

    debug!(
        dataset = dataset.name(),
        inputs = inputs.len(),
        dimension = model.dimension(),
        "applied PCA"
    );
    DataSet::from_parts(dataset.name(), layout, points)
}
