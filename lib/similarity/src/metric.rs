//! Distance functions over dataset points
//!
//! Every metric is bound to a [`Layout`] when it is constructed: descriptor
//! names are resolved to value indices once, so evaluating a pair of points
//! is a plain index lookup. All metrics return a distance `>= 0`, `0.0` for
//! identical inputs.

use std::fmt;
use tonematch_core::{DescriptorType, Error, Layout, Point, Result};

/// A distance between two points of the layout the metric was built for
pub trait DistanceFunction: Send + Sync + fmt::Debug {
    fn distance(&self, a: &Point, b: &Point) -> f32;

    /// Short name used in explanations and logs
    fn name(&self) -> &str;
}

impl<T: DistanceFunction + ?Sized> DistanceFunction for Box<T> {
    fn distance(&self, a: &Point, b: &Point) -> f32 {
        (**self).distance(a, b)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

fn real_index(layout: &Layout, name: &str) -> Result<(usize, usize)> {
    let index = layout
        .index_of(name)
        .ok_or_else(|| Error::UnknownDescriptor(name.to_string()))?;
    match layout.descriptors()[index].ty {
        DescriptorType::Real(dim) => Ok((index, dim)),
        ty => Err(Error::InvalidConfig(format!(
            "descriptor {} is {}, expected fixed-length numbers",
            name, ty
        ))),
    }
}

#[inline]
fn real(point: &Point, index: usize) -> &[f32] {
    point.values.get(index).and_then(|v| v.as_real()).unwrap_or(&[])
}

/// Euclidean distance over the concatenation of fixed-length descriptors
#[derive(Debug, Clone)]
pub struct Euclidean {
    indices: Vec<usize>,
}

impl Euclidean {
    pub fn new<S: AsRef<str>>(layout: &Layout, descriptors: &[S]) -> Result<Self> {
        let indices = descriptors
            .iter()
            .map(|d| real_index(layout, d.as_ref()).map(|(i, _)| i))
            .collect::<Result<_>>()?;
        Ok(Self { indices })
    }
}

impl DistanceFunction for Euclidean {
    fn distance(&self, a: &Point, b: &Point) -> f32 {
        self.indices
            .iter()
            .flat_map(|&i| real(a, i).iter().zip(real(b, i)))
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }

    fn name(&self) -> &str {
        "euclidean"
    }
}

/// Symmetric Kullback-Leibler divergence between two single Gaussians
///
/// Each point carries a mean vector of length `d` and its covariance and
/// inverse covariance flattened row-major (`d * d`). The result is
/// `0.5 * (tr(S1 iS2) + tr(S2 iS1) + (m1 - m2)' (iS1 + iS2) (m1 - m2)) - d`.
/// Non-finite results (singular covariances) map to `f32::INFINITY`.
#[derive(Debug, Clone)]
pub struct KullbackLeibler {
    mean: usize,
    cov: usize,
    icov: usize,
    dim: usize,
}

impl KullbackLeibler {
    pub fn new(layout: &Layout, mean: &str, cov: &str, icov: &str) -> Result<Self> {
        let (mean, dim) = real_index(layout, mean)?;
        let (cov_index, cov_dim) = real_index(layout, cov)?;
        let (icov_index, icov_dim) = real_index(layout, icov)?;
        if cov_dim != dim * dim || icov_dim != dim * dim {
            return Err(Error::InvalidConfig(format!(
                "covariance of size {}/{} does not match a mean of size {}",
                cov_dim, icov_dim, dim
            )));
        }
        Ok(Self {
            mean,
            cov: cov_index,
            icov: icov_index,
            dim,
        })
    }

    /// Build from a descriptor prefix holding `.mean`, `.cov` and `.icov`
    pub fn from_prefix(layout: &Layout, prefix: &str) -> Result<Self> {
        Self::new(
            layout,
            &format!("{}.mean", prefix),
            &format!("{}.cov", prefix),
            &format!("{}.icov", prefix),
        )
    }
}

/// `tr(A B)` for square matrices stored row-major
fn trace_of_product(a: &[f32], b: &[f32], dim: usize) -> f64 {
    let mut trace = 0.0;
    for i in 0..dim {
        for j in 0..dim {
            trace += f64::from(a[i * dim + j]) * f64::from(b[j * dim + i]);
        }
    }
    trace
}

impl DistanceFunction for KullbackLeibler {
    fn distance(&self, a: &Point, b: &Point) -> f32 {
        let d = self.dim;
        let (m1, m2) = (real(a, self.mean), real(b, self.mean));
        let (c1, c2) = (real(a, self.cov), real(b, self.cov));
        let (i1, i2) = (real(a, self.icov), real(b, self.icov));
        if m1.len() != d || m2.len() != d || c1.len() != d * d || c2.len() != d * d || i1.len() != d * d || i2.len() != d * d {
            return f32::INFINITY;
        }

        let diff: Vec<f64> = m1.iter().zip(m2).map(|(x, y)| f64::from(*x) - f64::from(*y)).collect();
        let mut mahalanobis = 0.0;
        for r in 0..d {
            for c in 0..d {
                let w = f64::from(i1[r * d + c]) + f64::from(i2[r * d + c]);
                mahalanobis += diff[r] * w * diff[c];
            }
        }

        let value = 0.5 * (trace_of_product(c1, i2, d) + trace_of_product(c2, i1, d) + mahalanobis) - d as f64;
        if value.is_finite() {
            value.max(0.0) as f32
        } else {
            f32::INFINITY
        }
    }

    fn name(&self) -> &str {
        "kullback-leibler"
    }
}

/// One minus the weighted Pearson correlation of the concatenated descriptors
///
/// Every component of a descriptor carries that descriptor's weight. The
/// result lies in `[0, 2]`. When either side has no variance the distance is
/// `0.0` for identical inputs and `1.0` otherwise; an empty descriptor set
/// always yields `0.0`.
#[derive(Debug, Clone)]
pub struct WeightedPearson {
    terms: Vec<(usize, f64)>,
}

impl WeightedPearson {
    pub fn new(layout: &Layout, weights: &[(String, f32)]) -> Result<Self> {
        let terms = weights
            .iter()
            .map(|(name, weight)| {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "descriptor {} has invalid weight {}",
                        name, weight
                    )));
                }
                real_index(layout, name).map(|(i, _)| (i, f64::from(*weight)))
            })
            .collect::<Result<_>>()?;
        Ok(Self { terms })
    }

    /// Number of weighted descriptors
    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn weighted<'a>(&'a self, a: &'a Point, b: &'a Point) -> impl Iterator<Item = (f64, f64, f64)> + 'a {
        self.terms.iter().flat_map(move |&(i, w)| {
            real(a, i)
                .iter()
                .zip(real(b, i))
                .map(move |(x, y)| (w, f64::from(*x), f64::from(*y)))
        })
    }
}

impl DistanceFunction for WeightedPearson {
    fn distance(&self, a: &Point, b: &Point) -> f32 {
        let (mut sw, mut sx, mut sy) = (0.0, 0.0, 0.0);
        for (w, x, y) in self.weighted(a, b) {
            sw += w;
            sx += w * x;
            sy += w * y;
        }
        if sw <= 0.0 {
            return 0.0;
        }
        let (mx, my) = (sx / sw, sy / sw);

        let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
        let mut identical = true;
        for (w, x, y) in self.weighted(a, b) {
            cov += w * (x - mx) * (y - my);
            vx += w * (x - mx) * (x - mx);
            vy += w * (y - my) * (y - my);
            identical &= x == y;
        }
        if identical {
            return 0.0;
        }
        if vx <= 0.0 || vy <= 0.0 {
            return 1.0;
        }
        let r = (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0);
        (1.0 - r) as f32
    }

    fn name(&self) -> &str {
        "weighted-pearson"
    }
}

/// Bounded transform of an inner metric: `1 - exp(-alpha * d)`
#[derive(Debug)]
pub struct ExponentialCompress<M> {
    inner: M,
    alpha: f32,
}

impl<M: DistanceFunction> ExponentialCompress<M> {
    pub fn new(inner: M, alpha: f32) -> Result<Self> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(Error::InvalidConfig(format!("compression alpha must be positive, got {}", alpha)));
        }
        Ok(Self { inner, alpha })
    }
}

impl<M: DistanceFunction> DistanceFunction for ExponentialCompress<M> {
    fn distance(&self, a: &Point, b: &Point) -> f32 {
        let raw = self.inner.distance(a, b);
        if raw.is_nan() {
            return raw;
        }
        1.0 - (-self.alpha * raw).exp()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// A named, weighted component of a [`LinearCombination`]
#[derive(Debug)]
pub struct Term {
    pub label: String,
    pub weight: f32,
    pub metric: Box<dyn DistanceFunction>,
}

/// Weighted sum of component metrics
///
/// A component with weight `0.0` is never evaluated and contributes exactly
/// `0.0`.
#[derive(Debug, Default)]
pub struct LinearCombination {
    terms: Vec<Term>,
}

impl LinearCombination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: impl Into<String>, weight: f32, metric: Box<dyn DistanceFunction>) -> Result<()> {
        let label = label.into();
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "weight of {} must be a non-negative number, got {}",
                label, weight
            )));
        }
        self.terms.push(Term { label, weight, metric });
        Ok(())
    }

    pub fn with(mut self, label: impl Into<String>, weight: f32, metric: Box<dyn DistanceFunction>) -> Result<Self> {
        self.add(label, weight, metric)?;
        Ok(self)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Weighted contribution of every component, in insertion order
    pub fn explain(&self, a: &Point, b: &Point) -> Vec<(&str, f32)> {
        self.terms
            .iter()
            .map(|t| (t.label.as_str(), weighted(t, a, b)))
            .collect()
    }
}

#[inline]
fn weighted(term: &Term, a: &Point, b: &Point) -> f32 {
    if term.weight == 0.0 {
        0.0
    } else {
        term.weight * term.metric.distance(a, b)
    }
}

impl DistanceFunction for LinearCombination {
    fn distance(&self, a: &Point, b: &Point) -> f32 {
        self.terms.iter().map(|t| weighted(t, a, b)).sum()
    }

    fn name(&self) -> &str {
        "linear-combination"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonematch_core::{DataSet, Descriptors, Value};

    fn gaussian(mean: Vec<f32>, var: f32) -> Descriptors {
        let mut d = Descriptors::new();
        d.insert("lowlevel.mfcc.mean".into(), Value::Real(mean));
        d.insert("lowlevel.mfcc.cov".into(), Value::Real(vec![var, 0.0, 0.0, var]));
        d.insert("lowlevel.mfcc.icov".into(), Value::Real(vec![1.0 / var, 0.0, 0.0, 1.0 / var]));
        d.insert("pca".into(), Value::Real(vec![0.0, 0.0]));
        d
    }

    fn pair(a: Descriptors, b: Descriptors) -> DataSet {
        DataSet::from_descriptors("pair", vec![("a".to_string(), a), ("b".to_string(), b)]).unwrap()
    }

    fn points(ds: &DataSet) -> (&Point, &Point) {
        (ds.point("a").unwrap(), ds.point("b").unwrap())
    }

    #[test]
    fn test_euclidean() {
        let mut a = gaussian(vec![0.0, 0.0], 1.0);
        a.insert("pca".into(), Value::Real(vec![0.0, 0.0]));
        let mut b = gaussian(vec![0.0, 0.0], 1.0);
        b.insert("pca".into(), Value::Real(vec![3.0, 4.0]));
        let ds = pair(a, b);
        let metric = Euclidean::new(ds.layout(), &["pca"]).unwrap();
        let (a, b) = points(&ds);
        assert!((metric.distance(a, b) - 5.0).abs() < 1e-6);
        assert_eq!(metric.distance(a, a), 0.0);
        assert!(Euclidean::new(ds.layout(), &["missing"]).is_err());
    }

    #[test]
    fn test_kullback_leibler_gaussians() {
        let ds = pair(gaussian(vec![0.0, 0.0], 1.0), gaussian(vec![1.0, 0.0], 1.0));
        let metric = KullbackLeibler::from_prefix(ds.layout(), "lowlevel.mfcc").unwrap();
        let (a, b) = points(&ds);
        // identity covariances: 0.5 * (2 + 2 + 2) - 2
        assert!((metric.distance(a, b) - 1.0).abs() < 1e-6);
        assert_eq!(metric.distance(a, a), 0.0);
        assert_eq!(metric.distance(a, b), metric.distance(b, a));
    }

    #[test]
    fn test_kullback_leibler_rejects_bad_shapes() {
        let mut a = gaussian(vec![0.0, 0.0], 1.0);
        a.insert("lowlevel.mfcc.cov".into(), Value::Real(vec![1.0, 0.0, 0.0]));
        let mut b = gaussian(vec![0.0, 0.0], 1.0);
        b.insert("lowlevel.mfcc.cov".into(), Value::Real(vec![1.0, 0.0, 0.0]));
        let ds = pair(a, b);
        assert!(matches!(
            KullbackLeibler::from_prefix(ds.layout(), "lowlevel.mfcc"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_weighted_pearson() {
        let tags = |x: [f32; 3]| {
            let mut d = Descriptors::new();
            d.insert("highlevel.bass.all.bass".into(), Value::scalar(x[0]));
            d.insert("highlevel.bass.all.no_bass".into(), Value::scalar(x[1]));
            d.insert("highlevel.synth.all.synth".into(), Value::scalar(x[2]));
            d
        };
        let weights: Vec<(String, f32)> = ["highlevel.bass.all.bass", "highlevel.bass.all.no_bass", "highlevel.synth.all.synth"]
            .iter()
            .map(|n| (n.to_string(), 1.0))
            .collect();

        let correlated = pair(tags([0.1, 0.5, 0.9]), tags([0.2, 0.6, 1.0]));
        let metric = WeightedPearson::new(correlated.layout(), &weights).unwrap();
        let (a, b) = points(&correlated);
        assert!(metric.distance(a, b).abs() < 1e-6);

        let anti = pair(tags([0.1, 0.5, 0.9]), tags([0.9, 0.5, 0.1]));
        let (a, b) = points(&anti);
        assert!((metric.distance(a, b) - 2.0).abs() < 1e-6);

        let flat = pair(tags([0.5, 0.5, 0.5]), tags([0.1, 0.5, 0.9]));
        let (a, b) = points(&flat);
        assert_eq!(metric.distance(a, b), 1.0);
        assert_eq!(metric.distance(a, a), 0.0);

        let empty = WeightedPearson::new(flat.layout(), &[]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.distance(a, b), 0.0);
    }

    #[test]
    fn test_exponential_compress_bounds() {
        let mut a = gaussian(vec![0.0, 0.0], 1.0);
        a.insert("pca".into(), Value::Real(vec![0.0, 0.0]));
        let mut b = gaussian(vec![0.0, 0.0], 1.0);
        b.insert("pca".into(), Value::Real(vec![300.0, 400.0]));
        let ds = pair(a, b);
        let (a, b) = points(&ds);

        let compressed = ExponentialCompress::new(Euclidean::new(ds.layout(), &["pca"]).unwrap(), 0.01).unwrap();
        let d = compressed.distance(a, b);
        assert!((d - (1.0 - (-5.0_f32).exp())).abs() < 1e-6);
        assert!(d < 1.0);
        assert_eq!(compressed.distance(a, a), 0.0);
        assert!(ExponentialCompress::new(Euclidean::new(ds.layout(), &["pca"]).unwrap(), 0.0).is_err());
    }

    #[test]
    fn test_zero_weight_term_contributes_nothing() {
        let ds = pair(gaussian(vec![0.0, 0.0], 1.0), gaussian(vec![5.0, 5.0], 2.0));
        let (a, b) = points(&ds);
        let metric = LinearCombination::new()
            .with("lowlevel", 1.0, Box::new(Euclidean::new(ds.layout(), &["pca"]).unwrap()))
            .unwrap()
            .with(
                "timbre",
                0.0,
                Box::new(KullbackLeibler::from_prefix(ds.layout(), "lowlevel.mfcc").unwrap()),
            )
            .unwrap();
        assert_eq!(metric.distance(a, b), 0.0);
        assert_eq!(metric.explain(a, b), vec![("lowlevel", 0.0), ("timbre", 0.0)]);
        assert!(LinearCombination::new()
            .with("bad", -1.0, Box::new(Euclidean::new(ds.layout(), &["pca"]).unwrap()))
            .is_err());
    }
}
