//! Default preparation pipeline
//!
//! ```text
//! RemoveVariableLength -> FixLength -> Enumerate
//!   -> Select(metadata | timbre | highlevel | key/scale | rest)
//!   -> rest: Cleaner -> Normalize -> PCA
//!   -> ColumnMerge(all blocks)
//! ```

use crate::cleaner::clean;
use crate::enumerate::enumerate;
use crate::length::{fix_length, remove_variable_length};
use crate::normalize::{normalize, NormalizeConfig, Normalization};
use crate::pca::{pca, PcaConfig, DEFAULT_PCA_DIMENSION, PCA_DESCRIPTOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tonematch_core::{merge, DataSet, DescriptorKind, Result};
use tracing::debug;

/// Descriptor groups and stage parameters of [`prepare`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub metadata: Vec<String>,
    pub timbre: Vec<String>,
    pub highlevel: Vec<String>,
    pub normalization: Normalization,
    pub pca_dimension: usize,
    pub pca_name: String,
    /// Explicit lengths for ragged numeric descriptors
    pub fixed_lengths: BTreeMap<String, usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata: vec!["metadata.*".to_string()],
            timbre: vec!["lowlevel.mfcc.*".to_string()],
            highlevel: vec!["highlevel.*".to_string()],
            normalization: Normalization::MinMax,
            pca_dimension: DEFAULT_PCA_DIMENSION,
            pca_name: PCA_DESCRIPTOR.to_string(),
            fixed_lengths: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn with_pca_dimension(mut self, dimension: usize) -> Self {
        self.pca_dimension = dimension;
        self
    }
}

/// Run the default pipeline on a merged raw dataset
///
/// The result keeps the metadata, timbre, high-level and key/scale blocks
/// untouched and replaces the remaining numeric descriptors by the PCA block.
pub fn prepare(dataset: DataSet, config: &PipelineConfig) -> Result<DataSet> {
    let name = dataset.name().to_string();
    let points = dataset.len();

    let dataset = remove_variable_length(dataset)?;
    let dataset = fix_length(dataset, &config.fixed_lengths)?;
    let (dataset, codebook) = enumerate(dataset, &config.metadata)?;

    let metadata = dataset.project(&config.metadata, true)?;
    let timbre = dataset.project(&config.timbre, true)?;
    let highlevel = dataset.project(&config.highlevel, true)?;

    let grouped: Vec<String> = config
        .metadata
        .iter()
        .chain(&config.timbre)
        .chain(&config.highlevel)
        .cloned()
        .collect();
    let key_scale_names = dataset.matching_names(&["*".to_string()], &grouped, Some(DescriptorKind::Enum))?;
    let key_scale = dataset.project_names(&key_scale_names)?;

    let mut others = grouped;
    others.extend(key_scale_names);
    let rest = dataset.remove_descriptors(&others, true)?;
    drop(dataset);

    let rest = clean(rest)?;
    let rest = normalize(
        rest,
        &NormalizeConfig {
            method: config.normalization,
            except: config.timbre.iter().chain(&config.highlevel).cloned().collect(),
        },
    )?;
    let reduced = pca(
        rest,
        &PcaConfig {
            dimension: config.pca_dimension,
            except: Vec::new(),
            result_name: config.pca_name.clone(),
        },
    )?;

    let mut prepared = merge::merge_all(vec![metadata, timbre, highlevel, key_scale, reduced])?;
    prepared.set_name(name);
    debug!(
        dataset = prepared.name(),
        points,
        descriptors = prepared.layout().len(),
        enumerated = codebook.len(),
        "prepared dataset"
    );
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonematch_core::{DescriptorType, Descriptors, Value};

    fn sample(i: usize, key: &str) -> (String, Descriptors) {
        let x = i as f32;
        let mut d = Descriptors::new();
        d.insert("metadata.tags.file_name".into(), Value::from(format!("s{}.wav", i)));
        d.insert("lowlevel.mfcc.mean".into(), Value::Real(vec![x, 1.0]));
        d.insert("lowlevel.loudness".into(), Value::scalar(x * 2.0));
        d.insert("lowlevel.centroid".into(), Value::Real(vec![x, 10.0 - x, (x * x) % 5.0]));
        d.insert("lowlevel.silence".into(), Value::scalar(0.0));
        d.insert("lowlevel.frames".into(), Value::Real(vec![1.0; i + 1]));
        d.insert("tonal.key_key".into(), Value::from(key));
        d.insert("highlevel.type.value".into(), Value::from("vocal"));
        d.insert("highlevel.bass.all.bass".into(), Value::scalar(0.1 * x));
        (format!("p{}", i), d)
    }

    fn raw() -> DataSet {
        DataSet::from_descriptors(
            "merged",
            (0..6).map(|i| sample(i, if i % 2 == 0 { "C" } else { "A" })),
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_groups_and_reduces() {
        let config = PipelineConfig::default().with_pca_dimension(2);
        let prepared = prepare(raw(), &config).unwrap();

        assert_eq!(prepared.name(), "merged");
        assert_eq!(prepared.len(), 6);
        assert_eq!(
            prepared.layout().names().collect::<Vec<_>>(),
            vec![
                "highlevel.bass.all.bass",
                "highlevel.type.value",
                "lowlevel.mfcc.mean",
                "metadata.tags.file_name",
                "pca",
                "tonal.key_key",
            ]
        );
        assert_eq!(prepared.layout().get("pca").unwrap().ty, DescriptorType::Real(2));
        assert_eq!(prepared.layout().get("tonal.key_key").unwrap().ty, DescriptorType::Enum);
        assert_eq!(prepared.layout().get("highlevel.type.value").unwrap().ty, DescriptorType::Enum);
        // timbre and metadata blocks are untouched
        assert_eq!(prepared.value("p3", "lowlevel.mfcc.mean"), Some(&Value::Real(vec![3.0, 1.0])));
        assert_eq!(prepared.label("p3", "metadata.tags.file_name"), "s3.wav");
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let config = PipelineConfig::default();
        let a = prepare(raw(), &config).unwrap();
        let b = prepare(raw(), &config).unwrap();
        assert_eq!(a.layout(), b.layout());
        assert_eq!(a.points(), b.points());
    }

    #[test]
    fn test_enumeration_stable_under_merge_order() {
        let rows: Vec<(String, Descriptors)> = (0..6).map(|i| sample(i, ["E", "C", "G"][i % 3])).collect();
        let forward = DataSet::from_descriptors("m", rows.clone()).unwrap();
        let backward = DataSet::from_descriptors("m", rows.into_iter().rev()).unwrap();

        let config = PipelineConfig::default();
        let forward = prepare(forward, &config).unwrap();
        let backward = prepare(backward, &config).unwrap();
        for id in forward.point_ids() {
            assert_eq!(
                forward.value(&id, "tonal.key_key"),
                backward.value(&id, "tonal.key_key")
            );
        }
    }

    #[test]
    fn test_prepare_without_lowlevel_block() {
        let rows = (0..3).map(|i| {
            let mut d = Descriptors::new();
            d.insert("metadata.tags.file_name".into(), Value::from(format!("s{}.wav", i)));
            d.insert("lowlevel.mfcc.mean".into(), Value::Real(vec![i as f32]));
            (format!("p{}", i), d)
        });
        let prepared = prepare(DataSet::from_descriptors("small", rows).unwrap(), &PipelineConfig::default()).unwrap();
        assert_eq!(prepared.layout().get("pca").unwrap().ty, DescriptorType::Real(0));
        assert_eq!(prepared.len(), 3);
    }
}
