use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tonematch_core::SampleType;
use tonematch_similarity::{MetricConfig, MetricWeights, DEFAULT_COMPRESSION_ALPHA, DEFAULT_QUANTITY};
use tonematch_transform::{PipelineConfig, DEFAULT_PCA_DIMENSION};

/// Default number of points per dataset shard
pub const DEFAULT_SAMPLES_IN_DATASET: usize = 2000;

/// How buckets are searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetMode {
    /// Every bucket from both sides is summed and searched once
    One,
    /// Each sample type is searched in its own bucket
    #[default]
    Many,
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetMode::One => f.write_str("one"),
            DatasetMode::Many => f.write_str("many"),
        }
    }
}

impl FromStr for DatasetMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one" => Ok(DatasetMode::One),
            "many" => Ok(DatasetMode::Many),
            other => Err(Error::InvalidConfig(format!("unknown dataset mode '{}'", other))),
        }
    }
}

/// Recommendation run settings
///
/// Every field has a default, so a profile only needs to list what it
/// overrides. Relative directories are resolved against the store root
/// passed to the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub weight_lowlevel: f32,
    pub weight_timbre: f32,
    pub weight_highlevel: f32,
    pub dataset_mode: DatasetMode,
    pub recommended_samples_number: usize,
    pub compressed_metric: bool,
    pub compression_alpha: f32,
    pub pca_dimension: usize,
    pub samples_in_dataset: usize,
    pub global_dataset_name: String,
    pub user_dataset_name: String,
    pub descriptors_directory: PathBuf,
    pub datasets_parts_directory: PathBuf,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            weight_lowlevel: 1.0,
            weight_timbre: 1.0,
            weight_highlevel: 1.0,
            dataset_mode: DatasetMode::Many,
            recommended_samples_number: DEFAULT_QUANTITY,
            compressed_metric: true,
            compression_alpha: DEFAULT_COMPRESSION_ALPHA,
            pca_dimension: DEFAULT_PCA_DIMENSION,
            samples_in_dataset: DEFAULT_SAMPLES_IN_DATASET,
            global_dataset_name: "audiq_dataset".to_string(),
            user_dataset_name: "user_dataset".to_string(),
            descriptors_directory: PathBuf::from("descriptors/"),
            datasets_parts_directory: PathBuf::from("datasets_parts/"),
        }
    }
}

impl RecommendConfig {
    /// Defaults overridden by a YAML profile
    pub fn from_profile(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|source| Error::Profile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_weights(mut self, lowlevel: f32, timbre: f32, highlevel: f32) -> Self {
        self.weight_lowlevel = lowlevel;
        self.weight_timbre = timbre;
        self.weight_highlevel = highlevel;
        self
    }

    pub fn with_mode(mut self, mode: DatasetMode) -> Self {
        self.dataset_mode = mode;
        self
    }

    pub fn with_quantity(mut self, quantity: usize) -> Self {
        self.recommended_samples_number = quantity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.weights().validate()?;
        if self.recommended_samples_number == 0 {
            return Err(Error::InvalidConfig("recommended_samples_number must be positive".into()));
        }
        if self.pca_dimension == 0 {
            return Err(Error::InvalidConfig("pca_dimension must be positive".into()));
        }
        if self.samples_in_dataset == 0 {
            return Err(Error::InvalidConfig("samples_in_dataset must be positive".into()));
        }
        if self.compressed_metric && !(self.compression_alpha.is_finite() && self.compression_alpha > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "compression_alpha must be positive, got {}",
                self.compression_alpha
            )));
        }
        if self.global_dataset_name.is_empty() || self.user_dataset_name.is_empty() {
            return Err(Error::InvalidConfig("dataset names must not be empty".into()));
        }
        Ok(())
    }

    pub fn weights(&self) -> MetricWeights {
        MetricWeights::new(self.weight_lowlevel, self.weight_timbre, self.weight_highlevel)
    }

    pub fn metric_config(&self) -> MetricConfig {
        MetricConfig {
            compressed: self.compressed_metric,
            alpha: self.compression_alpha,
            ..MetricConfig::default()
        }
        .with_weights(self.weights())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default().with_pca_dimension(self.pca_dimension)
    }

    /// `<root>/<user_dataset_name>_<type>.db`
    pub fn user_dataset_path(&self, root: &Path, ty: SampleType) -> PathBuf {
        dataset_path(root, &self.user_dataset_name, ty)
    }

    /// `<root>/<global_dataset_name>_<type>.db`
    pub fn global_dataset_path(&self, root: &Path, ty: SampleType) -> PathBuf {
        dataset_path(root, &self.global_dataset_name, ty)
    }

    pub fn descriptors_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.descriptors_directory)
    }

    pub fn parts_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.datasets_parts_directory)
    }

    /// Name given to user shards
    pub fn user_part_name(&self) -> String {
        format!("{}part", self.user_dataset_name)
    }
}

fn dataset_path(root: &Path, name: &str, ty: SampleType) -> PathBuf {
    root.join(format!("{}_{}.{}", name, ty, tonematch_storage::DATASET_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RecommendConfig::default();
        assert_eq!(config.dataset_mode, DatasetMode::Many);
        assert_eq!(config.recommended_samples_number, 30);
        assert_eq!(config.pca_dimension, 25);
        assert_eq!(config.samples_in_dataset, 2000);
        assert!(config.compressed_metric);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.user_dataset_path(Path::new("store"), SampleType::Vocal),
            Path::new("store").join("user_dataset_vocal.db")
        );
        assert_eq!(config.user_part_name(), "user_datasetpart");
    }

    #[test]
    fn test_profile_overrides_subset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        fs::write(&path, "dataset_mode: one\nweight_timbre: 0\nrecommended_samples_number: 5\n").unwrap();

        let config = RecommendConfig::from_profile(&path).unwrap();
        assert_eq!(config.dataset_mode, DatasetMode::One);
        assert_eq!(config.weight_timbre, 0.0);
        assert_eq!(config.weight_lowlevel, 1.0);
        assert_eq!(config.recommended_samples_number, 5);
        assert_eq!(config.global_dataset_name, "audiq_dataset");

        fs::write(&path, "dataset_mode: [oops]\n").unwrap();
        assert!(matches!(RecommendConfig::from_profile(&path), Err(Error::Profile { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RecommendConfig::default().with_weights(0.0, 0.0, 0.0).validate().is_err());
        assert!(RecommendConfig::default().with_weights(-1.0, 1.0, 1.0).validate().is_err());
        assert!(RecommendConfig::default().with_weights(f32::NAN, 1.0, 1.0).validate().is_err());
        assert!(RecommendConfig::default().with_quantity(0).validate().is_err());
        assert!(RecommendConfig::default().with_weights(0.0, 0.0, 2.0).validate().is_ok());

        let mut config = RecommendConfig::default();
        config.pca_dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("ONE".parse::<DatasetMode>().unwrap(), DatasetMode::One);
        assert_eq!(DatasetMode::Many.to_string(), "many");
        assert!("both".parse::<DatasetMode>().is_err());
    }
}
