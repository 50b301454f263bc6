//! Sample processing
//!
//! Audio decoding and classification happen outside this crate, behind the
//! [`FeatureExtractor`] and [`Classifier`] traits. This module walks a sample
//! directory, runs the collaborators on every audio file and turns the
//! resulting descriptor files into per-type user datasets.

use crate::config::RecommendConfig;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonematch_core::{Descriptors, SampleType, Value, SAMPLE_TYPES, TYPE_DESCRIPTOR};
use tonematch_storage::{codec, concatenate_datasets, merge_files, write_descriptors};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions handed to the extractor
pub const AUDIO_EXTENSIONS: [&str; 5] = ["wav", "mp3", "mp4a", "ogg", "aiff"];

/// Extension of the descriptor files written for processed samples
pub const SIGNATURE_EXTENSION: &str = "sig";

const HIGHLEVEL_NAMESPACE: &str = "highlevel.";

#[derive(Error, Debug)]
#[error("Extraction failed for {path}: {reason}")]
pub struct ExtractionError {
    pub path: PathBuf,
    pub reason: String,
}

impl ExtractionError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
#[error("Model {model} failed: {reason}")]
pub struct ClassifierError {
    pub model: String,
    pub reason: String,
}

impl ClassifierError {
    pub fn new(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

/// Turns one audio file into its low-level descriptors
pub trait FeatureExtractor {
    fn extract(&self, path: &Path) -> std::result::Result<Descriptors, ExtractionError>;
}

/// A high-level model: reads descriptors, returns `highlevel.*` tags
pub trait Classifier {
    fn name(&self) -> &str;

    fn classify(&self, descriptors: &Descriptors) -> std::result::Result<Descriptors, ClassifierError>;
}

/// Result of running one model on one sample
#[derive(Debug)]
pub struct ClassificationOutcome {
    pub model: String,
    /// Number of tags added on success
    pub result: std::result::Result<usize, ClassifierError>,
}

impl ClassificationOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The high-level models, run in stages
///
/// The type model runs first. Its `highlevel.type.value` tag selects the
/// next stage: vocal samples get the phrase models, percussion samples the
/// percussion models followed by the common ones, melody samples only the
/// common ones. Without a type model descriptors are left as extracted.
#[derive(Default)]
pub struct ModelSet {
    sample_type: Option<Box<dyn Classifier>>,
    phrase: Vec<Box<dyn Classifier>>,
    percussion: Vec<Box<dyn Classifier>>,
    common: Vec<Box<dyn Classifier>>,
}

impl ModelSet {
    pub fn new(sample_type: impl Classifier + 'static) -> Self {
        Self {
            sample_type: Some(Box::new(sample_type)),
            ..Self::default()
        }
    }

    pub fn with_phrase(mut self, model: impl Classifier + 'static) -> Self {
        self.phrase.push(Box::new(model));
        self
    }

    pub fn with_percussion(mut self, model: impl Classifier + 'static) -> Self {
        self.percussion.push(Box::new(model));
        self
    }

    pub fn with_common(mut self, model: impl Classifier + 'static) -> Self {
        self.common.push(Box::new(model));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sample_type.is_none()
    }

    /// Replace the sample's high-level tags with the models' output
    pub fn classify(&self, descriptors: &mut Descriptors) -> Vec<ClassificationOutcome> {
        let Some(type_model) = &self.sample_type else {
            return Vec::new();
        };
        descriptors.retain(|name, _| !name.starts_with(HIGHLEVEL_NAMESPACE));

        let mut outcomes = vec![run_model(type_model.as_ref(), descriptors)];
        let ty = match descriptors.get(TYPE_DESCRIPTOR) {
            Some(Value::String(label)) => SampleType::from_label(label),
            _ => None,
        };
        let stage: Vec<&dyn Classifier> = match ty {
            Some(SampleType::Vocal) => self.phrase.iter().map(|m| m.as_ref()).collect(),
            Some(SampleType::Percussion) => self
                .percussion
                .iter()
                .chain(&self.common)
                .map(|m| m.as_ref())
                .collect(),
            Some(SampleType::Melody) => self.common.iter().map(|m| m.as_ref()).collect(),
            None => Vec::new(),
        };
        for model in stage {
            outcomes.push(run_model(model, descriptors));
        }
        outcomes
    }
}

fn run_model(model: &dyn Classifier, descriptors: &mut Descriptors) -> ClassificationOutcome {
    let result = model.classify(descriptors).map(|tags| {
        let added = tags.len();
        descriptors.extend(tags);
        added
    });
    ClassificationOutcome {
        model: model.name().to_string(),
        result,
    }
}

/// Outcome of [`process_samples`]
#[derive(Debug, Default)]
pub struct ProcessingReport {
    /// Descriptor files written
    pub written: Vec<PathBuf>,
    /// Audio files whose extraction failed
    pub skipped: Vec<PathBuf>,
    /// Model stages that failed, over every sample
    pub classifier_failures: usize,
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| AUDIO_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Extract and classify every audio file under `samples_dir`
///
/// Each sample is written to `descriptors_dir/<id>.sig`, where the id is its
/// content hash (or file stem). Samples whose extraction fails are skipped.
pub fn process_samples(
    extractor: &dyn FeatureExtractor,
    models: &ModelSet,
    samples_dir: &Path,
    descriptors_dir: &Path,
) -> Result<ProcessingReport> {
    fs::create_dir_all(descriptors_dir)?;
    let mut report = ProcessingReport::default();

    let audio_files = WalkDir::new(samples_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_audio_file(e.path()));

    for entry in audio_files {
        let path = entry.path();
        let mut descriptors = match extractor.extract(path) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!(error = %e, "skipping sample");
                report.skipped.push(path.to_path_buf());
                continue;
            }
        };

        for outcome in models.classify(&mut descriptors) {
            if let Err(e) = &outcome.result {
                warn!(sample = %path.display(), error = %e, "model produced no tags");
                report.classifier_failures += 1;
            }
        }

        let id = codec::point_id(path, &descriptors)?;
        let target = descriptors_dir.join(format!("{}.{}", id, SIGNATURE_EXTENSION));
        write_descriptors(&target, &descriptors)?;
        debug!(sample = %path.display(), descriptors = descriptors.len(), "processed sample");
        report.written.push(target);
    }

    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        classifier_failures = report.classifier_failures,
        "processed samples"
    );
    Ok(report)
}

/// Build the per-type user datasets under `store_root` from raw samples
///
/// Descriptor files from a previous session are removed first. Returns the
/// processing report and the dataset files written.
pub fn samples_to_datasets(
    extractor: &dyn FeatureExtractor,
    models: &ModelSet,
    samples_dir: &Path,
    store_root: &Path,
    config: &RecommendConfig,
) -> Result<(ProcessingReport, Vec<PathBuf>)> {
    let descriptors_dir = config.descriptors_dir(store_root);
    if descriptors_dir.exists() {
        fs::remove_dir_all(&descriptors_dir)?;
    }
    let report = process_samples(extractor, models, samples_dir, &descriptors_dir)?;
    let datasets = descriptors_to_datasets(&descriptors_dir, store_root, config)?;
    Ok((report, datasets))
}

/// Shard the descriptor files of `descriptors_dir` and rebuild the per-type
/// user datasets under `store_root`
///
/// Returns the dataset files written. A type without samples leaves no file
/// behind, so a stale dataset from a previous session is removed.
pub fn descriptors_to_datasets(
    descriptors_dir: &Path,
    store_root: &Path,
    config: &RecommendConfig,
) -> Result<Vec<PathBuf>> {
    let parts_dir = config.parts_dir(store_root);
    merge_files(
        descriptors_dir,
        &parts_dir,
        &config.user_part_name(),
        config.samples_in_dataset,
    )?;

    let mut datasets = Vec::new();
    for ty in SAMPLE_TYPES {
        let target = config.user_dataset_path(store_root, ty);
        if target.exists() {
            fs::remove_file(&target)?;
        }
        if concatenate_datasets(&parts_dir.join(ty.label()), &target)? {
            datasets.push(target);
        }
    }
    Ok(datasets)
}
