//! Dataset shards
//!
//! Descriptor files are bucketed by sample type and packed into shards of a
//! bounded number of points, laid out as `parts_dir/<type>/<type>_<part><n>.db`.
//! A whole bucket is then rebuilt by concatenating its shards.

use crate::codec::{is_descriptor_file, read_sample};
use crate::dataset_file::{load_dataset, save_dataset};
use crate::Result;
use ahash::AHashSet;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tonematch_core::{merge, DataSet, DescriptorKind, Descriptors, SampleType, Value, SAMPLE_TYPES, TYPE_DESCRIPTOR};
use tonematch_transform::{fix_length, remove_variable_length};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extension of dataset files
pub const DATASET_EXTENSION: &str = "db";

/// Outcome of [`merge_files`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    /// Shards written, in order
    pub shards: Vec<PathBuf>,
    /// Points stored per bucket
    pub points: BTreeMap<SampleType, usize>,
    /// Descriptor files left out
    pub skipped: usize,
}

/// Remove and recreate `parts_dir/<type>` for every sample type
pub fn recreate_dirs(parts_dir: &Path) -> Result<()> {
    for ty in SAMPLE_TYPES {
        let dir = parts_dir.join(ty.label());
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Path of the `index`-th shard of a bucket
pub fn shard_path(parts_dir: &Path, ty: SampleType, part_name: &str, index: usize) -> PathBuf {
    parts_dir
        .join(ty.label())
        .join(format!("{}_{}{}.{}", ty, part_name, index, DATASET_EXTENSION))
}

/// Descriptor files directly inside `dir`, sorted by name
pub fn descriptor_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_descriptor_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Bucket every descriptor file of `descriptors_dir` by type and write shards
/// of at most `samples_per_dataset` points
///
/// Unreadable files and files without a known type are skipped with a
/// warning. Each shard has its variable-length descriptors removed and its
/// remaining lengths fixed before it is saved.
pub fn merge_files(
    descriptors_dir: &Path,
    parts_dir: &Path,
    part_name: &str,
    samples_per_dataset: usize,
) -> Result<ShardReport> {
    recreate_dirs(parts_dir)?;
    let capacity = samples_per_dataset.max(1);
    let mut report = ShardReport::default();
    let mut buckets: BTreeMap<SampleType, Vec<(String, Descriptors)>> = BTreeMap::new();
    let mut counters: BTreeMap<SampleType, usize> = BTreeMap::new();

    for path in descriptor_files(descriptors_dir) {
        let (id, descriptors) = match read_sample(&path) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable descriptor file");
                report.skipped += 1;
                continue;
            }
        };
        let Some(ty) = sample_type(&descriptors) else {
            warn!(path = %path.display(), "skipping descriptor file without a known sample type");
            report.skipped += 1;
            continue;
        };

        let bucket = buckets.entry(ty).or_default();
        bucket.push((id, descriptors));
        if bucket.len() >= capacity {
            let samples = std::mem::take(bucket);
            flush(parts_dir, part_name, ty, samples, &mut counters, &mut report)?;
        }
    }

    for (ty, samples) in buckets {
        if !samples.is_empty() {
            flush(parts_dir, part_name, ty, samples, &mut counters, &mut report)?;
        }
    }

    info!(
        shards = report.shards.len(),
        skipped = report.skipped,
        "merged descriptor files into shards"
    );
    Ok(report)
}

fn sample_type(descriptors: &Descriptors) -> Option<SampleType> {
    match descriptors.get(TYPE_DESCRIPTOR) {
        Some(Value::String(label)) => SampleType::from_label(label),
        _ => None,
    }
}

fn flush(
    parts_dir: &Path,
    part_name: &str,
    ty: SampleType,
    samples: Vec<(String, Descriptors)>,
    counters: &mut BTreeMap<SampleType, usize>,
    report: &mut ShardReport,
) -> Result<()> {
    let index = counters.entry(ty).or_insert(0);
    let path = shard_path(parts_dir, ty, part_name, *index);
    *index += 1;

    let (samples, skipped) = consistent_samples(samples);
    report.skipped += skipped;
    let dataset = DataSet::from_descriptors(format!("{}_{}", ty, part_name), samples)?;
    let dataset = remove_variable_length(dataset)?;
    let dataset = fix_length(dataset, &BTreeMap::new())?;

    let points = dataset.len();
    if save_dataset(&dataset, &path)? {
        debug!(path = %path.display(), points, "wrote shard");
        *report.points.entry(ty).or_insert(0) += points;
        report.shards.push(path);
    }
    Ok(())
}

/// Keep the samples whose descriptor names and kinds match the first one,
/// dropping repeated identifiers
fn consistent_samples(samples: Vec<(String, Descriptors)>) -> (Vec<(String, Descriptors)>, usize) {
    let Some((_, first)) = samples.first() else {
        return (samples, 0);
    };
    let signature: Vec<(String, DescriptorKind)> = first.iter().map(|(k, v)| (k.clone(), v.kind())).collect();

    let mut seen = AHashSet::new();
    let mut kept = Vec::with_capacity(samples.len());
    let mut skipped = 0;
    for (id, descriptors) in samples {
        let matches = descriptors.len() == signature.len()
            && descriptors
                .iter()
                .zip(&signature)
                .all(|((k, v), (name, kind))| k == name && v.kind() == *kind);
        if !matches {
            warn!(point = id.as_str(), "skipping sample whose descriptors differ from its shard");
            skipped += 1;
        } else if !seen.insert(id.clone()) {
            warn!(point = id.as_str(), "skipping repeated sample");
            skipped += 1;
        } else {
            kept.push((id, descriptors));
        }
    }
    (kept, skipped)
}

/// Dataset files directly inside `dir`, sorted by name
pub fn dataset_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path().extension().and_then(|x| x.to_str()) == Some(DATASET_EXTENSION)
        })
        .map(|e| e.into_path())
        .collect()
}

/// Concatenate every shard of `parts_dir` and save the result to `dataset_path`
///
/// Shards with identical layouts are appended. When a shard's layout drifted
/// (different fixed lengths, missing descriptors), the union falls back to a
/// schema-intersection sum. Returns whether a file was written.
pub fn concatenate_datasets(parts_dir: &Path, dataset_path: &Path) -> Result<bool> {
    let mut combined: Option<DataSet> = None;
    for path in dataset_files(parts_dir) {
        let shard = load_dataset(&path)?;
        combined = Some(match combined {
            None => shard,
            Some(acc) => {
                let compatible = acc.layout() == shard.layout() && !shard.iter().any(|p| acc.contains(&p.id));
                if compatible {
                    merge::append(acc, shard)?
                } else {
                    warn!(shard = %path.display(), "shard layout or identifiers differ, summing instead");
                    merge::sum(acc, shard)?
                }
            }
        });
    }

    let Some(mut dataset) = combined else {
        info!(parts = %parts_dir.display(), "no shards to concatenate");
        return Ok(false);
    };
    if let Some(stem) = dataset_path.file_stem().and_then(|s| s.to_str()) {
        dataset.set_name(stem);
    }
    save_dataset(&dataset, dataset_path)
}
