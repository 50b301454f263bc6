// Integration tests for tonematch
use ahash::AHashSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tonematch_core::{merge, DataSet, Descriptors, Error, SampleType, Value, FILENAME_DESCRIPTOR, TYPE_DESCRIPTOR};
use tonematch_recommend::processing::descriptors_to_datasets;
use tonematch_recommend::{find_similar, recommend, DatasetMode, RecommendConfig};
use tonematch_similarity::{nn_search, Euclidean};
use tonematch_storage::{concatenate_datasets, load_dataset, merge_files, save_dataset, write_descriptors};
use tonematch_transform::{enumerate_with, Codebook};

fn mfcc_sample(mfcc: Vec<f32>, ty: &str) -> Descriptors {
    let mut d = Descriptors::new();
    d.insert("lowlevel.mfcc".to_string(), Value::Real(mfcc));
    d.insert(TYPE_DESCRIPTOR.to_string(), Value::from(ty));
    d
}

/// A sample with every descriptor group the recommender compares
fn full_sample(name: &str, x: f32, mfcc_shift: f32, tag: f32) -> (String, Descriptors) {
    let mut d = Descriptors::new();
    d.insert(FILENAME_DESCRIPTOR.to_string(), Value::from(format!("{}.wav", name)));
    d.insert("lowlevel.loudness".to_string(), Value::scalar(x));
    d.insert("lowlevel.spectral_centroid".to_string(), Value::scalar(2.0 * x + 1.0));
    d.insert("lowlevel.mfcc.mean".to_string(), Value::Real(vec![x + mfcc_shift, 1.0]));
    d.insert("lowlevel.mfcc.cov".to_string(), Value::Real(vec![1.0, 0.0, 0.0, 1.0]));
    d.insert("lowlevel.mfcc.icov".to_string(), Value::Real(vec![1.0, 0.0, 0.0, 1.0]));
    d.insert("tonal.key_key".to_string(), Value::from(if x > 4.0 { "A" } else { "C" }));
    d.insert(TYPE_DESCRIPTOR.to_string(), Value::from("vocal"));
    d.insert("highlevel.bass.all.bass".to_string(), Value::scalar(tag));
    d.insert("highlevel.bass.all.not_bass".to_string(), Value::scalar(1.0 - tag));
    (name.to_string(), d)
}

fn full_dataset(name: &str, points: &[(&str, f32)]) -> DataSet {
    DataSet::from_descriptors(name, points.iter().map(|&(id, x)| full_sample(id, x, 0.0, 0.2))).unwrap()
}

#[test]
fn test_sum_keeps_first_and_intersects_layout() {
    let mut extra = mfcc_sample(vec![1.0, 0.0], "vocal");
    extra.insert("lowlevel.loudness".to_string(), Value::scalar(0.3));
    let a = DataSet::from_descriptors("a", vec![("x".to_string(), extra)]).unwrap();
    let b = DataSet::from_descriptors(
        "b",
        vec![
            ("x".to_string(), mfcc_sample(vec![9.0, 9.0], "vocal")),
            ("y".to_string(), mfcc_sample(vec![2.0, 2.0], "vocal")),
        ],
    )
    .unwrap();
    let expected = a.layout().common(b.layout());

    let sum = merge::sum(a, b).unwrap();
    assert_eq!(sum.layout(), &expected);
    assert!(!sum.layout().contains("lowlevel.loudness"));
    assert_eq!(sum.len(), 2);
    assert_eq!(sum.value("x", "lowlevel.mfcc"), Some(&Value::Real(vec![1.0, 0.0])));
}

#[test]
fn test_append_requires_disjoint_identifiers() {
    let a = DataSet::from_descriptors("a", vec![("p1".to_string(), mfcc_sample(vec![1.0, 0.0], "vocal"))]).unwrap();
    let b = DataSet::from_descriptors(
        "b",
        vec![
            ("p2".to_string(), mfcc_sample(vec![2.0, 0.0], "vocal")),
            ("p3".to_string(), mfcc_sample(vec![3.0, 0.0], "vocal")),
        ],
    )
    .unwrap();
    let joined = merge::append(a.clone(), b).unwrap();
    assert_eq!(joined.len(), 3);

    let clash = DataSet::from_descriptors("c", vec![("p1".to_string(), mfcc_sample(vec![5.0, 5.0], "vocal"))]).unwrap();
    assert!(matches!(merge::append(a, clash), Err(Error::DuplicatePoint(id)) if id == "p1"));
}

#[test]
fn test_sum_then_search_never_returns_query() {
    let a = DataSet::from_descriptors("a", vec![("p1".to_string(), mfcc_sample(vec![1.0, 0.0], "vocal"))]).unwrap();
    let b = DataSet::from_descriptors(
        "b",
        vec![
            ("p1".to_string(), mfcc_sample(vec![9.0, 9.0], "vocal")),
            ("p2".to_string(), mfcc_sample(vec![1.0, 0.0], "vocal")),
        ],
    )
    .unwrap();

    let sum = merge::sum(a, b).unwrap();
    assert_eq!(sum.point_ids(), vec!["p1", "p2"]);

    let metric = Euclidean::new(sum.layout(), &["lowlevel.mfcc"]).unwrap();
    let query = sum.point("p1").unwrap();
    let hits = nn_search(&sum, &metric, query, 1, &AHashSet::new());
    let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["p2"]);
    assert_eq!(hits[0].distance, 0.0);
}

#[test]
fn test_self_exclusion_and_bounded_output() {
    let global = full_dataset("global", &[("g1", 1.0), ("g2", 2.0), ("g3", 3.0), ("g4", 6.0), ("g5", 8.0)]);
    let user = full_dataset("user", &[("u1", 1.5), ("u2", 2.5), ("u3", 6.8)]);
    let config = RecommendConfig::default();

    let found = find_similar(global, user, &config).unwrap();
    assert_eq!(found.len(), 3);
    for (query, recommended) in found.iter() {
        // min(30, 8 - 3)
        assert_eq!(recommended.len(), 5, "{}", query);
        assert!(recommended.iter().all(|label| label.starts_with('g')), "{:?}", recommended);
    }

    let small = RecommendConfig::default().with_quantity(2);
    let global = full_dataset("global", &[("g1", 1.0), ("g2", 2.0), ("g3", 3.0), ("g4", 6.0), ("g5", 8.0)]);
    let user = full_dataset("user", &[("u1", 1.5), ("u2", 2.5), ("u3", 6.8)]);
    let found = find_similar(global, user, &small).unwrap();
    assert!(found.iter().all(|(_, r)| r.len() == 2));
    assert_eq!(found.get("u3.wav").unwrap(), &["g4.wav".to_string(), "g5.wav".to_string()][..]);
}

#[test]
fn test_zero_timbre_weight_ignores_mfcc() {
    let config = RecommendConfig::default().with_weights(1.0, 0.0, 1.0);
    let build = |shift: f32| {
        let global = DataSet::from_descriptors(
            "global",
            [("g1", 1.0, 0.0), ("g2", 2.0, shift), ("g3", 4.0, -shift), ("g4", 7.0, 3.0 * shift)]
                .into_iter()
                .map(|(id, x, s)| full_sample(id, x, s, 0.1 * x)),
        )
        .unwrap();
        let user = DataSet::from_descriptors("user", vec![full_sample("u1", 3.0, shift, 0.3)]).unwrap();
        find_similar(global, user, &config).unwrap()
    };

    assert_eq!(build(0.0), build(25.0));
}

#[test]
fn test_weights_change_ranking() {
    // identical high-level tags everywhere, low-level and timbre differ
    let samples = || {
        let global = DataSet::from_descriptors(
            "global",
            [("c1", 9.0), ("c2", 5.0), ("c3", 1.0)]
                .into_iter()
                .map(|(id, x)| full_sample(id, x, 0.0, 0.2)),
        )
        .unwrap();
        let user = DataSet::from_descriptors("user", vec![full_sample("u", 0.0, 0.0, 0.2)]).unwrap();
        (global, user)
    };

    let (global, user) = samples();
    let all = find_similar(global, user, &RecommendConfig::default()).unwrap();
    assert_eq!(all.get("u.wav").unwrap(), &["c3.wav", "c2.wav", "c1.wav"].map(String::from)[..]);

    let (global, user) = samples();
    let highlevel_only = RecommendConfig::default().with_weights(0.0, 0.0, 1.0);
    let tags = find_similar(global, user, &highlevel_only).unwrap();
    // every candidate ties, identifiers decide
    assert_eq!(tags.get("u.wav").unwrap(), &["c1.wav", "c2.wav", "c3.wav"].map(String::from)[..]);
    assert_ne!(all, tags);
}

#[test]
fn test_shared_codebook_across_datasets() {
    let keyed = |name: &str, keys: &[&str]| {
        DataSet::from_descriptors(
            name,
            keys.iter().enumerate().map(|(i, key)| {
                let mut d = Descriptors::new();
                d.insert("tonal.key_key".to_string(), Value::from(*key));
                (format!("{}{}", name, i), d)
            }),
        )
        .unwrap()
    };
    let global = keyed("g", &["F", "A"]);
    let user = keyed("u", &["C", "F"]);
    let names = vec!["tonal.key_key".to_string()];
    let codebook = Codebook::from_datasets(&[&global, &user], &names);

    let global = enumerate_with(global, &codebook).unwrap();
    let user = enumerate_with(user, &codebook).unwrap();
    assert_eq!(global.value("g0", "tonal.key_key"), user.value("u1", "tonal.key_key"));
    assert_ne!(user.value("u0", "tonal.key_key"), user.value("u1", "tonal.key_key"));
}

#[test]
fn test_dataset_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("global_vocal.db");
    let dataset = full_dataset("global_vocal", &[("g1", 1.0), ("g2", 2.5)]);

    assert!(save_dataset(&dataset, &path).unwrap());
    let loaded = load_dataset(&path).unwrap();
    assert_eq!(loaded.name(), dataset.name());
    assert_eq!(loaded.layout(), dataset.layout());
    assert_eq!(loaded.point_ids(), dataset.point_ids());
    for point in dataset.iter() {
        assert_eq!(loaded.point(&point.id), Some(point));
    }

    assert!(!save_dataset(&DataSet::default(), dir.path().join("empty.db")).unwrap());
    assert!(!dir.path().join("empty.db").exists());
}

fn write_reference(dir: &Path, samples: &[(&str, &str, f32)]) {
    for &(name, ty, x) in samples {
        let (_, mut d) = full_sample(name, x, 0.0, 0.1 * x);
        d.insert(TYPE_DESCRIPTOR.to_string(), Value::from(ty));
        d.insert("lowlevel.frames".to_string(), Value::Real(vec![x; 3 + name.len()]));
        write_descriptors(dir.join(format!("{}.sig", name)), &d).unwrap();
    }
}

#[test]
fn test_end_to_end_from_descriptor_files() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let config = RecommendConfig::default().with_quantity(3);

    // reference collection
    let reference = root.join("reference");
    write_reference(
        &reference,
        &[
            ("ref_v1", "vocal", 1.0),
            ("ref_v2", "vocal", 2.0),
            ("ref_v3", "vocal", 3.0),
            ("ref_v4", "vocal", 8.0),
            ("ref_p1", "percussion", 1.0),
            ("ref_p2", "percussion", 6.0),
        ],
    );
    let parts = root.join("reference_parts");
    merge_files(&reference, &parts, "ref", 2).unwrap();
    for ty in [SampleType::Vocal, SampleType::Percussion] {
        let target = config.global_dataset_path(root, ty);
        assert!(concatenate_datasets(&parts.join(ty.label()), &target).unwrap());
    }

    // user samples, one of them without reference counterpart type
    let user = root.join("user");
    write_reference(
        &user,
        &[("mine_v1", "vocal", 2.2), ("mine_p1", "percussion", 5.5), ("mine_m1", "melody", 1.0)],
    );
    fs::write(user.join("garbage.sig"), "[1, 2, 3]").unwrap();
    let written = descriptors_to_datasets(&user, root, &config).unwrap();
    assert_eq!(written.len(), 3);

    let many = recommend(&config, root).unwrap();
    assert_eq!(many.len(), 2);
    let vocal = many.get("mine_v1.wav").unwrap();
    assert_eq!(vocal.len(), 3);
    assert!(vocal.iter().all(|l| l.starts_with("ref_v")));
    assert_eq!(many.get("mine_p1.wav").unwrap(), &["ref_p2.wav", "ref_p1.wav"].map(String::from)[..]);
    assert!(many.get("mine_m1.wav").is_none());

    let one = recommend(&config.clone().with_mode(DatasetMode::One), root).unwrap();
    assert_eq!(one.len(), 2);
    assert!(one.iter().all(|(_, r)| r.len() == 3 && r.iter().all(|l| l.starts_with("ref_"))));

    let output = root.join("result.yaml");
    many.write_yaml(&output).unwrap();
    assert!(fs::read_to_string(&output).unwrap().contains("- \"mine_v1.wav\":"));
}
