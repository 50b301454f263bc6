//! Descriptor files
//!
//! The extraction service writes one hierarchical document per sample. They
//! are flattened here into dot-path [`Descriptors`]:
//!
//! - numbers become `Real(1)`, strings stay strings
//! - numeric lists become `Real(n)`, nested numeric lists are flattened row-major
//! - a list holding one string becomes that string, longer lists are joined with `", "`
//!
//! `.yaml`, `.yml` and `.sig` files are YAML, `.json` files are JSON.

use crate::{Error, Result};
use serde_yaml::{Mapping, Value as Yaml};
use std::fs;
use std::path::Path;
use tonematch_core::{Descriptors, Value, MD5_DESCRIPTOR};

/// Extensions recognized as descriptor files
pub const DESCRIPTOR_EXTENSIONS: [&str; 4] = ["sig", "yaml", "yml", "json"];

pub fn is_descriptor_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| DESCRIPTOR_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Read and flatten one descriptor file
pub fn read_descriptors(path: impl AsRef<Path>) -> Result<Descriptors> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let document: Yaml = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            let json: serde_json::Value = serde_json::from_str(&text)?;
            serde_yaml::to_value(json)?
        }
        Some(ext) if DESCRIPTOR_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(ext)) => {
            serde_yaml::from_str(&text)?
        }
        _ => return Err(Error::UnsupportedFormat(path.to_path_buf())),
    };

    let Yaml::Mapping(root) = document else {
        return Err(Error::invalid_descriptors(path, "top level is not a mapping"));
    };
    let mut descriptors = Descriptors::new();
    flatten_mapping(path, "", &root, &mut descriptors)?;
    Ok(descriptors)
}

/// Read a descriptor file along with the identifier of its point
///
/// The identifier is the content hash when the file carries one, else the
/// file stem.
pub fn read_sample(path: impl AsRef<Path>) -> Result<(String, Descriptors)> {
    let path = path.as_ref();
    let descriptors = read_descriptors(path)?;
    let id = point_id(path, &descriptors)?;
    Ok((id, descriptors))
}

pub fn point_id(path: &Path, descriptors: &Descriptors) -> Result<String> {
    if let Some(Value::String(hash)) = descriptors.get(MD5_DESCRIPTOR) {
        if !hash.is_empty() {
            return Ok(hash.clone());
        }
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_descriptors(path, "file name is not valid UTF-8"))
}

fn key_string(path: &Path, key: &Yaml) -> Result<String> {
    match key {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => Err(Error::invalid_descriptors(path, format!("unsupported key {:?}", other))),
    }
}

fn flatten_mapping(path: &Path, prefix: &str, mapping: &Mapping, out: &mut Descriptors) -> Result<()> {
    for (key, value) in mapping {
        let key = key_string(path, key)?;
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        flatten_value(path, &name, value, out)?;
    }
    Ok(())
}

fn flatten_value(path: &Path, name: &str, value: &Yaml, out: &mut Descriptors) -> Result<()> {
    let converted = match value {
        Yaml::Mapping(inner) => return flatten_mapping(path, name, inner, out),
        Yaml::Tagged(tagged) => return flatten_value(path, name, &tagged.value, out),
        Yaml::Null => return Ok(()),
        Yaml::Bool(b) => Value::scalar(if *b { 1.0 } else { 0.0 }),
        Yaml::Number(n) => Value::scalar(number(path, name, n)?),
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => sequence(path, name, items)?,
    };
    out.insert(name.to_string(), converted);
    Ok(())
}

fn number(path: &Path, name: &str, n: &serde_yaml::Number) -> Result<f32> {
    n.as_f64()
        .map(|x| x as f32)
        .ok_or_else(|| Error::invalid_descriptors(path, format!("{} is not a number", name)))
}

fn sequence(path: &Path, name: &str, items: &[Yaml]) -> Result<Value> {
    if !items.is_empty() && items.iter().all(|i| matches!(i, Yaml::String(_))) {
        let strings: Vec<&str> = items.iter().filter_map(|i| i.as_str()).collect();
        return Ok(Value::String(strings.join(", ")));
    }
    let mut numbers = Vec::new();
    collect_numbers(path, name, items, &mut numbers)?;
    Ok(Value::Real(numbers))
}

fn collect_numbers(path: &Path, name: &str, items: &[Yaml], out: &mut Vec<f32>) -> Result<()> {
    for item in items {
        match item {
            Yaml::Number(n) => out.push(number(path, name, n)?),
            Yaml::Sequence(row) => collect_numbers(path, name, row, out)?,
            _ => {
                return Err(Error::invalid_descriptors(
                    path,
                    format!("{} mixes numbers with other values", name),
                ))
            }
        }
    }
    Ok(())
}

/// Write descriptors back as a nested YAML document
pub fn write_descriptors(path: impl AsRef<Path>, descriptors: &Descriptors) -> Result<()> {
    let path = path.as_ref();
    let mut root = Mapping::new();
    for (name, value) in descriptors {
        let leaf = match value {
            Value::Real(v) if v.len() == 1 => Yaml::from(f64::from(v[0])),
            Value::Real(v) => Yaml::Sequence(v.iter().map(|&x| Yaml::from(f64::from(x))).collect()),
            Value::String(s) => Yaml::String(s.clone()),
            Value::Enum(code) => Yaml::from(*code),
        };
        insert_path(path, &mut root, name, leaf)?;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(&Yaml::Mapping(root))?)?;
    Ok(())
}

fn insert_path(path: &Path, root: &mut Mapping, name: &str, leaf: Yaml) -> Result<()> {
    let mut parts = name.split('.').peekable();
    let mut node = root;
    while let Some(part) = parts.next() {
        let key = Yaml::String(part.to_string());
        if parts.peek().is_none() {
            if node.contains_key(&key) {
                return Err(Error::invalid_descriptors(path, format!("{} collides with a group", name)));
            }
            node.insert(key, leaf);
            return Ok(());
        }
        if !node.contains_key(&key) {
            node.insert(key.clone(), Yaml::Mapping(Mapping::new()));
        }
        node = match node.get_mut(&key) {
            Some(Yaml::Mapping(m)) => m,
            _ => {
                return Err(Error::invalid_descriptors(
                    path,
                    format!("{} extends a leaf descriptor", name),
                ))
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SIG: &str = r#"
metadata:
  audio_properties:
    md5_encoded: "abc123"
  tags:
    file_name: ["kick 01.wav"]
    artist: ["a", "b"]
lowlevel:
  loudness: 0.5
  mfcc:
    mean: [1, 2]
    cov: [[1, 0], [0, 1]]
  silent: ~
highlevel:
  type:
    value: percussion
"#;

    #[test]
    fn test_read_flattens_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kick.sig");
        fs::write(&path, SIG).unwrap();

        let (id, d) = read_sample(&path).unwrap();
        assert_eq!(id, "abc123");
        assert_eq!(d.get("metadata.tags.file_name"), Some(&Value::from("kick 01.wav")));
        assert_eq!(d.get("metadata.tags.artist"), Some(&Value::from("a, b")));
        assert_eq!(d.get("lowlevel.loudness"), Some(&Value::scalar(0.5)));
        assert_eq!(d.get("lowlevel.mfcc.cov"), Some(&Value::Real(vec![1.0, 0.0, 0.0, 1.0])));
        assert_eq!(d.get("highlevel.type.value"), Some(&Value::from("percussion")));
        assert!(!d.contains_key("lowlevel.silent"));
    }

    #[test]
    fn test_json_and_file_stem_identifier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snare.json");
        fs::write(&path, r#"{"lowlevel": {"mfcc": {"mean": [0.5, 1.5]}}}"#).unwrap();
        let (id, d) = read_sample(&path).unwrap();
        assert_eq!(id, "snare");
        assert_eq!(d.get("lowlevel.mfcc.mean"), Some(&Value::Real(vec![0.5, 1.5])));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("sample.yaml");
        let mut d = Descriptors::new();
        d.insert("lowlevel.mfcc.mean".into(), Value::Real(vec![1.0, 2.0]));
        d.insert("lowlevel.loudness".into(), Value::scalar(0.25));
        d.insert("metadata.tags.file_name".into(), Value::from("x.wav"));
        write_descriptors(&path, &d).unwrap();
        assert_eq!(read_descriptors(&path).unwrap(), d);
    }

    #[test]
    fn test_rejects_bad_documents() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("list.yaml");
        fs::write(&list, "- 1\n- 2\n").unwrap();
        assert!(matches!(read_descriptors(&list), Err(Error::InvalidDescriptors { .. })));

        let mixed = dir.path().join("mixed.yaml");
        fs::write(&mixed, "a: [1, x]\n").unwrap();
        assert!(read_descriptors(&mixed).is_err());

        let text = dir.path().join("notes.txt");
        fs::write(&text, "a: 1\n").unwrap();
        assert!(matches!(read_descriptors(&text), Err(Error::UnsupportedFormat(_))));

        let mut clash = Descriptors::new();
        clash.insert("a".into(), Value::scalar(1.0));
        clash.insert("a.b".into(), Value::scalar(2.0));
        assert!(write_descriptors(dir.path().join("clash.yaml"), &clash).is_err());
    }
}
