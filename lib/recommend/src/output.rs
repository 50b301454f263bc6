use crate::config::DatasetMode;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tonematch_similarity::MetricWeights;

/// Query label to recommended labels, closest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recommendations {
    entries: BTreeMap<String, Vec<String>>,
}

impl From<BTreeMap<String, Vec<String>>> for Recommendations {
    fn from(entries: BTreeMap<String, Vec<String>>) -> Self {
        Self { entries }
    }
}

impl Recommendations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, query: &str) -> Option<&[String]> {
        self.entries.get(query).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn insert(&mut self, query: impl Into<String>, recommended: Vec<String>) {
        self.entries.insert(query.into(), recommended);
    }

    /// Add another bucket's results; later entries replace earlier ones
    pub fn extend(&mut self, other: Recommendations) {
        self.entries.extend(other.entries);
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.entries
    }

    /// YAML sequence of single-key mappings, every label double-quoted
    pub fn to_yaml_string(&self) -> String {
        let mut out = String::new();
        for (query, recommended) in &self.entries {
            if recommended.is_empty() {
                out.push_str(&format!("- {}: []\n", quoted(query)));
                continue;
            }
            out.push_str(&format!("- {}:\n", quoted(query)));
            for label in recommended {
                out.push_str(&format!("  - {}\n", quoted(label)));
            }
        }
        if out.is_empty() {
            out.push_str("[]\n");
        }
        out
    }

    pub fn write_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_yaml_string())?;
        Ok(())
    }

    /// `query :` followed by the indented recommendations and a blank line
    pub fn write_text<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (query, recommended) in &self.entries {
            writeln!(out, "{} :", query)?;
            for label in recommended {
                writeln!(out, "   {}", label)?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    pub fn print_result(&self) -> io::Result<()> {
        self.write_text(io::stdout().lock())
    }
}

// JSON string escapes are a subset of YAML double-quoted escapes
fn quoted(label: &str) -> String {
    serde_json::Value::String(label.to_string()).to_string()
}

/// `result_<w1>_<w2>_<w3>_<mode>_ds_mode.yaml`
pub fn default_output_name(weights: &MetricWeights, mode: DatasetMode) -> String {
    format!(
        "result_{:.1}_{:.1}_{:.1}_{}_ds_mode.yaml",
        weights.lowlevel, weights.timbre, weights.highlevel, mode
    )
}
