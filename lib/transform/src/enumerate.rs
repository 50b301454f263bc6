//! String to enum conversion
//!
//! Each categorical descriptor gets a table of its distinct values, sorted, and
//! a value's code is its position in that table. Building the table from the
//! sorted values keeps codes independent of point order, so two datasets
//! enumerated from the same values always agree.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tonematch_core::{DataSet, Descriptor, DescriptorKind, DescriptorType, Error, Layout, Result, Value};
use tracing::debug;

/// Value tables for enumerated descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codebook {
    tables: BTreeMap<String, Vec<String>>,
}

impl Codebook {
    /// Tables for the given string descriptors of one dataset
    pub fn from_dataset(dataset: &DataSet, names: &[String]) -> Self {
        Self::from_datasets(&[dataset], names)
    }

    /// Tables covering the values of every dataset, so they can share codes
    pub fn from_datasets(datasets: &[&DataSet], names: &[String]) -> Self {
        let mut tables = BTreeMap::new();
        for name in names {
            let mut values = BTreeSet::new();
            for dataset in datasets {
                let Some(index) = dataset.layout().index_of(name) else {
                    continue;
                };
                values.extend(dataset.iter().filter_map(|p| p.values[index].as_str()));
            }
            tables.insert(name.clone(), values.into_iter().map(str::to_string).collect());
        }
        Self { tables }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn code(&self, descriptor: &str, value: &str) -> Option<u32> {
        let table = self.tables.get(descriptor)?;
        table
            .binary_search_by(|v| v.as_str().cmp(value))
            .ok()
            .and_then(|i| u32::try_from(i).ok())
    }

    pub fn value(&self, descriptor: &str, code: u32) -> Option<&str> {
        self.tables
            .get(descriptor)?
            .get(code as usize)
            .map(String::as_str)
    }
}

/// Enumerate every string descriptor not matching `except`
///
/// Returns the converted dataset along with the codebook used.
pub fn enumerate<S: AsRef<str>>(dataset: DataSet, except: &[S]) -> Result<(DataSet, Codebook)> {
    let names = dataset.matching_names(&["*"], except_patterns(except).as_slice(), Some(DescriptorKind::String))?;
    let codebook = Codebook::from_dataset(&dataset, &names);
    let dataset = enumerate_with(dataset, &codebook)?;
    Ok((dataset, codebook))
}

fn except_patterns<S: AsRef<str>>(except: &[S]) -> Vec<&str> {
    except.iter().map(AsRef::as_ref).collect()
}

/// Enumerate the string descriptors covered by `codebook`
///
/// Descriptors absent from the dataset, or already enumerated, are skipped.
/// A value missing from its table is an [`Error::InvalidConfig`].
pub fn enumerate_with(dataset: DataSet, codebook: &Codebook) -> Result<DataSet> {
    let targets: Vec<bool> = dataset
        .layout()
        .descriptors()
        .iter()
        .map(|d| d.ty == DescriptorType::String && codebook.tables.contains_key(&d.name))
        .collect();
    if !targets.iter().any(|&t| t) {
        return Ok(dataset);
    }

    let (name, layout, mut points) = dataset.into_parts();
    for point in &mut points {
        for ((value, &target), descriptor) in point.values.iter_mut().zip(&targets).zip(layout.descriptors()) {
            if !target {
                continue;
            }
            let Value::String(s) = value else {
                continue;
            };
            let code = codebook.code(&descriptor.name, s).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "value '{}' of {} missing from codebook",
                    s, descriptor.name
                ))
            })?;
            *value = Value::Enum(code);
        }
    }

    let descriptors: Vec<Descriptor> = layout
        .descriptors()
        .iter()
        .zip(&targets)
        .map(|(d, &target)| {
            if target {
                Descriptor::new(d.name.clone(), DescriptorType::Enum)
            } else {
                d.clone()
            }
        })
        .collect();

    debug!(
        dataset = name.as_str(),
        enumerated = targets.iter().filter(|&&t| t).count(),
        "enumerated string descriptors"
    );
    DataSet::from_parts(name, Layout::new(descriptors)?, points)
}
