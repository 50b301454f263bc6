//! Dataset layouts
//!
//! A layout is the ordered set of descriptors shared by every point of a
//! dataset. Descriptors are kept sorted by name so two layouts built from
//! the same descriptors in a different order compare equal.

use crate::descriptor::{Descriptor, DescriptorKind, DescriptorPattern, DescriptorType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    descriptors: Vec<Descriptor>,
}

impl Layout {
    /// Build a layout, rejecting duplicated descriptor names
    pub fn new(mut descriptors: Vec<Descriptor>) -> Result<Self> {
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = descriptors.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(Error::CorruptData(format!(
                "descriptor '{}' appears twice in layout",
                pair[0].name
            )));
        }
        Ok(Self { descriptors })
    }

    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[inline]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    /// Position of a descriptor in point value vectors
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.descriptors
            .binary_search_by(|d| d.name.as_str().cmp(name))
            .ok()
    }

    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.index_of(name).map(|i| &self.descriptors[i])
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Descriptor names matching any of `include` and none of `exclude`,
    /// optionally restricted to one kind
    pub fn select_names(
        &self,
        include: &[DescriptorPattern],
        exclude: &[DescriptorPattern],
        kind: Option<DescriptorKind>,
    ) -> Vec<String> {
        self.descriptors
            .iter()
            .filter(|d| kind.map_or(true, |k| d.ty.kind() == k))
            .filter(|d| include.iter().any(|p| p.matches(&d.name)))
            .filter(|d| !exclude.iter().any(|p| p.matches(&d.name)))
            .map(|d| d.name.clone())
            .collect()
    }

    /// Same as [`Layout::select_names`] with uncompiled patterns
    pub fn descriptor_names<S: AsRef<str>>(
        &self,
        include: &[S],
        exclude: &[S],
        kind: Option<DescriptorKind>,
    ) -> Result<Vec<String>> {
        let include = DescriptorPattern::compile(include)?;
        let exclude = DescriptorPattern::compile(exclude)?;
        Ok(self.select_names(&include, &exclude, kind))
    }

    /// Names present in both layouts, regardless of type
    pub fn overlap(&self, other: &Layout) -> Vec<String> {
        self.names()
            .filter(|name| other.contains(name))
            .map(str::to_string)
            .collect()
    }

    #[inline]
    pub fn is_disjoint(&self, other: &Layout) -> bool {
        !self.names().any(|name| other.contains(name))
    }

    /// Descriptors present in both layouts with the same type
    pub fn common(&self, other: &Layout) -> Layout {
        let descriptors = self
            .descriptors
            .iter()
            .filter(|d| other.get(&d.name).is_some_and(|o| o.ty == d.ty))
            .cloned()
            .collect();
        Layout { descriptors }
    }

    /// Union of two disjoint layouts
    pub fn union(&self, other: &Layout) -> Result<Layout> {
        let overlap = self.overlap(other);
        if !overlap.is_empty() {
            return Err(Error::SchemaOverlap(overlap));
        }
        let mut descriptors = self.descriptors.clone();
        descriptors.extend(other.descriptors.iter().cloned());
        Layout::new(descriptors)
    }

    /// Sub-layout made of the descriptors at `indices` (must be sorted)
    pub(crate) fn subset(&self, indices: &[usize]) -> Layout {
        Layout {
            descriptors: indices.iter().map(|&i| self.descriptors[i].clone()).collect(),
        }
    }

    /// Total number of scalar components of the fixed-length real descriptors
    pub fn real_dimension(&self) -> usize {
        self.descriptors
            .iter()
            .map(|d| match d.ty {
                DescriptorType::Real(dim) => dim,
                _ => 0,
            })
            .sum()
    }

    /// Human readable difference, used in error messages
    pub fn describe_difference(&self, other: &Layout) -> String {
        let only_self: Vec<&str> = self.names().filter(|n| !other.contains(n)).collect();
        let only_other: Vec<&str> = other.names().filter(|n| !self.contains(n)).collect();
        let retyped: Vec<String> = self
            .descriptors
            .iter()
            .filter_map(|d| {
                other
                    .get(&d.name)
                    .filter(|o| o.ty != d.ty)
                    .map(|o| format!("{} ({} vs {})", d.name, d.ty, o.ty))
            })
            .collect();
        format!(
            "only in first: [{}]; only in second: [{}]; type differs: [{}]",
            only_self.join(", "),
            only_other.join(", "),
            retyped.join(", ")
        )
    }
}
