use crate::descriptor::{Descriptor, DescriptorKind, DescriptorPattern, DescriptorType, Descriptors, Value};
use crate::layout::Layout;
use crate::point::Point;
use crate::{Error, Result};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeMap;

/// A homogeneous collection of points sharing one layout
///
/// Point identifiers are unique and every point holds exactly one value per
/// layout descriptor. Points keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    name: String,
    layout: Layout,
    points: Vec<Point>,
    index: AHashMap<String, usize>,
}

impl DataSet {
    /// Create an empty dataset with the given layout
    pub fn new(name: impl Into<String>, layout: Layout) -> Self {
        Self {
            name: name.into(),
            layout,
            points: Vec::new(),
            index: AHashMap::new(),
        }
    }

    /// Build a dataset from points already aligned with `layout`
    pub fn from_parts(name: impl Into<String>, layout: Layout, points: Vec<Point>) -> Result<Self> {
        let mut dataset = Self::new(name, layout);
        dataset.points.reserve(points.len());
        for point in points {
            dataset.add_point(point)?;
        }
        Ok(dataset)
    }

    /// Build a dataset from standalone descriptor mappings
    ///
    /// Every mapping must have the same descriptor names with the same kind.
    /// Numeric descriptors whose length is identical on every point become
    /// `Real(n)`, the others `VariableLength`.
    pub fn from_descriptors<I>(name: impl Into<String>, samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Descriptors)>,
    {
        let samples: Vec<(String, Descriptors)> = samples.into_iter().collect();
        let Some((first_id, first)) = samples.first() else {
            return Ok(Self::new(name, Layout::empty()));
        };

        let mut types: BTreeMap<&str, DescriptorType> = first
            .iter()
            .map(|(k, v)| (k.as_str(), v.natural_type()))
            .collect();

        for (id, descriptors) in &samples[1..] {
            if descriptors.len() != types.len() || descriptors.keys().any(|k| !types.contains_key(k.as_str())) {
                let missing: Vec<&str> = types.keys().copied().filter(|k| !descriptors.contains_key(*k)).collect();
                let extra: Vec<&str> = descriptors
                    .keys()
                    .map(String::as_str)
                    .filter(|k| !first.contains_key(*k))
                    .collect();
                return Err(Error::InconsistentPoint {
                    id: id.clone(),
                    reason: format!(
                        "descriptors differ from point {}: missing [{}], extra [{}]",
                        first_id,
                        missing.join(", "),
                        extra.join(", ")
                    ),
                });
            }
            for (key, value) in descriptors {
                let Some(ty) = types.get_mut(key.as_str()) else {
                    continue;
                };
                if ty.kind() != value.kind() {
                    return Err(Error::InconsistentPoint {
                        id: id.clone(),
                        reason: format!("descriptor {} is {} elsewhere", key, ty),
                    });
                }
                if let (DescriptorType::Real(dim), Value::Real(v)) = (*ty, value) {
                    if v.len() != dim {
                        *ty = DescriptorType::VariableLength;
                    }
                }
            }
        }

        let layout = Layout::new(
            types
                .into_iter()
                .map(|(name, ty)| Descriptor::new(name, ty))
                .collect(),
        )?;
        let mut dataset = Self::new(name, layout);
        for (id, descriptors) in samples {
            dataset.add_descriptors(id, descriptors)?;
        }
        Ok(dataset)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn point(&self, id: &str) -> Option<&Point> {
        self.index.get(id).map(|&i| &self.points[i])
    }

    /// Point identifiers in insertion order
    pub fn point_ids(&self) -> Vec<String> {
        self.points.iter().map(|p| p.id.clone()).collect()
    }

    pub fn value(&self, id: &str, descriptor: &str) -> Option<&Value> {
        self.point(id).and_then(|p| p.value(&self.layout, descriptor))
    }

    /// Display label of a point: the string value of `descriptor`, else the identifier
    pub fn label(&self, id: &str, descriptor: &str) -> String {
        match self.value(id, descriptor) {
            Some(Value::String(s)) => s.clone(),
            _ => id.to_string(),
        }
    }

    /// Add a point whose values are aligned with this dataset's layout
    pub fn add_point(&mut self, point: Point) -> Result<()> {
        if self.index.contains_key(&point.id) {
            return Err(Error::DuplicatePoint(point.id));
        }
        self.check_conforms(&point)?;
        self.push_unchecked(point);
        Ok(())
    }

    /// Add a sample given as a descriptor mapping; names must match the layout exactly
    pub fn add_descriptors(&mut self, id: impl Into<String>, mut descriptors: Descriptors) -> Result<()> {
        let id = id.into();
        if descriptors.len() != self.layout.len() {
            return Err(Error::InconsistentPoint {
                id,
                reason: format!(
                    "{} descriptors given, layout has {}",
                    descriptors.len(),
                    self.layout.len()
                ),
            });
        }
        let mut values = Vec::with_capacity(self.layout.len());
        for name in self.layout.names() {
            match descriptors.remove(name) {
                Some(value) => values.push(value),
                None => {
                    return Err(Error::InconsistentPoint {
                        id,
                        reason: format!("missing descriptor {}", name),
                    })
                }
            }
        }
        self.add_point(Point::new(id, values))
    }

    fn check_conforms(&self, point: &Point) -> Result<()> {
        if point.values.len() != self.layout.len() {
            return Err(Error::InconsistentPoint {
                id: point.id.clone(),
                reason: format!(
                    "{} values for {} descriptors",
                    point.values.len(),
                    self.layout.len()
                ),
            });
        }
        for (descriptor, value) in self.layout.descriptors().iter().zip(&point.values) {
            if !descriptor.ty.accepts(value) {
                return Err(Error::InconsistentPoint {
                    id: point.id.clone(),
                    reason: format!(
                        "descriptor {} expects {}, got {}",
                        descriptor.name,
                        descriptor.ty,
                        value.natural_type()
                    ),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, point: Point) {
        self.index.insert(point.id.clone(), self.points.len());
        self.points.push(point);
    }

    /// Remove the given identifiers; unknown identifiers are ignored
    ///
    /// Returns the number of points actually removed.
    pub fn remove_points<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let doomed: AHashSet<&str> = ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| self.index.contains_key(*id))
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        let before = self.points.len();
        self.points.retain(|p| !doomed.contains(p.id.as_str()));
        self.rebuild_index();
        before - self.points.len()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
    }

    /// New dataset restricted to the descriptors matching `patterns`
    ///
    /// Fails with [`Error::UnknownDescriptor`] when a pattern matches nothing,
    /// unless `ignore_unmatched` is set.
    pub fn project<S: AsRef<str>>(&self, patterns: &[S], ignore_unmatched: bool) -> Result<DataSet> {
        let names = self.resolve(patterns, ignore_unmatched)?;
        self.project_names(&names)
    }

    /// New dataset without the descriptors matching `patterns`
    pub fn remove_descriptors<S: AsRef<str>>(&self, patterns: &[S], ignore_unmatched: bool) -> Result<DataSet> {
        let removed: AHashSet<String> = self.resolve(patterns, ignore_unmatched)?.into_iter().collect();
        let kept: Vec<String> = self
            .layout
            .names()
            .filter(|n| !removed.contains(*n))
            .map(str::to_string)
            .collect();
        self.project_names(&kept)
    }

    /// New dataset restricted to exactly these descriptor names
    pub fn project_names<S: AsRef<str>>(&self, names: &[S]) -> Result<DataSet> {
        let indices = self.indices_of(names)?;
        Ok(self.select_indices(&indices))
    }

    /// Consuming projection; returns `self` untouched when nothing would change
    pub fn into_projection<S: AsRef<str>>(self, names: &[S]) -> Result<DataSet> {
        let indices = self.indices_of(names)?;
        if indices.len() == self.layout.len() {
            return Ok(self);
        }
        Ok(self.select_indices(&indices))
    }

    /// Descriptor names matching `patterns` of the given kind, for transformation stages
    pub fn matching_names<S: AsRef<str>>(
        &self,
        include: &[S],
        exclude: &[S],
        kind: Option<DescriptorKind>,
    ) -> Result<Vec<String>> {
        self.layout.descriptor_names(include, exclude, kind)
    }

    fn resolve<S: AsRef<str>>(&self, patterns: &[S], ignore_unmatched: bool) -> Result<Vec<String>> {
        let compiled = DescriptorPattern::compile(patterns)?;
        if !ignore_unmatched {
            if let Some(p) = compiled
                .iter()
                .find(|p| !self.layout.names().any(|n| p.matches(n)))
            {
                return Err(Error::UnknownDescriptor(p.as_str().to_string()));
            }
        }
        Ok(self.layout.select_names(&compiled, &[], None))
    }

    fn indices_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let mut indices = names
            .iter()
            .map(|n| {
                self.layout
                    .index_of(n.as_ref())
                    .ok_or_else(|| Error::UnknownDescriptor(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<usize>>>()?;
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    fn select_indices(&self, indices: &[usize]) -> DataSet {
        let layout = self.layout.subset(indices);
        let points = self
            .points
            .iter()
            .map(|p| Point::new(p.id.clone(), indices.iter().map(|&i| p.values[i].clone()).collect()))
            .collect();
        DataSet {
            name: self.name.clone(),
            layout,
            points,
            index: self.index.clone(),
        }
    }

    /// Split into name, layout and points, giving up the index
    pub fn into_parts(self) -> (String, Layout, Vec<Point>) {
        (self.name, self.layout, self.points)
    }
}
