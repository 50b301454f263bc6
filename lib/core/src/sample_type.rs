use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse sample category used to bucket datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Percussion,
    Vocal,
    Melody,
}

/// Every bucket, in processing order
pub const SAMPLE_TYPES: [SampleType; 3] = [SampleType::Percussion, SampleType::Vocal, SampleType::Melody];

const LABELS: [(&str, SampleType); 3] = [
    ("percussion", SampleType::Percussion),
    ("vocal", SampleType::Vocal),
    ("melody", SampleType::Melody),
];

impl SampleType {
    pub fn label(self) -> &'static str {
        match self {
            SampleType::Percussion => "percussion",
            SampleType::Vocal => "vocal",
            SampleType::Melody => "melody",
        }
    }

    /// Classify a type tag as written by the extraction service
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        LABELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(label))
            .map(|&(_, ty)| ty)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SampleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| Error::InvalidConfig(format!("unknown sample type '{}'", s)))
    }
}
