use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SegwayError;

pub const DNASE_SEQ: &str = "DNase-seq";
pub const TF_CHIP_SEQ: &str = "TF ChIP-seq";
pub const HISTONE_CHIP_SEQ: &str = "Histone ChIP-seq";
pub const ATAC_SEQ: &str = "ATAC-seq";

pub const KNOWN_ASSAYS: [&str; 4] = [TF_CHIP_SEQ, HISTONE_CHIP_SEQ, DNASE_SEQ, ATAC_SEQ];

pub const BIGWIG: &str = "bigWig";
pub const BAM: &str = "bam";
pub const ALIGNMENTS: &str = "alignments";
pub const READ_DEPTH_NORMALIZED_SIGNAL: &str = "read-depth normalized signal";
pub const FOLD_CHANGE_OVER_CONTROL: &str = "fold change over control";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Released,
    Revoked,
    Archived,
    #[serde(other)]
    Other,
}

impl Status {
    pub fn is_released(self) -> bool {
        self == Status::Released
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Released => write!(f, "released"),
            Status::Revoked => write!(f, "revoked"),
            Status::Archived => write!(f, "archived"),
            Status::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpigenomeAccession(String);

impl EpigenomeAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn portal_path(&self) -> String {
        format!("reference-epigenomes/{}", self.0)
    }
}

impl fmt::Display for EpigenomeAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EpigenomeAccession {
    type Err = SegwayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(SegwayError::Configuration(format!(
                "invalid reference epigenome accession: {value}"
            )));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReferenceEpigenome {
    #[serde(default)]
    pub related_datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Dataset {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(default)]
    pub assay_title: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub replicates: Vec<Replicate>,
    #[serde(default)]
    pub original_files: Vec<FileDescriptor>,
}

impl Dataset {
    pub fn is_dnase(&self) -> bool {
        self.assay_title == DNASE_SEQ
    }

    pub fn target_label(&self) -> Option<&str> {
        self.target.as_ref().and_then(Target::label)
    }

    /// Datasets without a status field are treated as released.
    pub fn is_released(&self) -> bool {
        self.status.is_none_or(Status::is_released)
    }

    pub fn released_replicates(&self) -> BTreeSet<u32> {
        self.replicates
            .iter()
            .filter(|replicate| replicate.status.is_released())
            .map(|replicate| replicate.biological_replicate_number)
            .collect()
    }

    pub fn accepted_output_types(&self) -> &'static [&'static str] {
        if self.is_dnase() {
            &[READ_DEPTH_NORMALIZED_SIGNAL]
        } else {
            &[FOLD_CHANGE_OVER_CONTROL]
        }
    }
}

/// The portal either embeds the target object or links it by path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Embedded { label: String },
    Reference(String),
}

impl Target {
    pub fn label(&self) -> Option<&str> {
        match self {
            Target::Embedded { label } => Some(label),
            Target::Reference(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Replicate {
    pub biological_replicate_number: u32,
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileDescriptor {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(default)]
    pub assembly: Option<String>,
    #[serde(default)]
    pub output_type: String,
    #[serde(default)]
    pub file_format: String,
    #[serde(default)]
    pub biological_replicates: Vec<u32>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub cloud_metadata: Option<CloudMetadata>,
    #[serde(default)]
    pub quality_metrics: Vec<String>,
}

impl FileDescriptor {
    pub fn is_released(&self) -> bool {
        self.status.is_some_and(Status::is_released)
    }

    pub fn download_url(&self) -> Option<&str> {
        self.cloud_metadata.as_ref().map(|meta| meta.url.as_str())
    }

    pub fn replicate_set(&self) -> BTreeSet<u32> {
        self.biological_replicates.iter().copied().collect()
    }

    pub fn is_alignment(&self) -> bool {
        self.file_format == BAM && self.output_type == ALIGNMENTS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudMetadata {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QualityMetric {
    pub mapped: u64,
}
