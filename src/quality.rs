use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{FileDescriptor, QualityMetric};
use crate::error::SegwayError;
use crate::portal::PortalGateway;

pub const FLAGSTATS_PREFIX: &str = "/samtools-flagstats-quality-metrics/";

pub struct ReplicateQualitySelector<'a, G: PortalGateway + ?Sized> {
    portal: &'a G,
}

impl<'a, G: PortalGateway + ?Sized> ReplicateQualitySelector<'a, G> {
    pub fn new(portal: &'a G) -> Self {
        Self { portal }
    }

    pub fn select_preferred_replicate(
        &self,
        alignment_files: &[&FileDescriptor],
    ) -> Result<u32, SegwayError> {
        let mut best_per_replicate = BTreeMap::<u32, u64>::new();
        for file in alignment_files {
            let replicate = single_replicate(file)?;
            let mapped = self.mapped_reads(file)?;
            debug!(file = %file.id, replicate, mapped, "alignment quality");
            best_per_replicate
                .entry(replicate)
                .and_modify(|current| *current = (*current).max(mapped))
                .or_insert(mapped);
        }

        let Some(max_mapped) = best_per_replicate.values().copied().max() else {
            return Err(SegwayError::Selection(
                "no alignment files available to rank replicates".to_string(),
            ));
        };
        let leaders = best_per_replicate
            .iter()
            .filter(|(_, mapped)| **mapped == max_mapped)
            .map(|(replicate, _)| *replicate)
            .collect::<Vec<_>>();
        match leaders.as_slice() {
            [replicate] => Ok(*replicate),
            _ => Err(SegwayError::Selection(format!(
                "replicates {leaders:?} tie at {max_mapped} mapped reads"
            ))),
        }
    }

    fn mapped_reads(&self, file: &FileDescriptor) -> Result<u64, SegwayError> {
        let path = flagstats_reference(file)?;
        let body = self.portal.fetch_json(path)?;
        let metric: QualityMetric =
            serde_json::from_value(body).map_err(|err| SegwayError::PortalBody {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        Ok(metric.mapped)
    }
}

/// The samtools flagstats metric attached to `file`. Other metric kinds are ignored.
pub fn flagstats_reference(file: &FileDescriptor) -> Result<&str, SegwayError> {
    let references = file
        .quality_metrics
        .iter()
        .map(String::as_str)
        .filter(|reference| reference.starts_with(FLAGSTATS_PREFIX))
        .collect::<Vec<_>>();
    match references.as_slice() {
        [reference] => Ok(*reference),
        [] => Err(SegwayError::Selection(format!(
            "file {} has no samtools flagstats quality metric",
            file.id
        ))),
        _ => Err(SegwayError::Selection(format!(
            "file {} has {} samtools flagstats quality metrics, expected exactly one",
            file.id,
            references.len()
        ))),
    }
}

fn single_replicate(file: &FileDescriptor) -> Result<u32, SegwayError> {
    match file.biological_replicates.as_slice() {
        [replicate] => Ok(*replicate),
        other => Err(SegwayError::Selection(format!(
            "alignment file {} covers replicates {other:?}, expected exactly one",
            file.id
        ))),
    }
}
