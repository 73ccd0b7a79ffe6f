use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::domain::{BIGWIG, Dataset, FileDescriptor, ReferenceEpigenome};
use crate::error::SegwayError;
use crate::portal::PortalGateway;
use crate::quality::ReplicateQualitySelector;

pub struct FileSelector<'a, G: PortalGateway + ?Sized> {
    portal: &'a G,
}

impl<'a, G: PortalGateway + ?Sized> FileSelector<'a, G> {
    pub fn new(portal: &'a G) -> Self {
        Self { portal }
    }

    /// Every requested chip target must match a surviving dataset; that check runs
    /// before any file is resolved or any quality metric fetched.
    pub fn select(
        &self,
        epigenome: &ReferenceEpigenome,
        assembly: &str,
        chip_targets: Option<&[String]>,
        skip_assays: &[String],
    ) -> Result<Vec<String>, SegwayError> {
        let datasets = eligible_datasets(epigenome, chip_targets, skip_assays)?;
        let mut urls = Vec::new();
        for dataset in datasets {
            for file in self.resolve_dataset(dataset, assembly)? {
                urls.push(self.download_url(file)?);
            }
        }
        info!(selected = urls.len(), %assembly, "signal files selected");
        Ok(urls)
    }

    fn resolve_dataset<'e>(
        &self,
        dataset: &'e Dataset,
        assembly: &str,
    ) -> Result<Vec<&'e FileDescriptor>, SegwayError> {
        let released = dataset.released_replicates();
        if released.is_empty() {
            debug!(dataset = %dataset.id, "no released replicates, skipping");
            return Ok(Vec::new());
        }
        let candidates = signal_candidates(dataset, assembly);
        if candidates.is_empty() {
            debug!(dataset = %dataset.id, %assembly, "no signal files after filtering");
            return Ok(Vec::new());
        }
        if dataset.is_dnase() {
            self.resolve_dnase(dataset, assembly, &released, candidates)
        } else {
            Ok(resolve_pooled(dataset, &released, candidates)?
                .into_iter()
                .collect())
        }
    }

    fn resolve_dnase<'e>(
        &self,
        dataset: &'e Dataset,
        assembly: &str,
        released: &BTreeSet<u32>,
        candidates: Vec<&'e FileDescriptor>,
    ) -> Result<Vec<&'e FileDescriptor>, SegwayError> {
        let preferred = match released.iter().collect::<Vec<_>>().as_slice() {
            [only] => **only,
            _ => {
                let alignments = dataset
                    .original_files
                    .iter()
                    .filter(|file| file.is_released() && file.is_alignment())
                    .filter(|file| file.assembly.as_deref().is_none_or(|a| a == assembly))
                    .filter(|file| {
                        file.biological_replicates
                            .iter()
                            .all(|replicate| released.contains(replicate))
                    })
                    .collect::<Vec<_>>();
                ReplicateQualitySelector::new(self.portal).select_preferred_replicate(&alignments)?
            }
        };
        debug!(dataset = %dataset.id, replicate = preferred, "preferred DNase replicate");

        let matching = candidates
            .into_iter()
            .filter(|file| file.biological_replicates == [preferred])
            .collect::<Vec<_>>();
        match matching.len() {
            0 => {
                warn!(
                    dataset = %dataset.id,
                    replicate = preferred,
                    "preferred replicate has no signal file"
                );
                Ok(matching)
            }
            1 => Ok(matching),
            count => Err(SegwayError::Selection(format!(
                "dataset {} has {count} signal files for replicate {preferred}: {}",
                dataset.id,
                file_ids(&matching)
            ))),
        }
    }

    fn download_url(&self, file: &FileDescriptor) -> Result<String, SegwayError> {
        let url = file.download_url().ok_or_else(|| {
            SegwayError::Selection(format!("selected file {} has no download URL", file.id))
        })?;
        self.portal.resolve_url(url)
    }
}

fn eligible_datasets<'e>(
    epigenome: &'e ReferenceEpigenome,
    chip_targets: Option<&[String]>,
    skip_assays: &[String],
) -> Result<Vec<&'e Dataset>, SegwayError> {
    let mut matched_targets = BTreeSet::new();
    let mut kept = Vec::new();
    for dataset in &epigenome.related_datasets {
        if skip_assays.iter().any(|assay| *assay == dataset.assay_title) {
            debug!(dataset = %dataset.id, assay = %dataset.assay_title, "assay skipped");
            continue;
        }
        if !dataset.is_released() {
            debug!(dataset = %dataset.id, "dataset not released");
            continue;
        }
        if let Some(targets) = chip_targets {
            match dataset.target_label() {
                Some(label) if targets.iter().any(|target| target == label) => {
                    matched_targets.insert(label);
                }
                _ => continue,
            }
        }
        kept.push(dataset);
    }

    if let Some(targets) = chip_targets {
        let missing = targets
            .iter()
            .map(String::as_str)
            .filter(|target| !matched_targets.contains(target))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(SegwayError::Configuration(format!(
                "chip targets matched no dataset: {}",
                missing.join(", ")
            )));
        }
    }
    Ok(kept)
}

fn signal_candidates<'e>(dataset: &'e Dataset, assembly: &str) -> Vec<&'e FileDescriptor> {
    let accepted = dataset.accepted_output_types();
    dataset
        .original_files
        .iter()
        .filter(|file| file.is_released())
        .filter(|file| file.assembly.as_deref() == Some(assembly))
        .filter(|file| file.file_format == BIGWIG)
        .filter(|file| accepted.contains(&file.output_type.as_str()))
        .collect()
}

/// A lone candidate wins outright. Otherwise only the file pooled over exactly the
/// released replicates is acceptable.
fn resolve_pooled<'e>(
    dataset: &Dataset,
    released: &BTreeSet<u32>,
    candidates: Vec<&'e FileDescriptor>,
) -> Result<Option<&'e FileDescriptor>, SegwayError> {
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => {
            let pooled = candidates
                .iter()
                .copied()
                .filter(|file| file.replicate_set() == *released)
                .collect::<Vec<_>>();
            match pooled.as_slice() {
                [file] => Ok(Some(*file)),
                _ => Err(SegwayError::Selection(format!(
                    "dataset {} has {} candidate signal files ({}), {} cover exactly the released replicates",
                    dataset.id,
                    candidates.len(),
                    file_ids(&candidates),
                    pooled.len()
                ))),
            }
        }
    }
}

fn file_ids(files: &[&FileDescriptor]) -> String {
    files
        .iter()
        .map(|file| file.id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
