use serde_json::{Map, Value};
use tracing::info;

use crate::config::InputRequest;
use crate::error::SegwayError;
use crate::input_json::make_input_json;
use crate::portal::PortalGateway;
use crate::selection::FileSelector;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFiles {
    pub assembly: String,
    pub chrom_sizes_url: String,
    pub annotation_gtf_url: String,
}

#[derive(Clone)]
pub struct App<P: PortalGateway> {
    portal: P,
}

impl<P: PortalGateway> App<P> {
    pub fn new(portal: P) -> Self {
        Self { portal }
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    /// The chrom sizes file decides the target assembly.
    pub fn reference_files(&self, request: &InputRequest) -> Result<ReferenceFiles, SegwayError> {
        let assembly = self.portal.file_assembly(&request.chrom_sizes)?;
        let chrom_sizes_url = self.portal.file_download_url(&request.chrom_sizes)?;
        let annotation_gtf_url = self.portal.file_download_url(&request.annotation_gtf)?;
        info!(%assembly, "reference files resolved");
        Ok(ReferenceFiles {
            assembly,
            chrom_sizes_url,
            annotation_gtf_url,
        })
    }

    pub fn select_bigwigs(
        &self,
        request: &InputRequest,
        assembly: &str,
    ) -> Result<Vec<String>, SegwayError> {
        info!(accession = %request.accession, "fetching reference epigenome");
        let epigenome = self.portal.reference_epigenome(&request.accession)?;
        FileSelector::new(&self.portal).select(
            &epigenome,
            assembly,
            request.chip_targets.as_deref(),
            &request.skip_assays,
        )
    }

    pub fn make_input_document(
        &self,
        request: &InputRequest,
    ) -> Result<Map<String, Value>, SegwayError> {
        let reference = self.reference_files(request)?;
        let bigwigs = self.select_bigwigs(request, &reference.assembly)?;

        let mut extra = request.params.clone();
        extra.insert(
            "annotation_gtf".to_string(),
            Value::String(reference.annotation_gtf_url),
        );
        extra.insert(
            "chrom_sizes".to_string(),
            Value::String(reference.chrom_sizes_url),
        );
        Ok(make_input_json(&request.namespace, &bigwigs, extra))
    }
}
