use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use segway_inputs::domain::ReferenceEpigenome;
use segway_inputs::error::SegwayError;
use segway_inputs::portal::{BaseUrl, PortalGateway};
use segway_inputs::selection::FileSelector;

struct MockPortal {
    base: BaseUrl,
    responses: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl MockPortal {
    fn new() -> Self {
        Self {
            base: BaseUrl::parse("https://www.qux.io/").unwrap(),
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_flagstats() -> Self {
        let mut portal = Self::new();
        portal.respond("/samtools-flagstats-quality-metrics/1/", json!({"mapped": 10}));
        portal.respond("/samtools-flagstats-quality-metrics/2/", json!({"mapped": 2}));
        portal
    }

    fn respond(&mut self, path: &str, body: Value) {
        self.responses.insert(path.to_string(), body);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl PortalGateway for MockPortal {
    fn fetch_json(&self, path: &str) -> Result<Value, SegwayError> {
        self.calls.lock().unwrap().push(path.to_string());
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| SegwayError::PortalStatus {
                path: path.to_string(),
                status: 404,
                message: "not found".to_string(),
            })
    }

    fn resolve_url(&self, path: &str) -> Result<String, SegwayError> {
        self.base.resolve(path)
    }
}

fn epigenome(value: Value) -> ReferenceEpigenome {
    serde_json::from_value(value).unwrap()
}

fn bigwig(id: &str, output_type: &str, replicates: &[u32], url: Option<&str>) -> Value {
    let mut file = json!({
        "@id": id,
        "assembly": "GRCh38",
        "output_type": output_type,
        "file_format": "bigWig",
        "biological_replicates": replicates,
        "status": "released"
    });
    if let Some(url) = url {
        file["cloud_metadata"] = json!({"url": url});
    }
    file
}

fn released(numbers: &[u32]) -> Value {
    Value::Array(
        numbers
            .iter()
            .map(|n| json!({"biological_replicate_number": n, "status": "released"}))
            .collect(),
    )
}

fn four_assays() -> ReferenceEpigenome {
    epigenome(json!({
        "related_datasets": [
            {
                "@id": "exp1",
                "assay_title": "TF ChIP-seq",
                "replicates": released(&[1, 3]),
                "original_files": [
                    bigwig("tf_chip_1", "fold change over control", &[1, 3], Some("https://d.na/tf_chip_1")),
                    bigwig("tf_chip_2", "fold change over control", &[3], None),
                    {
                        "@id": "tf_chip_3",
                        "assembly": "hg19",
                        "output_type": "fold change over control",
                        "file_format": "bigWig",
                        "biological_replicates": [1, 3],
                        "status": "released"
                    },
                    bigwig("tf_chip_4", "signal p-value", &[1, 3], None)
                ]
            },
            {
                "@id": "exp2",
                "assay_title": "Histone ChIP-seq",
                "replicates": released(&[1]),
                "original_files": [
                    bigwig("histone_chip_1", "fold change over control", &[1], Some("https://d.na/histone_chip_1"))
                ]
            },
            {
                "@id": "atac",
                "assay_title": "ATAC-seq",
                "replicates": released(&[1]),
                "original_files": [
                    bigwig("atac_1", "fold change over control", &[1], Some("https://a.tac/1"))
                ]
            },
            {
                "@id": "exp3",
                "assay_title": "DNase-seq",
                "replicates": released(&[1]),
                "original_files": [
                    bigwig("dnase", "read-depth normalized signal", &[1], Some("https://d.na/dnase"))
                ]
            },
            {"@id": "exp4", "assay_title": "WGBS"}
        ]
    }))
}

fn targeted() -> ReferenceEpigenome {
    epigenome(json!({
        "related_datasets": [
            {
                "@id": "exp3",
                "assay_title": "Histone ChIP-seq",
                "replicates": released(&[1]),
                "target": {"label": "H3K27ac"},
                "original_files": [
                    bigwig("file1", "fold change over control", &[1], Some("https://file.1"))
                ]
            },
            {
                "@id": "exp4",
                "assay_title": "TF ChIP-seq",
                "replicates": released(&[1]),
                "target": {"label": "EP300"},
                "original_files": [
                    bigwig("file2", "fold change over control", &[1], Some("https://file.2"))
                ]
            },
            {
                "@id": "exp5",
                "assay_title": "TF ChIP-seq",
                "replicates": released(&[1]),
                "target": {"label": "NANOG"},
                "original_files": [
                    bigwig("file3", "fold change over control", &[1], Some("https://file.3"))
                ]
            }
        ]
    }))
}

fn dnase_two_replicates(first_metrics: Value) -> ReferenceEpigenome {
    epigenome(json!({
        "related_datasets": [
            {
                "@id": "exp3",
                "assay_title": "DNase-seq",
                "replicates": released(&[1, 2]),
                "original_files": [
                    {
                        "@id": "bam1",
                        "output_type": "alignments",
                        "file_format": "bam",
                        "biological_replicates": [1],
                        "quality_metrics": first_metrics,
                        "status": "released"
                    },
                    {
                        "@id": "bam2",
                        "output_type": "alignments",
                        "file_format": "bam",
                        "biological_replicates": [2],
                        "quality_metrics": ["/samtools-flagstats-quality-metrics/2/"],
                        "status": "released"
                    },
                    bigwig("dnase", "read-depth normalized signal", &[1], Some("https://d.na/dnase")),
                    bigwig("dnase2", "read-depth normalized signal", &[2], Some("https://d.na/dnase2"))
                ]
            }
        ]
    }))
}

#[test]
fn one_file_per_assay_in_dataset_order() {
    let portal = MockPortal::with_flagstats();
    let urls = FileSelector::new(&portal)
        .select(&four_assays(), "GRCh38", None, &[])
        .unwrap();
    assert_eq!(
        urls,
        vec![
            "https://d.na/tf_chip_1",
            "https://d.na/histone_chip_1",
            "https://a.tac/1",
            "https://d.na/dnase",
        ]
    );
    assert!(portal.calls().is_empty());
}

#[test]
fn selection_is_repeatable() {
    let portal = MockPortal::with_flagstats();
    let selector = FileSelector::new(&portal);
    let snapshot = four_assays();
    let first = selector.select(&snapshot, "GRCh38", None, &[]).unwrap();
    let second = selector.select(&snapshot, "GRCh38", None, &[]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn dnase_prefers_replicate_with_more_mapped_reads() {
    let portal = MockPortal::with_flagstats();
    let snapshot = dnase_two_replicates(json!(["/samtools-flagstats-quality-metrics/1/"]));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert_eq!(urls, vec!["https://d.na/dnase"]);
    assert_eq!(
        portal.calls(),
        vec![
            "/samtools-flagstats-quality-metrics/1/",
            "/samtools-flagstats-quality-metrics/2/",
        ]
    );
}

#[test]
fn dnase_with_two_flagstats_on_one_file_is_ambiguous() {
    let portal = MockPortal::with_flagstats();
    let snapshot = dnase_two_replicates(json!([
        "/samtools-flagstats-quality-metrics/1/",
        "/samtools-flagstats-quality-metrics/2/"
    ]));
    let err = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::Selection(_));
}

#[test]
fn dnase_tie_is_an_error() {
    let mut portal = MockPortal::with_flagstats();
    portal.respond("/samtools-flagstats-quality-metrics/2/", json!({"mapped": 10}));
    let snapshot = dnase_two_replicates(json!(["/samtools-flagstats-quality-metrics/1/"]));
    let err = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::Selection(_));
}

#[test]
fn quality_metric_fetch_failure_aborts() {
    let portal = MockPortal::new();
    let snapshot = dnase_two_replicates(json!(["/samtools-flagstats-quality-metrics/1/"]));
    let err = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::PortalStatus { status: 404, .. });
}

#[test]
fn two_pooled_candidates_are_ambiguous() {
    let portal = MockPortal::new();
    let snapshot = epigenome(json!({
        "related_datasets": [{
            "@id": "exp1",
            "assay_title": "TF ChIP-seq",
            "replicates": released(&[1, 3]),
            "original_files": [
                bigwig("tf_chip_1", "fold change over control", &[1, 3], Some("https://d.na/tf_chip_1")),
                bigwig("tf_chip_2", "fold change over control", &[1, 3], None)
            ]
        }]
    }));
    let err = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::Selection(_));
}

#[test]
fn pooled_file_must_not_include_revoked_replicate() {
    let portal = MockPortal::new();
    let snapshot = epigenome(json!({
        "related_datasets": [{
            "@id": "exp1",
            "assay_title": "Histone ChIP-seq",
            "replicates": [
                {"biological_replicate_number": 1, "status": "released"},
                {"biological_replicate_number": 2, "status": "revoked"}
            ],
            "original_files": [
                bigwig("mixed", "fold change over control", &[1, 2], Some("https://d.na/mixed")),
                bigwig("clean", "fold change over control", &[1], Some("https://d.na/clean"))
            ]
        }]
    }));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert_eq!(urls, vec!["https://d.na/clean"]);
}

#[test]
fn differing_output_types_resolve_to_accepted_one() {
    let portal = MockPortal::new();
    let snapshot = epigenome(json!({
        "related_datasets": [{
            "@id": "exp1",
            "assay_title": "ATAC-seq",
            "replicates": released(&[1]),
            "original_files": [
                bigwig("pval", "signal p-value", &[1], Some("https://a.tac/pval")),
                bigwig("fc", "fold change over control", &[1], Some("https://a.tac/fc"))
            ]
        }]
    }));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert_eq!(urls, vec!["https://a.tac/fc"]);
}

#[test]
fn dataset_without_released_replicates_contributes_nothing() {
    let portal = MockPortal::new();
    let snapshot = epigenome(json!({
        "related_datasets": [{
            "@id": "exp1",
            "assay_title": "TF ChIP-seq",
            "replicates": [{"biological_replicate_number": 1, "status": "revoked"}],
            "original_files": [
                bigwig("tf", "fold change over control", &[1], Some("https://d.na/tf"))
            ]
        }]
    }));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert!(urls.is_empty());
}

#[test]
fn unreleased_dataset_and_files_are_dropped() {
    let portal = MockPortal::new();
    let mut revoked_file = bigwig("old", "fold change over control", &[1], Some("https://d.na/old"));
    revoked_file["status"] = json!("revoked");
    let snapshot = epigenome(json!({
        "related_datasets": [
            {
                "@id": "archived",
                "assay_title": "TF ChIP-seq",
                "status": "archived",
                "replicates": released(&[1]),
                "original_files": [
                    bigwig("tf", "fold change over control", &[1], Some("https://d.na/tf"))
                ]
            },
            {
                "@id": "exp2",
                "assay_title": "Histone ChIP-seq",
                "status": "released",
                "replicates": released(&[1]),
                "original_files": [
                    revoked_file,
                    bigwig("new", "fold change over control", &[1], Some("https://d.na/new"))
                ]
            }
        ]
    }));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert_eq!(urls, vec!["https://d.na/new"]);
}

#[test]
fn chip_targets_filter_datasets() {
    let portal = MockPortal::new();
    let targets = vec!["H3K27ac".to_string(), "EP300".to_string()];
    let urls = FileSelector::new(&portal)
        .select(&targeted(), "GRCh38", Some(&targets), &[])
        .unwrap();
    assert_eq!(urls, vec!["https://file.1", "https://file.2"]);
}

#[test]
fn missing_chip_target_is_a_configuration_error() {
    let portal = MockPortal::new();
    let targets = vec!["foo".to_string()];
    let err = FileSelector::new(&portal)
        .select(&targeted(), "GRCh38", Some(&targets), &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::Configuration(message) if message.contains("foo"));
}

#[test]
fn chip_target_check_runs_before_quality_metrics() {
    let portal = MockPortal::with_flagstats();
    let snapshot = dnase_two_replicates(json!(["/samtools-flagstats-quality-metrics/1/"]));
    let targets = vec!["CTCF".to_string()];
    let err = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", Some(&targets), &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::Configuration(_));
    assert!(portal.calls().is_empty());
}

#[test]
fn skip_assays_drop_matching_datasets() {
    let portal = MockPortal::new();
    let skip = vec!["TF ChIP-seq".to_string()];
    let urls = FileSelector::new(&portal)
        .select(&targeted(), "GRCh38", None, &skip)
        .unwrap();
    assert_eq!(urls, vec!["https://file.1"]);
}

#[test]
fn skip_assays_match_case_sensitively() {
    let portal = MockPortal::new();
    let skip = vec!["tf chip-seq".to_string()];
    let urls = FileSelector::new(&portal)
        .select(&targeted(), "GRCh38", None, &skip)
        .unwrap();
    assert_eq!(urls.len(), 3);
}

#[test]
fn other_assembly_yields_empty_result() {
    let portal = MockPortal::new();
    let urls = FileSelector::new(&portal)
        .select(&four_assays(), "mm10", None, &[])
        .unwrap();
    assert!(urls.is_empty());
}

#[test]
fn dnase_in_other_assembly_skips_quality_ranking() {
    let portal = MockPortal::with_flagstats();
    let snapshot = epigenome(json!({
        "related_datasets": [
            {
                "@id": "atac",
                "assay_title": "ATAC-seq",
                "replicates": released(&[1]),
                "original_files": [
                    bigwig("atac_1", "fold change over control", &[1], Some("https://a.tac/1"))
                ]
            },
            {
                "@id": "exp3",
                "assay_title": "DNase-seq",
                "replicates": released(&[1, 2]),
                "original_files": [
                    {
                        "@id": "bam1",
                        "assembly": "hg19",
                        "output_type": "alignments",
                        "file_format": "bam",
                        "biological_replicates": [1],
                        "quality_metrics": ["/samtools-flagstats-quality-metrics/1/"],
                        "status": "released"
                    },
                    {
                        "@id": "dnase1",
                        "assembly": "hg19",
                        "output_type": "read-depth normalized signal",
                        "file_format": "bigWig",
                        "biological_replicates": [1],
                        "status": "released"
                    },
                    {
                        "@id": "dnase2",
                        "assembly": "hg19",
                        "output_type": "read-depth normalized signal",
                        "file_format": "bigWig",
                        "biological_replicates": [2],
                        "status": "released"
                    }
                ]
            }
        ]
    }));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert_eq!(urls, vec!["https://a.tac/1".to_string()]);
    assert!(portal.calls().is_empty());
}

#[test]
fn dnase_two_replicates_in_other_assembly_yields_empty_result() {
    let portal = MockPortal::with_flagstats();
    let snapshot = dnase_two_replicates(json!(["/samtools-flagstats-quality-metrics/1/"]));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "hg19", None, &[])
        .unwrap();
    assert!(urls.is_empty());
    assert!(portal.calls().is_empty());
}

#[test]
fn selected_file_without_url_is_an_error() {
    let portal = MockPortal::new();
    let snapshot = epigenome(json!({
        "related_datasets": [{
            "@id": "exp1",
            "assay_title": "ATAC-seq",
            "replicates": released(&[1]),
            "original_files": [
                bigwig("atac", "fold change over control", &[1], None)
            ]
        }]
    }));
    let err = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap_err();
    assert_matches!(err, SegwayError::Selection(message) if message.contains("atac"));
}

#[test]
fn relative_download_urls_are_resolved() {
    let portal = MockPortal::new();
    let snapshot = epigenome(json!({
        "related_datasets": [{
            "@id": "exp1",
            "assay_title": "ATAC-seq",
            "replicates": released(&[1]),
            "original_files": [
                bigwig("atac", "fold change over control", &[1], Some("/files/atac/@@download/atac.bigWig"))
            ]
        }]
    }));
    let urls = FileSelector::new(&portal)
        .select(&snapshot, "GRCh38", None, &[])
        .unwrap();
    assert_eq!(urls, vec!["https://www.qux.io/files/atac/@@download/atac.bigWig"]);
}
