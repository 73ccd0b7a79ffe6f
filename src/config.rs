use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{EpigenomeAccession, KNOWN_ASSAYS};
use crate::error::SegwayError;
use crate::input_json::DEFAULT_NAMESPACE;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Keys the tool fills in itself.
pub const RESERVED_KEYS: [&str; 3] = ["bigwigs", "annotation_gtf", "chrom_sizes"];

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub accession: String,
    pub chrom_sizes: String,
    pub annotation_gtf: String,
    pub skip_assays: Vec<String>,
    pub chip_targets: Vec<String>,
    pub namespace: Option<String>,
    /// JSON object of extra scalar parameters.
    pub params_file: Option<Utf8PathBuf>,
    pub params: Vec<(String, Value)>,
    pub raw_params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputRequest {
    pub accession: EpigenomeAccession,
    pub chrom_sizes: String,
    pub annotation_gtf: String,
    pub skip_assays: Vec<String>,
    pub chip_targets: Option<Vec<String>>,
    pub namespace: String,
    pub params: BTreeMap<String, Value>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Later sources win: params file, then typed flags, then `KEY=VALUE` pairs.
    pub fn resolve(config: RunConfig) -> Result<InputRequest, SegwayError> {
        let accession = config.accession.parse()?;
        validate_skip_assays(&config.skip_assays)?;

        let namespace = config
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if !IDENTIFIER.is_match(&namespace) {
            return Err(SegwayError::Configuration(format!(
                "invalid namespace: {namespace}"
            )));
        }

        let mut params = BTreeMap::new();
        if let Some(path) = &config.params_file {
            params.extend(Self::load_params_file(path)?);
        }
        params.extend(config.params);
        for raw in &config.raw_params {
            let (key, value) = parse_param(raw)?;
            params.insert(key, value);
        }
        for (key, value) in &params {
            validate_param(key, value)?;
        }

        let chip_targets = (!config.chip_targets.is_empty()).then(|| {
            let mut unique = Vec::new();
            for target in config.chip_targets {
                if !unique.contains(&target) {
                    unique.push(target);
                }
            }
            unique
        });

        Ok(InputRequest {
            accession,
            chrom_sizes: config.chrom_sizes,
            annotation_gtf: config.annotation_gtf,
            skip_assays: config.skip_assays,
            chip_targets,
            namespace,
            params,
        })
    }

    pub fn load_params_file(path: &Utf8Path) -> Result<Map<String, Value>, SegwayError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| SegwayError::Filesystem(format!("read params {path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| {
            SegwayError::Configuration(format!("params file {path} is not a JSON object: {err}"))
        })
    }
}

pub fn validate_skip_assays(skip_assays: &[String]) -> Result<(), SegwayError> {
    let unknown = skip_assays
        .iter()
        .filter(|assay| !KNOWN_ASSAYS.contains(&assay.as_str()))
        .map(String::as_str)
        .collect::<Vec<_>>();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(SegwayError::Configuration(format!(
        "unknown assays to skip: {} (valid: {})",
        unknown.join(", "),
        KNOWN_ASSAYS.join(", ")
    )))
}

/// Parses `KEY=VALUE`. Numbers and booleans keep their JSON type, anything else is
/// taken as a string.
pub fn parse_param(raw: &str) -> Result<(String, Value), SegwayError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        SegwayError::Configuration(format!("parameter must look like KEY=VALUE: {raw}"))
    })?;
    let key = key.trim();
    let value = value.trim();
    let parsed = match serde_json::from_str::<Value>(value) {
        Ok(parsed @ (Value::Number(_) | Value::Bool(_))) => parsed,
        _ => Value::String(value.to_string()),
    };
    Ok((key.to_string(), parsed))
}

fn validate_param(key: &str, value: &Value) -> Result<(), SegwayError> {
    if !IDENTIFIER.is_match(key) {
        return Err(SegwayError::Configuration(format!(
            "invalid parameter name: {key}"
        )));
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(SegwayError::Configuration(format!(
            "parameter {key} is filled in automatically"
        )));
    }
    if matches!(value, Value::Array(_) | Value::Object(_) | Value::Null) {
        return Err(SegwayError::Configuration(format!(
            "parameter {key} must be a scalar"
        )));
    }
    Ok(())
}
