use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{EpigenomeAccession, ReferenceEpigenome};
use crate::error::SegwayError;

pub const DEFAULT_BASE_URL: &str = "https://www.encodeproject.org/";

/// Read-only access to the portal. Implementors only provide the two transport
/// primitives; the portal queries are built on top of them.
pub trait PortalGateway {
    fn fetch_json(&self, path: &str) -> Result<Value, SegwayError>;

    fn resolve_url(&self, path: &str) -> Result<String, SegwayError>;

    fn search(&self, query: &[(&str, &str)]) -> Result<Vec<Value>, SegwayError> {
        let path = search_path(query);
        let body = self.fetch_json(&path)?;
        match body.get("@graph") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(SegwayError::PortalBody {
                path,
                message: "search response has no @graph array".to_string(),
            }),
        }
    }

    /// Fetches the reference epigenome and expands every `original_files` path into
    /// the file objects it names.
    fn reference_epigenome(
        &self,
        accession: &EpigenomeAccession,
    ) -> Result<ReferenceEpigenome, SegwayError> {
        let path = accession.portal_path();
        let mut body = self.fetch_json(&path)?;
        if let Some(Value::Array(datasets)) = body.get_mut("related_datasets") {
            for dataset in datasets.iter_mut() {
                let Some(Value::Array(files)) = dataset.get_mut("original_files") else {
                    continue;
                };
                let mut expanded = Vec::with_capacity(files.len());
                for file in files.drain(..) {
                    match file {
                        Value::String(file_path) => {
                            debug!(file = %file_path, "expanding file reference");
                            expanded.extend(self.search(&[
                                ("type", "File"),
                                ("@id", file_path.as_str()),
                                ("frame", "object"),
                            ])?);
                        }
                        other => expanded.push(other),
                    }
                }
                *files = expanded;
            }
        }
        serde_json::from_value(body).map_err(|err| SegwayError::PortalBody {
            path,
            message: err.to_string(),
        })
    }

    fn file_download_url(&self, path: &str) -> Result<String, SegwayError> {
        let file = self.fetch_json(path)?;
        let url = file
            .get("cloud_metadata")
            .and_then(|value| value.get("url"))
            .and_then(|value| value.as_str())
            .ok_or_else(|| SegwayError::PortalBody {
                path: path.to_string(),
                message: "file has no cloud_metadata.url".to_string(),
            })?;
        self.resolve_url(url)
    }

    fn file_assembly(&self, path: &str) -> Result<String, SegwayError> {
        let file = self.fetch_json(path)?;
        file.get("assembly")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .ok_or_else(|| {
                SegwayError::Configuration(format!("could not determine assembly from {path}"))
            })
    }
}

/// Query values are inserted verbatim; the portal expects raw `@id` paths.
pub fn search_path(query: &[(&str, &str)]) -> String {
    let params = query
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("search/?{params}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn parse(value: &str) -> Result<Self, SegwayError> {
        let url = Url::parse(value).map_err(|err| {
            SegwayError::Configuration(format!("invalid base URL {value}: {err}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SegwayError::Configuration(format!(
                "base URL must use http or https: {value}"
            )));
        }
        if !value.ends_with('/') {
            return Err(SegwayError::Configuration(format!(
                "base URL must end with a slash: {value}"
            )));
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Paths that already carry a scheme are returned unchanged.
    pub fn resolve(&self, path: &str) -> Result<String, SegwayError> {
        if Url::parse(path).is_ok() {
            return Ok(path.to_string());
        }
        self.0
            .join(path)
            .map(|url| url.to_string())
            .map_err(|err| SegwayError::Configuration(format!("cannot resolve {path}: {err}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Keypair {
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
struct KeypairFile {
    submit: Option<Keypair>,
}

impl Keypair {
    pub fn load(path: &Utf8Path) -> Result<Self, SegwayError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| SegwayError::Filesystem(format!("read keypair {path}: {err}")))?;
        parse_keypair(&content, path.as_str())
    }

    pub fn parse(content: &str) -> Result<Self, SegwayError> {
        parse_keypair(content, "keypair")
    }
}

fn parse_keypair(content: &str, origin: &str) -> Result<Keypair, SegwayError> {
    let file: KeypairFile = serde_json::from_str(content)
        .map_err(|err| SegwayError::Configuration(format!("keypair file {origin}: {err}")))?;
    file.submit.ok_or_else(|| {
        SegwayError::Configuration(format!("keypair file {origin}: missing \"submit\" section"))
    })
}

#[derive(Clone)]
pub struct PortalHttpClient {
    client: Client,
    base_url: BaseUrl,
    keypair: Option<Keypair>,
}

impl PortalHttpClient {
    pub fn new(base_url: BaseUrl, keypair: Option<Keypair>) -> Result<Self, SegwayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("segway-inputs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SegwayError::Configuration(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SegwayError::PortalHttp {
                path: base_url.as_str().to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url,
            keypair,
        })
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    fn handle_status(
        path: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SegwayError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "portal request failed".to_string());
        Err(SegwayError::PortalStatus {
            path: path.to_string(),
            status,
            message,
        })
    }
}

impl PortalGateway for PortalHttpClient {
    fn fetch_json(&self, path: &str) -> Result<Value, SegwayError> {
        let url = self.resolve_url(path)?;
        debug!(%url, "portal.request");
        let mut request = self.client.get(&url);
        if let Some(keypair) = &self.keypair {
            request = request.basic_auth(&keypair.key, Some(&keypair.secret));
        }
        let response = request.send().map_err(|err| SegwayError::PortalHttp {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let response = Self::handle_status(path, response)?;
        let body: Value = response.json().map_err(|err| SegwayError::PortalBody {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        if !body.is_object() {
            return Err(SegwayError::PortalBody {
                path: path.to_string(),
                message: "expected a JSON object".to_string(),
            });
        }
        Ok(body)
    }

    fn resolve_url(&self, path: &str) -> Result<String, SegwayError> {
        self.base_url.resolve(path)
    }
}
