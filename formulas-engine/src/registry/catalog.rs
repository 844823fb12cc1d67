//! Remote catalog fetching and descriptor parsing.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};

use super::error::{RegistryError, Result};
use super::scan::is_formula_name;
use crate::config::CatalogConfig;
use crate::params::ParamSpec;
use crate::record::FormulaRecord;

/// Source of formula descriptors and formula source files.
pub trait Catalog: Send + Sync {
    /// Fetch every formula the catalog lists.
    fn fetch(&self) -> impl Future<Output = Result<Vec<FormulaRecord>>> + Send;

    /// Download the source file at `url`.
    fn fetch_source(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// One entry of the catalog document.
///
/// Field aliases accept the camel-case names older catalogs publish.
#[derive(Debug, Clone, Deserialize)]
struct Descriptor {
    name: String,
    #[serde(default, alias = "niceName")]
    display_name: String,
    #[serde(default, alias = "tooltip")]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default, alias = "downloadURL")]
    source_url: String,
    #[serde(default, alias = "htmlURL")]
    page_url: String,
    #[serde(default, alias = "apiURL")]
    api_url: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    params: Vec<ParamSpec>,
}

/// Entries stay raw JSON so one malformed descriptor cannot reject the rest.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<serde_json::Value>),
    Wrapped { formulas: Vec<serde_json::Value> },
}

impl From<Descriptor> for FormulaRecord {
    fn from(d: Descriptor) -> Self {
        Self {
            name: d.name,
            display_name: d.display_name,
            description: d.description,
            author: d.author,
            source_url: d.source_url,
            page_url: d.page_url,
            api_url: d.api_url,
            source_updated_at: d.updated_at,
            sha256: d.sha256.map(|s| s.to_ascii_lowercase()),
            params: d.params,
            ..Default::default()
        }
    }
}

/// Parse a catalog document.
///
/// Accepts a bare array of descriptors or `{ "formulas": [...] }`. Entries
/// that do not deserialize, or whose name is not a valid formula name, are
/// skipped with a warning; duplicate names keep the first entry.
///
/// # Errors
///
/// Returns an error if the document is not valid JSON of either shape.
pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<FormulaRecord>> {
    let document: CatalogDocument = serde_json::from_slice(bytes)?;
    let entries = match document {
        CatalogDocument::List(list) => list,
        CatalogDocument::Wrapped { formulas } => formulas,
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let descriptor: Descriptor = match serde_json::from_value(entry) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Skipping catalog entry {}: {}", index, e);
                continue;
            }
        };
        let name = descriptor.name.trim().to_string();
        if !is_formula_name(&name) {
            warn!("Skipping catalog entry {} with invalid name '{}'", index, name);
            continue;
        }
        if !seen.insert(name.clone()) {
            warn!("Skipping duplicate catalog entry '{}'", name);
            continue;
        }
        records.push(FormulaRecord::from(Descriptor { name, ..descriptor }));
    }
    Ok(records)
}

/// HTTP catalog client with timeout and bounded exponential-backoff retry.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl HttpCatalog {
    /// Create a client for the configured catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RegistryError::Network {
                url: config.url.clone(),
                source: e,
            })?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// The catalog document URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn get_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut retry = 0;
        loop {
            match self.get_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if retry + 1 < self.config.max_attempts && is_retryable(&e) => {
                    let delay = self.config.backoff(retry);
                    warn!(
                        "Attempt {} of {} failed: {}; retrying in {:?}",
                        retry + 1,
                        self.config.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RegistryError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RegistryError::Network {
                url: url.to_string(),
                source: e,
            })?;
        Ok(bytes.to_vec())
    }
}

/// Connection failures, timeouts, throttling and server errors are worth retrying.
fn is_retryable(err: &RegistryError) -> bool {
    match err {
        RegistryError::Network { .. } => true,
        RegistryError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

impl Catalog for HttpCatalog {
    async fn fetch(&self) -> Result<Vec<FormulaRecord>> {
        let bytes = self.get_with_retry(&self.config.url).await?;
        let records = parse_catalog(&bytes)?;
        debug!("Catalog listed {} formula(s)", records.len());
        Ok(records)
    }

    async fn fetch_source(&self, url: &str) -> Result<Vec<u8>> {
        self.get_with_retry(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CATALOG_JSON: &str = r#"{
        "formulas": [
            {
                "name": "alignObjects",
                "display_name": "Align Objects",
                "author": "someone",
                "source_url": "https://example.com/alignObjects.cs",
                "updated_at": "2024-05-01T10:00:00Z",
                "sha256": "ABCDEF",
                "params": [{ "name": "spacing", "kind": "float", "default": "1.5" }]
            },
            { "name": "", "source_url": "https://example.com/x.cs" },
            { "name": "alignObjects", "author": "duplicate" }
        ]
    }"#;

    /// Serve canned `(status, body)` responses, one connection each.
    async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> std::io::Result<(String, Arc<AtomicUsize>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Ok((format!("http://{addr}/catalog.json"), hits))
    }

    fn test_config(url: &str, max_attempts: u32) -> CatalogConfig {
        CatalogConfig {
            url: url.to_string(),
            timeout_secs: 5,
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_wrapped_catalog() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let records = parse_catalog(CATALOG_JSON.as_bytes())?;
        assert_eq!(records.len(), 1, "unnamed and duplicate entries are skipped");

        let align = &records[0];
        assert_eq!(align.name, "alignObjects");
        assert_eq!(align.author, "someone");
        assert_eq!(align.sha256.as_deref(), Some("abcdef"));
        assert_eq!(align.params.len(), 1);
        assert!(align.source_updated_at.is_some());
        assert!(!align.hidden);
        assert!(align.local_path.is_none());
        Ok(())
    }

    #[test]
    fn test_parse_bare_list_with_legacy_names() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let json = r#"[{
            "name": "RenameAssets",
            "niceName": "Rename Assets",
            "tooltip": "Batch rename",
            "downloadURL": "https://example.com/RenameAssets.cs",
            "htmlURL": "https://example.com/RenameAssets",
            "apiURL": "https://api.example.com/RenameAssets"
        }]"#;
        let records = parse_catalog(json.as_bytes())?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name, "Rename Assets");
        assert_eq!(records[0].description, "Batch rename");
        assert_eq!(records[0].source_url, "https://example.com/RenameAssets.cs");
        assert_eq!(records[0].page_url, "https://example.com/RenameAssets");
        assert_eq!(records[0].api_url, "https://api.example.com/RenameAssets");
        Ok(())
    }

    #[test]
    fn test_parse_skips_malformed_entries() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let json = r#"[
            { "name": "Good", "source_url": "https://example.com/Good.cs" },
            { "source_url": "https://example.com/Nameless.cs" },
            { "name": null },
            { "name": "Bad", "updated_at": "yesterday" },
            42
        ]"#;
        let records = parse_catalog(json.as_bytes())?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Good");
        Ok(())
    }

    #[test]
    fn test_parse_rejects_path_like_names() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let json = r#"{ "formulas": [
            { "name": "../escaped", "source_url": "https://example.com/a.cs" },
            { "name": "/etc/passwd", "source_url": "https://example.com/b.cs" },
            { "name": "nested/Tool", "source_url": "https://example.com/c.cs" },
            { "name": "Tool", "source_url": "https://example.com/Tool.cs" }
        ] }"#;
        let records = parse_catalog(json.as_bytes())?;
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Tool"]);
        Ok(())
    }

    #[test]
    fn test_parse_invalid_catalog() {
        let Err(err) = parse_catalog(b"{\"formulas\": 3}") else {
            panic!("expected parse failure");
        };
        assert!(matches!(err, RegistryError::JsonParse { .. }));
    }

    #[test]
    fn test_retryable_errors() {
        let status = |status| RegistryError::HttpStatus {
            url: String::new(),
            status,
        };
        assert!(is_retryable(&status(503)));
        assert!(is_retryable(&status(429)));
        assert!(!is_retryable(&status(404)));
        assert!(!is_retryable(&RegistryError::FormulaNotFound {
            name: String::new()
        }));
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (url, hits) = serve(vec![(503, ""), (200, CATALOG_JSON)]).await?;
        let catalog = HttpCatalog::new(&test_config(&url, 3))?;

        let records = catalog.fetch().await?;
        assert_eq!(records.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_client_errors() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (url, hits) = serve(vec![(404, ""), (200, CATALOG_JSON)]).await?;
        let catalog = HttpCatalog::new(&test_config(&url, 3))?;

        let Err(err) = catalog.fetch().await else {
            panic!("404 should fail");
        };
        assert!(matches!(err, RegistryError::HttpStatus { status: 404, .. }));
        assert!(err.is_network());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_attempts() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (url, hits) = serve(vec![(500, ""), (500, ""), (200, CATALOG_JSON)]).await?;
        let catalog = HttpCatalog::new(&test_config(&url, 2))?;

        let Err(err) = catalog.fetch().await else {
            panic!("should give up after two attempts");
        };
        assert!(matches!(err, RegistryError::HttpStatus { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_source_returns_body() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (url, _hits) = serve(vec![(200, "class Tool {}")]).await?;
        let catalog = HttpCatalog::new(&test_config(&url, 1))?;

        let bytes = catalog.fetch_source(&url).await?;
        assert_eq!(bytes, b"class Tool {}");
        Ok(())
    }
}
