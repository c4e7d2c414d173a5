use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{fold_catalog_pages, ReferenceVocabulary, VocabularyDocument};

const NOTION_VERSION: &str = "2022-06-28";
// Guard against a catalog that never stops reporting `has_more`.
const MAX_CATALOG_PAGES: usize = 200;

/// Source of truth for the reference vocabulary.
#[async_trait]
pub trait VocabularyProvider: Send + Sync {
    /// Fetch a complete vocabulary. Partial results are errors.
    async fn fetch(&self) -> anyhow::Result<ReferenceVocabulary>;

    /// Name of this provider for logging
    fn name(&self) -> &'static str;
}

/// Fixed vocabulary for tests.
#[cfg(test)]
pub struct StaticProvider(pub ReferenceVocabulary);

#[cfg(test)]
#[async_trait]
impl VocabularyProvider for StaticProvider {
    async fn fetch(&self) -> anyhow::Result<ReferenceVocabulary> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// JSON or YAML file holding either a [`VocabularyDocument`] or a catalog
/// dump of the form `{"results": [page, ...]}`.
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_yaml(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }
}

#[async_trait]
impl VocabularyProvider for FileProvider {
    async fn fetch(&self) -> anyhow::Result<ReferenceVocabulary> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;

        let value: Value = if self.is_yaml() {
            serde_yml::from_str(&text)
                .with_context(|| format!("{} is not valid yaml", self.path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid json", self.path.display()))?
        };

        parse_vocabulary_value(value)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

fn parse_vocabulary_value(value: Value) -> anyhow::Result<ReferenceVocabulary> {
    if let Some(results) = value.get("results") {
        let Some(pages) = results.as_array() else {
            bail!("catalog dump `results` must be a list of pages");
        };
        return Ok(fold_catalog_pages(pages));
    }

    let doc: VocabularyDocument =
        serde_json::from_value(value).context("vocabulary document is malformed")?;
    Ok(doc.into())
}

/// Document-database catalog (Notion API compatible), queried page by page.
pub struct CatalogProvider {
    base_url: String,
    database_id: String,
    token: String,
    client: reqwest::Client,
}

impl CatalogProvider {
    pub fn new(
        base_url: &str,
        database_id: &str,
        token: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            database_id: database_id.to_string(),
            token,
            client,
        })
    }

    async fn query_page(&self, cursor: Option<&str>) -> anyhow::Result<Value> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        log::debug!("{url} cursor={cursor:?}");

        let mut body = json!({});
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("catalog query failed with {status}: {text}");
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl VocabularyProvider for CatalogProvider {
    async fn fetch(&self) -> anyhow::Result<ReferenceVocabulary> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_CATALOG_PAGES {
            let response = self.query_page(cursor.as_deref()).await?;

            let Some(results) = response.get("results").and_then(|v| v.as_array()) else {
                bail!("catalog response has no `results` list");
            };
            pages.extend(results.iter().cloned());

            let has_more = response
                .get("has_more")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            cursor = response
                .get("next_cursor")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            if !has_more || cursor.is_none() {
                log::info!("fetched {} catalog rows", pages.len());
                return Ok(fold_catalog_pages(&pages));
            }
        }

        bail!("catalog still reports more rows after {MAX_CATALOG_PAGES} pages")
    }

    fn name(&self) -> &'static str {
        "catalog"
    }
}
