use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::item::Item;
use crate::models::search::QuerySpec;

pub const DEFAULT_BASE_URL: &str = "https://portale.inpa.gov.it/concorsi-smart/api/concorso";

/// Narrow seam between the polling engine and the remote catalog. One call
/// executes one single-valued query; any transport or status failure is a
/// single generic error, counted by the caller and never fatal.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, spec: &QuerySpec) -> Result<Vec<Item>>;
}

/// Request body for the `search-better` endpoint. The upstream accepts one
/// value per filter dimension; `None` serializes to `null`, meaning "no
/// filter on that dimension".
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchPayload<'a> {
    text: &'a str,
    categoria_id: &'a str,
    regione_id: Option<&'a str>,
    status: [&'a str; 1],
    settore_id: Option<&'a str>,
    provincia_codice: Option<&'a str>,
}

impl<'a> SearchPayload<'a> {
    fn from_spec(spec: &'a QuerySpec) -> Self {
        Self {
            text: &spec.text,
            categoria_id: &spec.category_id,
            regione_id: spec.region_id.as_deref(),
            // Closed notices never produce notifications.
            status: ["OPEN"],
            settore_id: spec.sector_id.as_deref(),
            provincia_codice: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    content: Vec<Item>,
}

/// One selectable value from the vocabulary endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct VocabEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RegionRow {
    #[serde(rename = "zonaId")]
    zona_id: String,
    #[serde(rename = "zonaDenominazione")]
    zona_denominazione: String,
    #[serde(rename = "concorsiCount", default)]
    concorsi_count: Option<i64>,
}

#[derive(Clone)]
pub struct InpaClient {
    client: Client,
    base_url: String,
}

impl InpaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}-public-area/search-better", self.base_url)
    }

    pub async fn fetch_categories(&self) -> Result<Vec<VocabEntry>> {
        let url = format!("{}/get-categorie", self.base_url);
        let entries = self
            .client
            .get(&url)
            .send()
            .await
            .context("Category catalog request failed")?
            .error_for_status()
            .context("Category catalog returned an error status")?
            .json()
            .await
            .context("Category catalog returned invalid JSON")?;
        Ok(entries)
    }

    pub async fn fetch_sectors(&self) -> Result<Vec<VocabEntry>> {
        let url = format!("{}/get-settori", self.base_url);
        let entries = self
            .client
            .get(&url)
            .send()
            .await
            .context("Sector catalog request failed")?
            .error_for_status()
            .context("Sector catalog returned an error status")?
            .json()
            .await
            .context("Sector catalog returned invalid JSON")?;
        Ok(entries)
    }

    /// The region endpoint speaks `zonaId`/`zonaDenominazione`; rows are
    /// normalized into the same shape as the other vocabularies.
    pub async fn fetch_regions(&self) -> Result<Vec<VocabEntry>> {
        let url = format!("{}/get-count-by-regione", self.base_url);
        let rows: Vec<RegionRow> = self
            .client
            .get(&url)
            .send()
            .await
            .context("Region catalog request failed")?
            .error_for_status()
            .context("Region catalog returned an error status")?
            .json()
            .await
            .context("Region catalog returned invalid JSON")?;

        Ok(rows
            .into_iter()
            .map(|r| VocabEntry {
                id: r.zona_id,
                name: r.zona_denominazione,
                count: r.concorsi_count,
            })
            .collect())
    }
}

#[async_trait]
impl CatalogSearch for InpaClient {
    async fn search(&self, spec: &QuerySpec) -> Result<Vec<Item>> {
        let page: SearchPage = self
            .client
            .post(self.search_url())
            .json(&SearchPayload::from_spec(spec))
            .send()
            .await
            .context("inPA search request failed")?
            .error_for_status()
            .context("inPA search returned an error status")?
            .json()
            .await
            .context("inPA search returned invalid JSON")?;

        Ok(page.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_wire_field_names() {
        let spec = QuerySpec {
            text: "bibliotec".to_string(),
            category_id: "C1".to_string(),
            region_id: None,
            sector_id: Some("S9".to_string()),
        };

        let value = serde_json::to_value(SearchPayload::from_spec(&spec)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "text": "bibliotec",
                "categoriaId": "C1",
                "regioneId": null,
                "status": ["OPEN"],
                "settoreId": "S9",
                "provinciaCodice": null
            })
        );
    }

    #[test]
    fn region_rows_normalize_to_vocab_entries() {
        let raw = r#"[{"zonaId": "12", "zonaDenominazione": "Lazio", "concorsiCount": 7}]"#;
        let rows: Vec<RegionRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].zona_id, "12");
        assert_eq!(rows[0].zona_denominazione, "Lazio");
        assert_eq!(rows[0].concorsi_count, Some(7));
    }
}
