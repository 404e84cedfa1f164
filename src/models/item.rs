use serde::{Deserialize, Serialize};

/// One competition notice as returned by the catalog, deserialized with its
/// wire field names. Only `id` (dedup key) and `data_pubblicazione`
/// (ordering) matter to the engine; everything else is display payload
/// passed through to notifications unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub id: String,
    pub titolo: Option<String>,
    pub codice: Option<String>,
    pub data_pubblicazione: Option<String>,
    pub data_scadenza: Option<String>,
    pub enti_riferimento: Vec<String>,
    pub sedi: Vec<String>,
    pub figura_ricercata: Option<String>,
    pub tipo_procedura: Option<String>,
    pub link_reindirizzamento: Option<String>,
}

impl Item {
    /// Raw publication timestamp used for ordering. Items without one sort
    /// as the empty string, i.e. last in descending order.
    #[must_use]
    pub fn published_key(&self) -> &str {
        self.data_pubblicazione.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.titolo.as_deref().unwrap_or("(senza titolo)")
    }

    /// Public detail page for this notice on the inPA portal.
    #[must_use]
    pub fn details_url(&self) -> String {
        format!(
            "https://www.inpa.gov.it/bandi-e-avvisi/dettaglio-bando-avviso/?concorso_id={}",
            urlencoding::encode(&self.id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_field_names() {
        let raw = serde_json::json!({
            "id": "abc-123",
            "titolo": "Istruttore bibliotecario",
            "dataPubblicazione": "2024-01-02T10:00:00Z",
            "entiRiferimento": ["Comune di Pisa"],
            "sedi": ["Pisa"],
            "linkReindirizzamento": "https://example.org/apply",
            "unknownField": 42
        });

        let item: Item = serde_json::from_value(raw).unwrap();
        assert_eq!(item.id, "abc-123");
        assert_eq!(item.published_key(), "2024-01-02T10:00:00Z");
        assert_eq!(item.enti_riferimento, vec!["Comune di Pisa".to_string()]);
        assert_eq!(item.data_scadenza, None);
    }

    #[test]
    fn details_url_escapes_the_id() {
        let item = Item {
            id: "a b".to_string(),
            ..Item::default()
        };
        assert!(item.details_url().ends_with("concorso_id=a%20b"));
    }
}
