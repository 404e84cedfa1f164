use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::models::item::Item;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Telegram caps messages at 4096 chars; stay under with room for markup.
const MESSAGE_MAX_CHARS: usize = 3500;

/// Delivery seam for the polling engine. Failures are the caller's to log;
/// they never affect seen-set commitment.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let params = [
            ("chat_id", chat_id),
            ("text", text),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "true"),
        ];

        self.client
            .post(&url)
            .form(&params)
            .send()
            .await
            .context("Telegram sendMessage request failed")?
            .error_for_status()
            .context("Telegram sendMessage returned an error status")?;

        Ok(())
    }
}

// ============================================================================
// Message rendering
// ============================================================================

#[must_use]
pub fn new_item_message(label: Option<&str>, item: &Item) -> String {
    match label {
        Some(label) => format!("🆕 <b>{}</b>\n\n{}", escape(label), summarize_item(item)),
        None => format!("🆕 Nuovo bando inPA:\n\n{}", summarize_item(item)),
    }
}

#[must_use]
pub fn check_failed_message(label: &str, failed: usize) -> String {
    format!(
        "⚠️ Errore controllo inPA ({}): {} richieste fallite.",
        escape(label),
        failed
    )
}

/// Compact HTML summary of one notice.
#[must_use]
pub fn summarize_item(item: &Item) -> String {
    let mut parts: Vec<String> = vec![format!("<b>{}</b>\n", escape(item.title()))];

    if let Some(code) = item.codice.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("Codice: <code>{}</code>\n", escape(code)));
    }
    if let Some(figure) = item.figura_ricercata.as_deref().filter(|f| !f.is_empty()) {
        parts.push(format!("👷 <b>Figura ricercata</b>: {}", escape(figure)));
    }
    if let Some(procedure) = item.tipo_procedura.as_deref().filter(|p| !p.is_empty()) {
        parts.push(format!("📚 <b>Tipo di procedura</b>: {}", escape(procedure)));
    }
    parts.push(format!(
        "🏫 <b>Ente</b>: {}",
        escape(&join_or_dash(&item.enti_riferimento))
    ));
    parts.push(format!("📍 <b>Sedi</b>: {}", escape(&join_or_dash(&item.sedi))));
    parts.push(format!(
        "📅 <b>Pubblicato</b>: {}",
        fmt_date(item.data_pubblicazione.as_deref())
    ));
    parts.push(format!(
        "⏰ <b>Scadenza</b>: {}\n",
        fmt_date(item.data_scadenza.as_deref())
    ));
    parts.push(format!(
        "🔗 <a href=\"{}\">Apri la pagina su inPA</a>",
        item.details_url()
    ));

    truncate_message(&parts.join("\n"))
}

fn escape(s: &str) -> String {
    html_escape::encode_text(s).to_string()
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "—".to_string()
    } else {
        values.join(", ")
    }
}

/// Formats a raw catalog timestamp for display, falling back to the raw
/// value when it is not valid RFC 3339.
fn fmt_date(iso: Option<&str>) -> String {
    iso.map_or_else(
        || "—".to_string(),
        |raw| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .map_or_else(|_| raw.to_string(), |dt| dt.format("%d/%m/%Y %H:%M").to_string())
        },
    )
}

fn truncate_message(s: &str) -> String {
    if s.chars().count() <= MESSAGE_MAX_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MESSAGE_MAX_CHARS - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item {
            id: "abc".to_string(),
            titolo: Some("Istruttore <tecnico>".to_string()),
            enti_riferimento: vec!["Comune di Pisa".to_string()],
            data_pubblicazione: Some("2024-01-02T10:30:00Z".to_string()),
            ..Item::default()
        }
    }

    #[test]
    fn summary_escapes_html_in_display_fields() {
        let text = summarize_item(&item());
        assert!(text.contains("Istruttore &lt;tecnico&gt;"));
        assert!(text.contains("Comune di Pisa"));
        assert!(text.contains("02/01/2024 10:30"));
        assert!(text.contains("concorso_id=abc"));
    }

    #[test]
    fn label_prefix_only_in_multi_search_mode() {
        let with_label = new_item_message(Some("bibliotec · Concorsi"), &item());
        assert!(with_label.starts_with("🆕 <b>bibliotec · Concorsi</b>"));

        let without = new_item_message(None, &item());
        assert!(without.starts_with("🆕 Nuovo bando inPA:"));
    }

    #[test]
    fn unparseable_dates_fall_back_to_the_raw_value() {
        assert_eq!(fmt_date(Some("2024-01-02T10:00:00")), "2024-01-02T10:00:00");
        assert_eq!(fmt_date(None), "—");
    }

    #[test]
    fn oversized_messages_are_truncated() {
        let text = truncate_message(&"a".repeat(5000));
        assert_eq!(text.chars().count(), 3500);
        assert!(text.ends_with('…'));
    }
}
