use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::{TelegramConfig, NOTIFY_TIMEOUT_SECS};
use crate::error::NotifyError;
use crate::types::NotificationEvent;

/// Delivery channel for alerts. Best-effort: callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Plain-text (Telegram Markdown) rendering of an event.
pub fn format_message(event: &NotificationEvent) -> String {
    let (header, category, price, link) = match event {
        NotificationEvent::NewLowestPrice {
            price,
            category,
            link,
        } => (
            "🚨 *NOVO MENOR PREÇO!* 🚨".to_string(),
            category,
            *price,
            link,
        ),
        NotificationEvent::ListingSold {
            old_price,
            new_price,
            category,
            link,
        } => (
            format!(
                "⚠️ *INGRESSO ANTERIOR VENDIDO!* ⚠️\nAnterior: R$ {old_price}\n💸 Novo preço mais baixo:"
            ),
            category,
            *new_price,
            link,
        ),
    };

    let mut msg = format!(
        "{header}\n\nCategoria: {}\nValor: *R$ {price}*",
        escape_markdown(category)
    );
    if let Some(link) = link {
        msg.push_str(&format!("\n\n🎫 Acesse o site: {}", escape_markdown(link)));
    }
    msg
}

/// Escape the characters legacy Telegram Markdown treats as entity markers.
/// Backend-supplied text goes through this so a stray `_` or `*` cannot
/// unbalance the message and get it rejected.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    cfg: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(cfg: TelegramConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, cfg })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.cfg.api_url.trim_end_matches('/'),
            self.cfg.token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let text = format_message(event);
        let body = SendMessage {
            chat_id: &self.cfg.chat_id,
            text: &text,
            parse_mode: "Markdown",
        };

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("[NOTIFY] telegram alert sent: {event}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unconfigured
// ---------------------------------------------------------------------------

/// Used when no Telegram credentials are set: the alert is only logged.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        info!("[NOTIFY] alert (not delivered):\n{}", format_message(event));
        Ok(())
    }
}

pub fn build_notifier(cfg: Option<&TelegramConfig>) -> Result<Box<dyn Notifier>, NotifyError> {
    match cfg {
        Some(tg) => Ok(Box::new(TelegramNotifier::new(tg.clone())?)),
        None => Ok(Box::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_low_message_includes_price_category_and_link() {
        let msg = format_message(&NotificationEvent::NewLowestPrice {
            price: 250,
            category: "Meia Estudante".to_string(),
            link: Some("https://tickets.test/a".to_string()),
        });
        assert!(msg.starts_with("🚨 *NOVO MENOR PREÇO!*"));
        assert!(msg.contains("Categoria: Meia Estudante"));
        assert!(msg.contains("Valor: *R$ 250*"));
        assert!(msg.ends_with("🎫 Acesse o site: https://tickets.test/a"));
    }

    #[test]
    fn sold_message_shows_old_and_new_price() {
        let msg = format_message(&NotificationEvent::ListingSold {
            old_price: 250,
            new_price: 300,
            category: "Inteira".to_string(),
            link: None,
        });
        assert!(msg.contains("INGRESSO ANTERIOR VENDIDO"));
        assert!(msg.contains("Anterior: R$ 250"));
        assert!(msg.contains("Valor: *R$ 300*"));
        assert!(!msg.contains("Acesse o site"));
    }

    #[test]
    fn backend_text_is_escaped_for_markdown() {
        let msg = format_message(&NotificationEvent::NewLowestPrice {
            price: 90,
            category: "Meia_Estudante*".to_string(),
            link: Some("https://tickets.test/show_2024/[vip]".to_string()),
        });
        assert!(msg.contains("Categoria: Meia\\_Estudante\\*\n"));
        assert!(msg.ends_with("https://tickets.test/show\\_2024/\\[vip]"));
        // Only the header and price markers remain as live entities.
        let live_stars = msg
            .char_indices()
            .filter(|&(i, c)| c == '*' && !msg[..i].ends_with('\\'))
            .count();
        assert_eq!(live_stars, 4);
    }

    #[test]
    fn plain_text_is_not_escaped() {
        assert_eq!(escape_markdown("Inteira - Setor A"), "Inteira - Setor A");
        assert_eq!(escape_markdown("a`b"), "a\\`b");
    }

    #[test]
    fn endpoint_embeds_token() {
        let notifier = TelegramNotifier::new(TelegramConfig {
            api_url: "https://api.telegram.org/".to_string(),
            token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        })
        .unwrap();
        assert_eq!(notifier.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let event = NotificationEvent::NewLowestPrice {
            price: 1,
            category: "Inteira".to_string(),
            link: None,
        };
        assert!(LogNotifier.send(&event).await.is_ok());
    }
}
