//! Webhook notifiers and delivery

pub mod backends;

pub use backends::{ServerChan, Telegram, WeCom, WxPusher};

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use log::{error, info, warn};
use std::future::Future;
use std::pin::Pin;

/// A webhook the report can be pushed to
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Largest body, in bytes, the webhook accepts
    fn max_body_len(&self) -> usize {
        4096
    }

    fn send<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;
}

/// Result of pushing one report to every notifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub sent: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

/// Pushes a report to every configured notifier
///
/// Delivery failures are logged and counted but never abort the run; a
/// webhook being down should not hide the report from the others.
pub struct NotificationManager {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl NotificationManager {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build one notifier per configured webhook
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(ref serverchan) = config.serverchan {
            notifiers.push(Box::new(ServerChan::new(serverchan.send_key.clone())?));
        }
        if let Some(ref telegram) = config.telegram {
            let notifier = match telegram.api_base {
                Some(ref base) => Telegram::with_api_base(
                    telegram.bot_token.clone(),
                    telegram.chat_id.clone(),
                    base.clone(),
                )?,
                None => Telegram::new(telegram.bot_token.clone(), telegram.chat_id.clone())?,
            };
            notifiers.push(Box::new(notifier));
        }
        if let Some(ref wecom) = config.wecom {
            notifiers.push(Box::new(WeCom::new(wecom.key.clone())?));
        }
        if let Some(ref wxpusher) = config.wxpusher {
            notifiers.push(Box::new(WxPusher::new(
                wxpusher.app_token.clone(),
                wxpusher.uid.clone(),
            )?));
        }

        Ok(Self::new(notifiers))
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Push the report to every notifier, in configuration order
    pub async fn dispatch(&self, title: &str, body: &str) -> DeliverySummary {
        let mut summary = DeliverySummary::default();

        if self.notifiers.is_empty() {
            info!("No notifiers configured, skipping delivery");
            return summary;
        }

        for notifier in &self.notifiers {
            let limit = notifier.max_body_len();
            let text = truncate_text(body, limit);
            if text.len() < body.len() {
                warn!(
                    "Report truncated to {} bytes for {}",
                    text.len(),
                    notifier.name()
                );
            }

            match notifier.send(title, &text).await {
                Ok(()) => {
                    info!("Report sent via {}", notifier.name());
                    summary.sent.push(notifier.name());
                }
                Err(e) => {
                    error!("Failed to send report via {}: {}", notifier.name(), e);
                    summary.failed.push(notifier.name());
                }
            }
        }

        summary
    }
}

/// Truncate text to at most `max_length` bytes, ending with `...`
///
/// Cuts on a UTF-8 character boundary so multi-byte text never panics.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    if max_length < 3 {
        return ".".repeat(max_length);
    }

    let mut truncate_at = max_length - 3;
    while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }

    format!("{}...", &text[..truncate_at])
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_truncate_respects_limit(text: String, limit: u16) -> bool {
        let limit = limit as usize;
        let truncated = truncate_text(&text, limit);
        truncated.len() <= limit && (text.len() > limit || truncated == text)
    }
}
