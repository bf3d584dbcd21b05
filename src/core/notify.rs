//! Notifier fan-out: Pushover, a generic webhook, and IRC privmsg. All three
//! are best-effort; a failed transport is logged and never aborts the
//! caller.

use crate::config::sections::Notifications;
use tracing::warn;

/// Dispatches a single message to every configured transport.
pub struct Notifier {
    http: reqwest::Client,
    notifications: Notifications,
    tracker_label: String,
    irc_sender: Option<tokio::sync::mpsc::UnboundedSender<(String, String)>>,
}

impl Notifier {
    pub fn new(
        notifications: Notifications,
        tracker_label: impl Into<String>,
        irc_sender: Option<tokio::sync::mpsc::UnboundedSender<(String, String)>>,
    ) -> Self {
        Notifier {
            http: reqwest::Client::new(),
            notifications,
            tracker_label: tracker_label.into(),
            irc_sender,
        }
    }

    /// Best-effort fan-out. Every branch logs and swallows its own failure.
    pub async fn notify(&self, message: &str) {
        if let Some(pushover) = &self.notifications.pushover {
            if let Err(e) = self.send_pushover(pushover, message).await {
                warn!(error = %e, "pushover notification failed");
            }
        }
        if let Some(webhook) = &self.notifications.webhook {
            if let Err(e) = self.send_webhook(webhook, message).await {
                warn!(error = %e, "webhook notification failed");
            }
        }
        if let Some(irc) = &self.notifications.irc {
            if let Some(sender) = &self.irc_sender {
                if sender.send((irc.nick.clone(), message.to_string())).is_err() {
                    warn!("irc notification channel closed");
                }
            }
        }
    }

    async fn send_pushover(
        &self,
        config: &crate::config::sections::PushoverConfig,
        message: &str,
    ) -> anyhow::Result<()> {
        let resp = self
            .http
            .post("https://api.pushover.net/1/messages.json")
            .form(&[
                ("token", config.api_token.as_str()),
                ("user", config.user_key.as_str()),
                ("message", message),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("pushover returned {}", resp.status());
        }
        Ok(())
    }

    async fn send_webhook(
        &self,
        config: &crate::config::sections::WebhookConfig,
        message: &str,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "token": config.token,
            "tracker": self.tracker_label,
            "message": message,
            "type": "snatch",
        });
        let resp = self.http.post(&config.url).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook returned {}", resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_with_no_transports_configured_is_a_no_op() {
        let notifier = Notifier::new(Notifications::default(), "blue", None);
        notifier.notify("hello").await;
    }

    #[tokio::test]
    async fn irc_transport_forwards_onto_the_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notifications = Notifications {
            irc: Some(crate::config::sections::IrcNotifyConfig {
                tracker_label: "blue".into(),
                nick: "owner".into(),
            }),
            ..Default::default()
        };
        let notifier = Notifier::new(notifications, "blue", Some(tx));
        notifier.notify("snatched something").await;

        let (nick, message) = rx.try_recv().unwrap();
        assert_eq!(nick, "owner");
        assert_eq!(message, "snatched something");
    }
}
