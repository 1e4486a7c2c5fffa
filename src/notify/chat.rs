//! Chat delivery: render a per-event message template and post it to a
//! channel over the chat server's REST API.
//!
//! Templates use Tera syntax. The context holds `user`, `mapped_user`,
//! `target`, `event` and `message`.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tera::{Context, Tera};
use tracing::{debug, warn};

use super::{HTTP_TIMEOUT, Notifier};
use crate::error::{Error, Result};
use crate::event::{EventKind, Notification};

const DEFAULT_TEMPLATE: &str = "{{ mapped_user }} {{ message }} ({{ target }})";
const DEFAULT_NAME: &str = "default";

/// Connection and rendering settings for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the chat server.
    pub url: String,
    /// User id the bot authenticates as.
    pub user_id: String,
    pub token: SecretString,
    pub channel: String,
    /// Tera message template per event kind. Kinds without one use
    /// `{{ mapped_user }} {{ message }} ({{ target }})`.
    pub templates: HashMap<EventKind, String>,
    /// Maps timerec user names onto chat handles.
    pub user_mappings: HashMap<String, String>,
}

pub struct ChatNotifier {
    client: reqwest::Client,
    config: ChatConfig,
    tera: Tera,
}

impl ChatNotifier {
    /// Build the client and compile every template. A template that does
    /// not parse is a configuration error.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let mut tera = Tera::default();
        tera.add_raw_template(DEFAULT_NAME, DEFAULT_TEMPLATE)
            .map_err(|e| Error::Config(format!("default chat template: {e}")))?;
        for (kind, source) in &config.templates {
            tera.add_raw_template(kind.as_str(), source)
                .map_err(|e| Error::Config(format!("chat template for {kind}: {e}")))?;
        }

        Ok(Self {
            client,
            config,
            tera,
        })
    }

    pub(crate) fn render(&self, n: &Notification) -> String {
        let name = if self.config.templates.contains_key(&n.kind) {
            n.kind.as_str()
        } else {
            DEFAULT_NAME
        };
        let mapped_user = self
            .config
            .user_mappings
            .get(&n.user)
            .cloned()
            .unwrap_or_else(|| format!("@{}", n.user));

        let mut ctx = Context::new();
        ctx.insert("user", &n.user);
        ctx.insert("mapped_user", &mapped_user);
        ctx.insert("target", &n.target);
        ctx.insert("event", n.kind.as_str());
        ctx.insert("message", &n.message);

        match self.tera.render(name, &ctx) {
            Ok(text) => text,
            Err(e) => {
                warn!(template = name, error = %e, "chat template failed, sending plain message");
                n.message.clone()
            }
        }
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        let text = self.render(n);
        let url = format!(
            "{}/api/v1/chat.postMessage",
            self.config.url.trim_end_matches('/')
        );

        let resp = self
            .client
            .post(&url)
            .header("X-User-Id", &self.config.user_id)
            .header("X-Auth-Token", self.config.token.expose_secret())
            .json(&json!({ "channel": self.config.channel, "text": text }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("chat server returned {status}")));
        }
        debug!(channel = %self.config.channel, %text, "chat message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Utc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str, templates: HashMap<EventKind, String>) -> ChatConfig {
        ChatConfig {
            url: url.into(),
            user_id: "bot".into(),
            token: SecretString::from("t"),
            channel: "#time".into(),
            templates,
            user_mappings: HashMap::from([("alice".to_string(), "@ali".to_string())]),
        }
    }

    fn notifier(templates: HashMap<EventKind, String>) -> ChatNotifier {
        ChatNotifier::new(config("http://chat.invalid", templates)).unwrap()
    }

    fn alarm() -> Notification {
        Notification::new(
            EventKind::NoEntryAlarm,
            "No work logged today!",
            "activity@none",
            "alice",
            Utc::now(),
        )
    }

    #[test]
    fn renders_default_template_with_mapping() {
        assert_eq!(
            notifier(HashMap::new()).render(&alarm()),
            "@ali No work logged today! (activity@none)"
        );
    }

    #[test]
    fn renders_kind_specific_template() {
        let chat = notifier(HashMap::from([(
            EventKind::TimerExpired,
            "{{ event }}: {{ user }} on {{ target }}".to_string(),
        )]));
        let n = Notification::new(
            EventKind::TimerExpired,
            "Estimated time expired",
            "activity@coding",
            "bob",
            Utc::now(),
        );
        assert_eq!(chat.render(&n), "TIMER_EXPIRED: bob on activity@coding");
    }

    #[test]
    fn placeholders_inside_values_are_not_expanded() {
        let n = Notification::new(
            EventKind::TimerExpired,
            "Estimated time expired",
            "activity@fix {message} {{ message }} bug",
            "bob",
            Utc::now(),
        );
        assert_eq!(
            notifier(HashMap::new()).render(&n),
            "@bob Estimated time expired (activity@fix {message} {{ message }} bug)"
        );
    }

    #[test]
    fn broken_template_is_a_config_error() {
        let result = ChatNotifier::new(config(
            "http://chat.invalid",
            HashMap::from([(EventKind::NoEntryAlarm, "{{ unclosed".to_string())]),
        ));
        let Err(err) = result else {
            panic!("expected template parse failure");
        };
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn render_failure_falls_back_to_message() {
        let chat = notifier(HashMap::from([(
            EventKind::NoEntryAlarm,
            "{{ nobody_set_this }}".to_string(),
        )]));
        assert_eq!(chat.render(&alarm()), "No work logged today!");
    }

    #[tokio::test]
    async fn posts_rendered_text_with_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat.postMessage"))
            .and(header("X-User-Id", "bot"))
            .and(header("X-Auth-Token", "t"))
            .and(body_json(json!({
                "channel": "#time",
                "text": "@ali No work logged today! (activity@none)",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let chat = ChatNotifier::new(config(&server.uri(), HashMap::new())).unwrap();
        chat.notify(&alarm()).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_post_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let chat = ChatNotifier::new(config(&server.uri(), HashMap::new())).unwrap();
        let err = chat.notify(&alarm()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendError);
    }
}
