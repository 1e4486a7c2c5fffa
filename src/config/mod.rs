//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on missing or malformed values.
//! Credentials are wrapped in `secrecy::SecretString` so they never reach
//! the logs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::clock::parse_offset;
use crate::db::Db;
use crate::engine::Providers;
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::notify::{ChatConfig, ChatNotifier, LogNotifier, Notifier, WebhookNotifier};
use crate::state::{FileState, MemoryState, Recorder, State, TemplateProvider};
use crate::telemetry::TelemetryConfig;
use crate::templates::TemplateRegistry;

/// Where users, jobs, templates and records are kept.
#[derive(Debug)]
pub enum StateBackend {
    Memory,
    File(PathBuf),
    Postgres(SecretString),
}

/// Where notifications go.
#[derive(Debug)]
pub enum NotifierBackend {
    Log,
    Webhook(String),
    Chat(ChatConfig),
}

#[derive(Debug)]
pub struct Config {
    pub state: StateBackend,
    /// When set, templates come from this directory instead of the state
    /// backend.
    pub template_dir: Option<PathBuf>,
    pub notifier: NotifierBackend,
    /// Upper bound on the sleep between reconcile passes.
    pub reconcile_interval: Duration,
    /// Zone for local midnight and weekdays in the missed-work check.
    pub timezone: Tz,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            endpoint: self.otel_endpoint.clone(),
            log_level: self.log_level.clone(),
            ..TelemetryConfig::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let state = match vars.get_or("STATE_BACKEND", "file").as_str() {
            "memory" => StateBackend::Memory,
            "file" => StateBackend::File(PathBuf::from(
                vars.get_or("STATE_PATH", "timerec-state.json"),
            )),
            "postgres" => StateBackend::Postgres(SecretString::from(vars.required("DATABASE_URL")?)),
            other => {
                return Err(Error::Config(format!(
                    "STATE_BACKEND must be memory, file or postgres, got {other:?}"
                )));
            }
        };

        let notifier = match vars.get_or("NOTIFIER", "log").as_str() {
            "log" => NotifierBackend::Log,
            "webhook" => NotifierBackend::Webhook(vars.required("WEBHOOK_URL")?),
            "chat" => NotifierBackend::Chat(ChatConfig {
                url: vars.required("CHAT_URL")?,
                user_id: vars.required("CHAT_USER")?,
                token: SecretString::from(vars.required("CHAT_TOKEN")?),
                channel: vars.required("CHAT_CHANNEL")?,
                templates: chat_templates(&vars),
                user_mappings: parse_mappings(&vars.get("CHAT_USER_MAPPINGS").unwrap_or_default())?,
            }),
            other => {
                return Err(Error::Config(format!(
                    "NOTIFIER must be log, webhook or chat, got {other:?}"
                )));
            }
        };

        let interval = vars.get_or("RECONCILE_INTERVAL", "5m");
        let reconcile_interval = parse_offset(&interval)
            .ok()
            .and_then(|d| d.to_std().ok())
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                Error::Config(format!("RECONCILE_INTERVAL must be a positive duration, got {interval:?}"))
            })?;

        let tz = vars.get_or("TIMEZONE", "UTC");
        let timezone = tz
            .parse::<Tz>()
            .map_err(|_| Error::Config(format!("TIMEZONE is not a known zone: {tz:?}")))?;

        Ok(Self {
            state,
            template_dir: vars.get("TEMPLATE_DIR").map(PathBuf::from),
            notifier,
            reconcile_interval,
            timezone,
            otel_endpoint: vars.get("OTEL_ENDPOINT"),
            log_level: vars.get_or("LOG_LEVEL", "info"),
        })
    }

    /// Build the provider bundle for the configured backends.
    pub async fn providers(&self) -> Result<Providers> {
        let (state, stored_templates, recorder): (
            Arc<dyn State>,
            Arc<dyn TemplateProvider>,
            Arc<dyn Recorder>,
        ) = match &self.state {
            StateBackend::Memory => {
                let s = Arc::new(MemoryState::new());
                (s.clone(), s.clone(), s)
            }
            StateBackend::File(path) => {
                let s = Arc::new(FileState::open(path).await?);
                info!(path = %path.display(), "using file state");
                (s.clone(), s.clone(), s)
            }
            StateBackend::Postgres(url) => {
                let db = Arc::new(Db::open(url.expose_secret()).await?);
                (db.clone(), db.clone(), db)
            }
        };

        let templates: Arc<dyn TemplateProvider> = match &self.template_dir {
            Some(dir) => {
                let registry = TemplateRegistry::load_from_dir(dir)?;
                info!(dir = %dir.display(), count = registry.len(), "loaded templates");
                Arc::new(registry)
            }
            None => stored_templates,
        };

        let notifier: Arc<dyn Notifier> = match &self.notifier {
            NotifierBackend::Log => Arc::new(LogNotifier),
            NotifierBackend::Webhook(url) => Arc::new(WebhookNotifier::new(url.clone())?),
            NotifierBackend::Chat(chat) => Arc::new(ChatNotifier::new(chat.clone())?),
        };

        Ok(Providers::new(state, templates, recorder, notifier))
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.get(name)
            .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
    }
}

fn chat_templates<F>(vars: &Vars<'_, F>) -> HashMap<EventKind, String>
where
    F: Fn(&str) -> Option<String>,
{
    [EventKind::TimerExpired, EventKind::NoEntryAlarm]
        .into_iter()
        .filter_map(|kind| {
            vars.get(&format!("CHAT_TEMPLATE_{}", kind.as_str()))
                .map(|t| (kind, t))
        })
        .collect()
}

/// Parse `alice=@ali,bob=@robert`.
fn parse_mappings(raw: &str) -> Result<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(user, handle)| (user.trim().to_string(), handle.trim().to_string()))
                .ok_or_else(|| Error::Config(format!("CHAT_USER_MAPPINGS entry {pair:?} lacks '='")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mappings_parse() {
        let m = parse_mappings("alice=@ali, bob = @robert").unwrap();
        assert_eq!(m["alice"], "@ali");
        assert_eq!(m["bob"], "@robert");
        assert!(parse_mappings("").unwrap().is_empty());
        assert!(parse_mappings("nobody").is_err());
    }
}
