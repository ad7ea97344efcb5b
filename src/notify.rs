//! Webhook notifications.
//!
//! A notification is sent only when its toggle (`NOTIFY_ON_SUCCESS` or
//! `NOTIFY_ON_ERROR`) is on, `WEBHOOK_URL` is a valid URL, and the
//! background runtime is available.  Each missing precondition is logged and
//! reported as a [`Dispatch`] value; none of them fails the run.
//!
//! Delivery is fire-and-forget: the POST is spawned on the background
//! runtime and never awaited by the caller.  A failed delivery is logged at
//! debug level and otherwise dropped.
//!
//! The body is a JSON object:
//!
//! ```json
//! {"channel": "backups", "username": "resticw", "text": "…", "icon_emoji": ":floppy_disk:"}
//! ```
//!
//! `channel` is omitted when `WEBHOOK_CHANNEL` is unset.  All string escaping
//! is left to `serde_json`.

use std::{fmt::Write as _, time::Duration};

use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    background::Spawner,
    cli::Action,
    config::{Config, NotifyConfig},
    request::InvocationRequest,
};

/// Upper bound for one webhook POST.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Events ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Success,
    Error(String),
}

/// Run metadata appended to every notification.  Fields are filled in as
/// the run progresses, so an early failure reports only what is known.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub repository: Option<String>,
    pub action: Option<Action>,
    pub source_type: Option<String>,
    pub source_value: Option<String>,
    pub stdin_filename: Option<String>,
    pub config_excludes: Vec<String>,
    pub cli_excludes: Vec<String>,
}

impl EventContext {
    pub fn with_config(mut self, cfg: &Config) -> Self {
        self.repository = Some(cfg.repo.repository.clone());
        self
    }

    /// Backup fields are recorded only for actions that back up.
    pub fn with_request(mut self, request: &InvocationRequest) -> Self {
        self.action = Some(request.action);
        if request.action.backs_up() {
            self.source_type = Some(request.source_type.clone());
            self.source_value.clone_from(&request.source_value);
            self.stdin_filename.clone_from(&request.stdin_filename);
            self.config_excludes = request.excludes.from_config().to_vec();
            self.cli_excludes = request.excludes.from_cli().to_vec();
        }
        self
    }

    fn metadata(&self) -> String {
        let mut block = String::new();
        let mut line = |label: &str, value: &str| {
            let _ = writeln!(block, "{label}: {value}");
        };
        if let Some(v) = &self.repository {
            line("Repository", v);
        }
        if let Some(a) = self.action {
            line("Action", a.as_str());
        }
        if let Some(v) = &self.source_type {
            line("Source type", v);
        }
        if let Some(v) = &self.source_value {
            line("Source", v);
        }
        if let Some(v) = &self.stdin_filename {
            line("Stdin filename", v);
        }
        if !self.config_excludes.is_empty() {
            line("Excludes (config)", &self.config_excludes.join(", "));
        }
        if !self.cli_excludes.is_empty() {
            line("Excludes (cli)", &self.cli_excludes.join(", "));
        }
        block.trim_end().to_owned()
    }
}

// ─── Payload ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub username: String,
    pub text: String,
    pub icon_emoji: String,
}

impl Payload {
    pub fn new(cfg: &NotifyConfig, event: &NotificationEvent, ctx: &EventContext) -> Self {
        let action = ctx.action.map_or("run", Action::as_str);
        let (headline, emoji) = match event {
            NotificationEvent::Success => (format!("resticw {action} succeeded"), &cfg.emoji),
            NotificationEvent::Error(message) => {
                (format!("resticw {action} failed: {message}"), &cfg.error_emoji)
            },
        };

        let metadata = ctx.metadata();
        let text = if metadata.is_empty() {
            headline
        } else {
            format!("{headline}\n\n{metadata}")
        };

        Self {
            channel: cfg.channel.clone(),
            username: cfg.username.clone(),
            text,
            icon_emoji: emoji.clone(),
        }
    }
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

/// What [`Notifier::notify`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// POST spawned in the background.
    Initiated,
    /// The toggle for this event kind is off.
    Disabled,
    /// No `WEBHOOK_URL`.
    NoEndpoint,
    /// `WEBHOOK_URL` is not a valid URL.
    InvalidEndpoint,
    /// No HTTP client or no background runtime.
    Unavailable,
}

pub struct Notifier {
    config: NotifyConfig,
    client: Option<Client>,
    spawner: Option<Spawner>,
}

impl Notifier {
    pub fn new(config: &NotifyConfig, spawner: Option<Spawner>) -> Self {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .inspect_err(|err| warn!(error = %err, "HTTP client unavailable; notifications disabled"))
            .ok();
        Self {
            config: config.clone(),
            client,
            spawner,
        }
    }

    /// Send `event` if every precondition holds.  Never blocks on delivery.
    pub fn notify(&self, event: &NotificationEvent, ctx: &EventContext) -> Dispatch {
        let enabled = match event {
            NotificationEvent::Success => self.config.on_success,
            NotificationEvent::Error(_) => self.config.on_error,
        };
        if !enabled {
            debug!(?event, "notification toggle is off");
            return Dispatch::Disabled;
        }

        let Some(raw_url) = &self.config.webhook_url else {
            warn!("notifications are enabled but WEBHOOK_URL is not set");
            return Dispatch::NoEndpoint;
        };
        let url = match Url::parse(raw_url) {
            Ok(url) => url,
            Err(err) => {
                warn!(url = %raw_url, error = %err, "WEBHOOK_URL is not a valid URL");
                return Dispatch::InvalidEndpoint;
            },
        };

        let (Some(client), Some(spawner)) = (&self.client, &self.spawner) else {
            warn!("notification skipped: HTTP client or background runtime unavailable");
            return Dispatch::Unavailable;
        };

        let payload = Payload::new(&self.config, event, ctx);
        let request = client.post(url).json(&payload);
        spawner.spawn(async move {
            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => debug!(status = %response.status(), "notification delivered"),
                Err(err) => debug!(error = %err, "notification delivery failed"),
            }
        });

        info!("notification initiated");
        Dispatch::Initiated
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
