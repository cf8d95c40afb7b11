//! Telegram Bot API forwarder.
//!
//! Every ingested entry is formatted as a short HTML message and queued. A
//! single background worker drains the queue, sending one `sendMessage` call
//! at a time with a pause between calls. The queue is bounded; when it is full
//! the new message is dropped so ingestion never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use udplog_core::{EntryForwarder, LogEntry};

use crate::error::{NotifyError, Result};

/// Base URL of the public Bot API.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Longest text sent in one message.
pub const MAX_MESSAGE_CHARS: usize = 4000;

const TRUNCATION_MARKER: &str = "...";

/// Formats an entry as `<code>[dd/mm HH:MM:SS]</code> message`.
///
/// The message is HTML-escaped so the Bot API accepts it under
/// `parse_mode: HTML`.
#[must_use]
pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "<code>[{}]</code> {}",
        entry.timestamp().format("%d/%m %H:%M:%S"),
        escape_html(entry.message())
    )
}

/// Escapes `&`, `<` and `>`.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Cuts `text` to [`MAX_MESSAGE_CHARS`] characters, ending in `...` if cut.
///
/// The cut never lands inside an HTML entity.
#[must_use]
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_MARKER.len();
    let mut out: String = text.chars().take(keep).collect();
    if let Some(amp) = out.rfind('&').filter(|&i| !out[i..].contains(';')) {
        out.truncate(amp);
    }
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Connection and pacing settings for the Telegram forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    /// Bot token.
    pub bot_token: String,
    /// Destination chat id.
    pub chat_id: String,
    /// API base URL, without trailing slash.
    pub api_base: String,
    /// Pending message capacity.
    pub queue_capacity: usize,
    /// Pause after each successful send.
    pub send_interval: Duration,
    /// Pause after a failed send.
    pub error_backoff: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl TelegramConfig {
    /// Creates a config with default pacing.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            queue_capacity: 100,
            send_interval: Duration::from_millis(500),
            error_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Builds a config from optional credentials.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::MissingCredential`] if either value is absent or empty.
    pub fn from_parts(bot_token: Option<&str>, chat_id: Option<&str>) -> Result<Self> {
        let bot_token = bot_token
            .filter(|t| !t.is_empty())
            .ok_or(NotifyError::MissingCredential("bot token"))?;
        let chat_id = chat_id
            .filter(|c| !c.is_empty())
            .ok_or(NotifyError::MissingCredential("chat id"))?;
        Ok(Self::new(bot_token, chat_id))
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the pause after each successful send.
    #[must_use]
    pub const fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Sets the pause after a failed send.
    #[must_use]
    pub const fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

struct Running {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Queued, rate-limited forwarder to a Telegram chat.
///
/// Inert until [`TelegramNotifier::start`] is called and again after
/// [`TelegramNotifier::stop`]; messages offered while inert are discarded.
pub struct TelegramNotifier {
    config: Option<Arc<TelegramConfig>>,
    running: Mutex<Option<Running>>,
}

impl TelegramNotifier {
    /// Creates an enabled notifier.
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config: Some(Arc::new(config)),
            running: Mutex::new(None),
        }
    }

    /// Creates a notifier that never sends anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            config: None,
            running: Mutex::new(None),
        }
    }

    /// Creates a notifier from the service settings.
    ///
    /// Enabled without a bot token or chat id logs a warning and yields a
    /// disabled notifier.
    #[must_use]
    pub fn from_settings(enabled: bool, bot_token: Option<&str>, chat_id: Option<&str>) -> Self {
        if !enabled {
            return Self::disabled();
        }
        match TelegramConfig::from_parts(bot_token, chat_id) {
            Ok(config) => Self::new(config),
            Err(e) => {
                warn!(error = %e, "telegram is enabled but not configured, disabling");
                Self::disabled()
            }
        }
    }

    /// Returns true if the notifier has credentials.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Returns true while the worker is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Starts the background worker. A no-op when disabled or already running.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn start(&self) -> Result<()> {
        let Some(config) = &self.config else {
            info!("telegram notifier is disabled");
            return Ok(());
        };

        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            client,
            Arc::clone(config),
            rx,
            cancel.clone(),
        ));

        *running = Some(Running { tx, cancel, handle });
        info!(chat_id = %config.chat_id, "telegram notifier started");
        Ok(())
    }

    /// Stops the worker and waits for it to exit. Pending messages are discarded.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };
        running.cancel.cancel();
        drop(running.tx);
        if let Err(e) = running.handle.await {
            warn!(error = %e, "telegram worker ended abnormally");
        }
        info!("telegram notifier stopped");
    }

    /// Queues `text` for delivery without waiting.
    ///
    /// Returns true if the message was queued; false if the notifier is not
    /// running or the queue is full.
    pub fn send_message(&self, text: String) -> bool {
        let running = self.running.lock();
        let Some(running) = running.as_ref() else {
            return false;
        };
        match running.tx.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("telegram queue is full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl EntryForwarder for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn forward(&self, entry: &LogEntry) {
        if self.is_enabled() {
            self.send_message(format_entry(entry));
        }
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("enabled", &self.is_enabled())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn run_worker(
    client: reqwest::Client,
    config: Arc<TelegramConfig>,
    mut rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    let url = config.send_url();
    loop {
        let text = tokio::select! {
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => break,
            outcome = deliver(&client, &url, &config.chat_id, &text) => outcome,
        };

        let pause = match outcome {
            Ok(()) => {
                debug!(chars = text.chars().count(), "message sent to telegram");
                config.send_interval
            }
            Err(e) => {
                error!(error = %e, "failed to send message to telegram");
                config.error_backoff
            }
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(pause) => {}
        }
    }
    debug!("telegram worker exited");
}

async fn deliver(client: &reqwest::Client, url: &str, chat_id: &str, text: &str) -> Result<()> {
    let text = truncate_message(text);
    let body = SendMessage {
        chat_id,
        text: &text,
        parse_mode: "HTML",
    };
    client
        .post(url)
        .json(&body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    #[test]
    fn format_uses_day_month_and_code_tag() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap();
        let entry = LogEntry::new(ts, "disk full");
        assert_eq!(format_entry(&entry), "<code>[07/03 14:05:09]</code> disk full");
    }

    #[test]
    fn format_escapes_markup_in_message() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap();
        let entry = LogEntry::new(ts, "if a < b && c > d <script>");
        assert_eq!(
            format_entry(&entry),
            "<code>[07/03 14:05:09]</code> if a &lt; b &amp;&amp; c &gt; d &lt;script&gt;"
        );
    }

    #[test_case("plain text", "plain text" ; "nothing to escape")]
    #[test_case("<b>", "&lt;b&gt;" ; "tags")]
    #[test_case("&amp;", "&amp;amp;" ; "existing entity is escaped again")]
    fn escape_html_cases(input: &str, expected: &str) {
        assert_eq!(escape_html(input), expected);
    }

    #[test]
    fn truncation_does_not_split_entity() {
        let keep = MAX_MESSAGE_CHARS - TRUNCATION_MARKER.len();
        // "&lt;" starts two characters before the cut.
        let text = format!("{}&lt;{}", "x".repeat(keep - 2), "z".repeat(100));
        let cut = truncate_message(&text);
        assert!(cut.ends_with("xx..."));
        assert!(!cut.contains('&'));
        assert!(cut.chars().count() <= MAX_MESSAGE_CHARS);
    }

    #[test]
    fn short_text_is_untouched() {
        let text = "x".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(truncate_message(&text), text);
    }

    #[test]
    fn long_text_is_cut_to_limit() {
        let text = "y".repeat(MAX_MESSAGE_CHARS + 1);
        let cut = truncate_message(&text);
        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS);
        assert!(cut.ends_with("y..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(MAX_MESSAGE_CHARS + 10);
        let cut = truncate_message(&text);
        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test_case(false, Some("t"), Some("c"), false ; "not enabled")]
    #[test_case(true, None, Some("c"), false ; "no token")]
    #[test_case(true, Some("t"), None, false ; "no chat id")]
    #[test_case(true, Some(""), Some("c"), false ; "empty token")]
    #[test_case(true, Some("t"), Some("c"), true ; "fully configured")]
    fn from_settings_enablement(
        enabled: bool,
        token: Option<&str>,
        chat: Option<&str>,
        expected: bool,
    ) {
        let notifier = TelegramNotifier::from_settings(enabled, token, chat);
        assert_eq!(notifier.is_enabled(), expected);
    }

    #[test]
    fn from_parts_names_missing_credential() {
        let err = TelegramConfig::from_parts(Some("t"), None).unwrap_err();
        assert!(matches!(err, NotifyError::MissingCredential("chat id")));
    }

    #[test]
    fn send_url_embeds_token() {
        let config = TelegramConfig::new("123:abc", "42").with_api_base("http://localhost:9/");
        assert_eq!(config.send_url(), "http://localhost:9/bot123:abc/sendMessage");
    }

    #[test]
    fn default_pacing() {
        let config = TelegramConfig::new("t", "c");
        assert_eq!(config.api_base, TELEGRAM_API_BASE);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.send_interval, Duration::from_millis(500));
        assert_eq!(config.error_backoff, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn messages_before_start_are_discarded() {
        let notifier = TelegramNotifier::new(TelegramConfig::new("t", "c"));
        assert!(!notifier.send_message("early".to_string()));
        assert!(!notifier.is_running());
    }

    #[tokio::test]
    async fn disabled_notifier_start_is_noop() {
        let notifier = TelegramNotifier::disabled();
        notifier.start().unwrap();
        assert!(!notifier.is_running());
        notifier.forward(&LogEntry::now("ignored"));
        notifier.stop().await;
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let notifier = TelegramNotifier::new(
            TelegramConfig::new("t", "c").with_api_base("http://127.0.0.1:9"),
        );
        notifier.start().unwrap();
        notifier.start().unwrap();
        assert!(notifier.is_running());

        notifier.stop().await;
        notifier.stop().await;
        assert!(!notifier.is_running());
        assert!(!notifier.send_message("late".to_string()));
    }
}
