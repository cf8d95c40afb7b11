//! # udplog-notify
//!
//! Best-effort forwarding of log entries to external messaging services.
//!
//! The only channel is Telegram ([`TelegramNotifier`]). It implements
//! [`udplog_core::EntryForwarder`], so the intake engine hands it every
//! entry after the entry has been buffered. Delivery failures are logged and
//! never reach the ingestion path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod telegram;

pub use error::{NotifyError, Result};
pub use telegram::{
    MAX_MESSAGE_CHARS, TELEGRAM_API_BASE, TelegramConfig, TelegramNotifier, escape_html,
    format_entry, truncate_message,
};
