//! Chatvault configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main chatvault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatVaultConfig {
    /// Telegram transport configuration
    pub telegram: TelegramConfig,

    /// Archival configuration
    pub archive: ArchiveConfig,
}

impl ChatVaultConfig {
    /// Validate startup requirements. A missing verification sink is fatal:
    /// without it no challenge can be issued and reconciliation is impossible.
    pub fn validate(&self) -> Result<()> {
        self.archive.verification_sink()?;
        if self.telegram.bot_token_ref.is_empty() {
            return Err(Error::Config("telegram.bot_token_ref is empty".to_string()));
        }
        Ok(())
    }
}

/// Telegram transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token
    pub bot_token_ref: String,

    /// Bot API base URL
    pub api_base: String,

    /// Long-poll window for getUpdates, in seconds
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_ref: "CHATVAULT_BOT_TOKEN".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

/// Archival configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory holding one keyspace file per chat
    pub data_dir: PathBuf,

    /// Directory for CSV snapshots
    pub export_dir: PathBuf,

    /// Chat receiving challenge forwards. Required at startup.
    pub verification_sink: Option<i64>,

    /// Position range policy for a reconciliation pass
    pub window: ReconcileWindow,
}

impl ArchiveConfig {
    /// The verification sink, or a configuration error when unset.
    pub fn verification_sink(&self) -> Result<i64> {
        match self.verification_sink {
            Some(sink) if sink != 0 => Ok(sink),
            _ => Err(Error::Config(
                "archive.verification_sink is not set".to_string(),
            )),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let base = dirs_next::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatvault");

        Self {
            data_dir: base.join("chats"),
            export_dir: base.join("exports"),
            verification_sink: None,
            window: ReconcileWindow::default(),
        }
    }
}

/// Range policy for reconciliation: the full history up to the triggering
/// request, or a bounded recent window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ReconcileWindow {
    Full,
    Recent { size: i64 },
}

impl ReconcileWindow {
    /// Positions to walk for a pass triggered at position `end` (exclusive).
    pub fn range(&self, end: i64) -> std::ops::Range<i64> {
        let start = match self {
            Self::Full => 1,
            Self::Recent { size } => (end - size).max(1),
        };
        start..end.max(start)
    }
}

impl Default for ReconcileWindow {
    fn default() -> Self {
        Self::Recent { size: 200 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_lacks_sink() {
        let config = ChatVaultConfig::default();
        assert!(config.archive.verification_sink.is_none());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_with_sink() {
        let mut config = ChatVaultConfig::default();
        config.archive.verification_sink = Some(75316412);
        config.validate().unwrap();
        assert_eq!(config.archive.verification_sink().unwrap(), 75316412);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ChatVaultConfig::default();
        config.archive.verification_sink = Some(75316412);
        config.archive.window = ReconcileWindow::Recent { size: 50 };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: ChatVaultConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.archive.verification_sink, Some(75316412));
        assert!(matches!(
            parsed.archive.window,
            ReconcileWindow::Recent { size: 50 }
        ));
    }

    #[test]
    fn test_window_parse_full() {
        let config: ChatVaultConfig = toml::from_str(
            r#"
            [archive]
            data_dir = "/tmp/chats"
            export_dir = "/tmp/exports"
            verification_sink = 1

            [archive.window]
            mode = "full"
            "#,
        )
        .unwrap();
        assert!(matches!(config.archive.window, ReconcileWindow::Full));
    }

    #[test]
    fn test_window_ranges() {
        assert_eq!(ReconcileWindow::Full.range(10), 1..10);
        assert_eq!(ReconcileWindow::Recent { size: 3 }.range(10), 7..10);
        // The window never reaches below the first position
        assert_eq!(ReconcileWindow::Recent { size: 50 }.range(10), 1..10);
        // A pass triggered by the first message has nothing to walk
        assert!(ReconcileWindow::Full.range(1).is_empty());
    }
}
