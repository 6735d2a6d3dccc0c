//! Run configuration
//!
//! Configuration is read from a TOML file and can be overridden from the
//! environment, which is how most schedulers hand secrets to the binary.

pub mod accounts;

pub use accounts::{mask_username, parse_accounts, Account};

use crate::cloud::LotteryTask;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Maximum number of lottery calls per account and run
pub const MAX_LOTTERIES: usize = 3;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub accounts: Vec<Account>,
    pub tasks: TaskConfig,
    pub notify: NotifyConfig,
}

/// Task runner settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    /// Pause before every lottery call and between login attempts
    pub delay_ms: u64,
    /// Lottery endpoints to call, in order
    pub lotteries: Vec<LotteryTask>,
    /// Whether to sign in to family spaces
    pub family: bool,
    /// Run the personal and family runners concurrently
    pub parallel: bool,
    /// Fixed number of login attempts per account
    pub login_attempts: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            delay_ms: 5000,
            lotteries: vec![LotteryTask::Sign, LotteryTask::Photo, LotteryTask::Kj],
            family: true,
            parallel: true,
            login_attempts: 3,
        }
    }
}

impl TaskConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Webhook settings; a missing table disables that webhook
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub serverchan: Option<ServerChanConfig>,
    pub telegram: Option<TelegramConfig>,
    pub wecom: Option<WeComConfig>,
    pub wxpusher: Option<WxPusherConfig>,
}

impl NotifyConfig {
    pub fn is_empty(&self) -> bool {
        self.serverchan.is_none()
            && self.telegram.is_none()
            && self.wecom.is_none()
            && self.wxpusher.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerChanConfig {
    pub send_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Alternative Bot API host, e.g. a self-hosted proxy
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeComConfig {
    /// Group robot key, the `key` query parameter of the webhook URL
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WxPusherConfig {
    pub app_token: String,
    pub uid: String,
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, a parse
    /// error for malformed TOML, and `ConfigError::ValidationError` for
    /// values that fail validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration without validating it
    ///
    /// Used when environment overrides still have to be applied before the
    /// result can be judged complete.
    pub fn parse_unvalidated(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment overrides through a lookup function
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`. Empty values
    /// are treated as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(list) = get("CHECKIN_ACCOUNTS") {
            self.accounts = parse_accounts(&list)?;
        }

        if let Some(send_key) = get("SERVERCHAN_SEND_KEY") {
            self.notify.serverchan = Some(ServerChanConfig { send_key });
        }

        if let (Some(bot_token), Some(chat_id)) =
            (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID"))
        {
            let api_base = self
                .notify
                .telegram
                .as_ref()
                .and_then(|telegram| telegram.api_base.clone());
            self.notify.telegram = Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base,
            });
        }

        if let Some(key) = get("WECOM_WEBHOOK_KEY") {
            self.notify.wecom = Some(WeComConfig { key });
        }

        if let (Some(app_token), Some(uid)) = (get("WXPUSHER_APP_TOKEN"), get("WXPUSHER_UID")) {
            self.notify.wxpusher = Some(WxPusherConfig { app_token, uid });
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one account must be configured".to_string(),
            ));
        }

        for (index, account) in self.accounts.iter().enumerate() {
            if account.username.trim().is_empty() || account.password.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "account {} has an empty username or password",
                    index + 1
                )));
            }
        }

        if self.tasks.lotteries.len() > MAX_LOTTERIES {
            return Err(ConfigError::ValidationError(format!(
                "at most {} lotteries can be configured, got {}",
                MAX_LOTTERIES,
                self.tasks.lotteries.len()
            )));
        }

        let unique: HashSet<_> = self.tasks.lotteries.iter().collect();
        if unique.len() != self.tasks.lotteries.len() {
            return Err(ConfigError::ValidationError(
                "lotteries must not contain duplicates".to_string(),
            ));
        }

        if self.tasks.login_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "login_attempts must be at least 1".to_string(),
            ));
        }

        self.validate_notify()
    }

    fn validate_notify(&self) -> Result<(), ConfigError> {
        let require = |value: &str, field: &str| {
            if value.trim().is_empty() {
                Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    field
                )))
            } else {
                Ok(())
            }
        };

        if let Some(ref serverchan) = self.notify.serverchan {
            require(&serverchan.send_key, "notify.serverchan.send_key")?;
        }
        if let Some(ref telegram) = self.notify.telegram {
            require(&telegram.bot_token, "notify.telegram.bot_token")?;
            require(&telegram.chat_id, "notify.telegram.chat_id")?;
        }
        if let Some(ref wecom) = self.notify.wecom {
            require(&wecom.key, "notify.wecom.key")?;
        }
        if let Some(ref wxpusher) = self.notify.wxpusher {
            require(&wxpusher.app_token, "notify.wxpusher.app_token")?;
            require(&wxpusher.uid, "notify.wxpusher.uid")?;
        }

        Ok(())
    }
}
