use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Longest accepted `backoff_step_secs`
const MAX_BACKOFF_STEP_SECS: f64 = 600.0;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub weeek: WeeekConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Empty means every group and supergroup the bot is in.
    #[serde(default)]
    pub allowed_chat_ids: HashSet<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeeekConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_tasks_endpoint")]
    pub tasks_endpoint: String,
    /// Assignee of every created task
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_project_id")]
    pub project_id: i64,
    #[serde(default = "default_board_column_id")]
    pub board_column_id: i64,
}

impl Default for WeeekConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            tasks_endpoint: default_tasks_endpoint(),
            user_id: default_user_id(),
            project_id: default_project_id(),
            board_column_id: default_board_column_id(),
        }
    }
}

impl WeeekConfig {
    /// Full task-creation URL, tolerating a trailing slash on the base URL.
    pub fn tasks_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.tasks_endpoint
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TasksConfig {
    /// IANA name of the zone in which "tomorrow" is computed
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            title_max_len: default_title_max_len(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepliesConfig {
    #[serde(default = "default_success_reply")]
    pub success: String,
    #[serde(default = "default_failure_reply")]
    pub failure: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            success: default_success_reply(),
            failure: default_failure_reply(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `backoff_step_secs * n`
    #[serde(default = "default_backoff_step")]
    pub backoff_step_secs: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            pool_timeout_secs: default_pool_timeout(),
            max_attempts: default_max_attempts(),
            backoff_step_secs: default_backoff_step(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Upper bound for a single attempt: waiting for a pooled connection,
    /// connecting, writing the body and reading the response.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(
            self.pool_timeout_secs
                + self.connect_timeout_secs
                + self.write_timeout_secs
                + self.read_timeout_secs,
        )
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::try_from_secs_f64(self.backoff_step_secs * f64::from(attempt))
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl GeneralConfig {
    /// `log_level` as an `EnvFilter` directive. Python level names
    /// (`WARNING`, `CRITICAL`, `NOTSET`) map to their tracing equivalents;
    /// full directives such as `info,weeek_taskbot=debug` pass through.
    pub fn filter_directive(&self) -> String {
        let raw = self.log_level.trim();
        if raw.contains('=') || raw.contains(',') {
            return raw.to_string();
        }
        match raw.to_ascii_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            "notset" => "trace".to_string(),
            level => level.to_string(),
        }
    }
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
/// Variables that are already set keep their value. Returns whether the file
/// existed.
pub fn load_dotenv(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

fn default_base_url() -> String {
    "https://api.weeek.net/public/v1".to_string()
}

fn default_tasks_endpoint() -> String {
    "/tm/tasks".to_string()
}

fn default_user_id() -> String {
    "0044a107-6f54-4a5e-b2e2-859896283c63".to_string()
}

fn default_project_id() -> i64 {
    2
}

fn default_board_column_id() -> i64 {
    4
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_title_max_len() -> usize {
    255
}

fn default_success_reply() -> String {
    "✅ Задача успешно создана в Weeek".to_string()
}

fn default_failure_reply() -> String {
    "❌ Не удалось создать задачу. Проверьте настройки или обратитесь к администратору."
        .to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_write_timeout() -> u64 {
    20
}

fn default_pool_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step() -> f64 {
    1.5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a comma-separated list of chat ids, skipping anything non-numeric.
pub fn parse_chat_ids(raw: &str) -> HashSet<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

impl Config {
    /// Load the configuration: TOML file (if any), then environment overrides,
    /// then validation. A missing file is only an error when `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))
            }
        };

        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// Override file values with environment variables, looked up via `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("ALLOWED_CHAT_IDS") {
            self.telegram.allowed_chat_ids = parse_chat_ids(&v);
        }
        if let Some(v) = get("WEEEK_API_KEY") {
            self.weeek.api_key = v;
        }
        if let Some(v) = get("WEEEK_BASE_URL") {
            self.weeek.base_url = v;
        }
        if let Some(v) = get("WEEEK_TASKS_ENDPOINT") {
            self.weeek.tasks_endpoint = v;
        }
        if let Some(v) = get("WEEEK_USER_ID") {
            self.weeek.user_id = v;
        }
        if let Some(v) = get("WEEEK_PROJECT_ID") {
            self.weeek.project_id = v
                .parse()
                .with_context(|| format!("WEEEK_PROJECT_ID is not an integer: {}", v))?;
        }
        if let Some(v) = get("WEEEK_BOARD_COLUMN_ID") {
            self.weeek.board_column_id = v
                .parse()
                .with_context(|| format!("WEEEK_BOARD_COLUMN_ID is not an integer: {}", v))?;
        }
        if let Some(v) = get("SERVER_TZ") {
            self.tasks.timezone = v;
        }
        if let Some(v) = get("TITLE_MAX_LEN") {
            self.tasks.title_max_len = v
                .parse()
                .with_context(|| format!("TITLE_MAX_LEN is not a number: {}", v))?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.general.log_level = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is not set (telegram.bot_token or TELEGRAM_BOT_TOKEN)");
        }
        if self.weeek.api_key.trim().is_empty() {
            anyhow::bail!("Weeek API key is not set (weeek.api_key or WEEEK_API_KEY)");
        }
        self.timezone()?;
        if self.tasks.title_max_len == 0 {
            anyhow::bail!("tasks.title_max_len must be at least 1");
        }
        if self.http.max_attempts == 0 {
            anyhow::bail!("http.max_attempts must be at least 1");
        }
        let step = self.http.backoff_step_secs;
        if !step.is_finite() || !(0.0..=MAX_BACKOFF_STEP_SECS).contains(&step) {
            anyhow::bail!(
                "http.backoff_step_secs must be between 0 and {}",
                MAX_BACKOFF_STEP_SECS
            );
        }

        let directive = self.general.filter_directive();
        if directive.contains('=') || directive.contains(',') {
            EnvFilter::try_new(&directive)
                .with_context(|| format!("Invalid log filter: {}", directive))?;
        } else if directive.parse::<LevelFilter>().is_err() {
            anyhow::bail!(
                "Unknown log level '{}' (expected trace, debug, info, warn, error or off)",
                self.general.log_level
            );
        }
        Ok(())
    }

    /// The reference timezone for due dates.
    pub fn timezone(&self) -> Result<Tz> {
        self.tasks
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone '{}': {}", self.tasks.timezone, e))
    }
}
