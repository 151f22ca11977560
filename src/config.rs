use crate::cli::{CompletionArgs, ConnectionArgs};
use crate::error::SqlbotError;
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ROW_CAP: u64 = 25;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub profile: ConnectionProfile,
    pub completion: CompletionConfig,
    pub row_cap: u64,
    pub include_foreign_keys: bool,
    pub sample_rows: usize,
    pub connect_timeout_secs: u64,
    pub verbose: bool,
    pub show_secrets: bool,
}

/// Where and as whom to connect. Never mutated once built; new credentials
/// mean a new profile.
#[derive(Debug)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<SecretString>,
    pub database: String,
    pub schema: String,
}

/// Identity of a profile for caching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileKey {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub schema: String,
}

impl ConnectionProfile {
    pub fn new(host: &str, port: u16, user: &str, database: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: None,
            database: database.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn key(&self) -> ProfileKey {
        ProfileKey {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
        }
    }

    /// `user@host:port/database`, for diagnostics.
    pub fn address(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

/// Settings for the text-completion service.
#[derive(Debug)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlDefaults,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDefaults {
    row_cap: Option<u64>,
    connect_timeout: Option<u64>,
    completion_timeout: Option<u64>,
    verbose: Option<bool>,
    include_foreign_keys: Option<bool>,
    sample_rows: Option<usize>,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    password_env: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

/// Where the config path came from: explicit paths must exist, auto-resolved ones may not.
struct ResolvedConfigPath {
    path: PathBuf,
    /// true if user explicitly specified via --config or SQLBOT_CONFIG
    explicit: bool,
}

/// Resolve the config file path: --config flag > env var > platform default.
fn resolve_config_path(cli_config: Option<&PathBuf>) -> Option<ResolvedConfigPath> {
    if let Some(path) = cli_config {
        return Some(ResolvedConfigPath { path: path.clone(), explicit: true });
    }
    if let Some(path) = env_non_empty("SQLBOT_CONFIG") {
        return Some(ResolvedConfigPath { path: PathBuf::from(path), explicit: true });
    }
    ProjectDirs::from("", "", "sqlbot").map(|dirs| ResolvedConfigPath {
        path: dirs.config_dir().join("config.toml"),
        explicit: false,
    })
}

/// Load and parse the TOML config file (if it exists).
fn load_toml_config(resolved: Option<&ResolvedConfigPath>) -> Result<TomlConfig, SqlbotError> {
    let resolved = match resolved {
        Some(r) => r,
        None => return Ok(TomlConfig::default()),
    };

    if !resolved.path.exists() {
        if resolved.explicit {
            return Err(SqlbotError::Config {
                message: format!("config file not found: {}", resolved.path.display()),
            });
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&resolved.path).map_err(|e| SqlbotError::Config {
        message: format!("cannot read config file {}: {}", resolved.path.display(), e),
    })?;

    toml::from_str(&content).map_err(|e| SqlbotError::Config {
        message: format!("invalid config file {}: {}", resolved.path.display(), e),
    })
}

/// `Some(value)` unless the value is missing or empty.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Read an env var, treating an empty value as unset.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve a secret from direct value, env indirection, or fallback env var.
fn resolve_secret(
    direct: Option<&str>,
    env_key: Option<&str>,
    fallback_env: &str,
) -> Option<SecretString> {
    if let Some(val) = non_empty(direct) {
        return Some(SecretString::from(val.to_string()));
    }
    // Env indirection (e.g., password_env = "MY_SECRET")
    if let Some(key) = env_key
        && let Some(val) = env_non_empty(key)
    {
        return Some(SecretString::from(val));
    }
    env_non_empty(fallback_env).map(SecretString::from)
}

/// Build AppConfig from connection and completion CLI args.
pub fn load(
    connection: &ConnectionArgs,
    completion: &CompletionArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&PathBuf>,
) -> Result<AppConfig, SqlbotError> {
    let resolved_path = resolve_config_path(config_path);
    let toml_config = load_toml_config(resolved_path.as_ref())?;

    let profile = connection
        .profile
        .as_ref()
        .map(|name| {
            toml_config.profiles.get(name).cloned().ok_or_else(|| SqlbotError::Config {
                message: format!("profile '{}' not found in config file", name),
            })
        })
        .transpose()?
        .unwrap_or_default();

    let host = non_empty(connection.host.as_deref())
        .or(profile.host.as_deref())
        .unwrap_or(DEFAULT_HOST)
        .to_string();

    let port = connection.port.or(profile.port).unwrap_or(DEFAULT_PORT);

    let user = non_empty(connection.user.as_deref())
        .or(profile.user.as_deref())
        .ok_or_else(|| SqlbotError::Config {
            message: "no user specified — use --user or configure a profile".to_string(),
        })?
        .to_string();

    let database = non_empty(connection.database.as_deref())
        .or(profile.database.as_deref())
        .ok_or_else(|| SqlbotError::Config {
            message: "no database specified — use --database or configure a profile".to_string(),
        })?
        .to_string();

    let schema = non_empty(connection.schema.as_deref())
        .or(profile.schema.as_deref())
        .unwrap_or(DEFAULT_SCHEMA)
        .to_string();

    let password = resolve_secret(
        connection.password.as_deref(),
        profile.password_env.as_deref(),
        "SQLBOT_PASSWORD",
    )
    .or_else(|| profile.password.as_ref().map(|p| SecretString::from(p.clone())));

    let api_key = resolve_secret(
        completion.api_key.as_deref(),
        profile.api_key_env.as_deref(),
        "OPENAI_API_KEY",
    )
    .or_else(|| profile.api_key.as_ref().map(|k| SecretString::from(k.clone())));

    let defaults = &toml_config.defaults;

    let model = non_empty(completion.model.as_deref())
        .or(profile.model.as_deref())
        .or(defaults.model.as_deref())
        .unwrap_or(DEFAULT_MODEL)
        .to_string();

    let base_url = non_empty(completion.base_url.as_deref())
        .or(profile.base_url.as_deref())
        .or(defaults.base_url.as_deref())
        .unwrap_or(DEFAULT_BASE_URL)
        .to_string();

    let row_cap = completion
        .row_cap
        .or(defaults.row_cap)
        .unwrap_or(DEFAULT_ROW_CAP);
    if row_cap == 0 {
        return Err(SqlbotError::Config {
            message: "row cap must be at least 1".to_string(),
        });
    }

    let completion_timeout = completion
        .completion_timeout
        .or(defaults.completion_timeout)
        .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS);

    let connect_timeout_secs = connection
        .connect_timeout
        .or(defaults.connect_timeout)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

    // verbose: CLI/ENV OR TOML default
    let verbose = verbose || defaults.verbose.unwrap_or(false);

    Ok(AppConfig {
        profile: ConnectionProfile {
            host,
            port,
            user,
            password,
            database,
            schema,
        },
        completion: CompletionConfig {
            base_url,
            api_key,
            model,
            temperature: defaults.temperature.unwrap_or(0.0),
            timeout_secs: completion_timeout,
        },
        row_cap,
        include_foreign_keys: defaults.include_foreign_keys.unwrap_or(true),
        sample_rows: defaults.sample_rows.unwrap_or(0),
        connect_timeout_secs,
        verbose,
        show_secrets,
    })
}
