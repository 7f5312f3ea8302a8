//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys are never read from the TOML itself. Gemini keys come from
//! `GEMINI_API_KEYS`, `GEMINI_API_KEY_1..N` or `gemini.keys_file`; the
//! API.Bible key from `BIBLE_API_KEY` or `scripture.api_key_file`.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub rotation: RotationConfig,
    pub scripture: ScriptureConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Separate listener for `/admin/*`. Disabled when unset.
    pub admin_listen_addr: Option<SocketAddr>,
    pub max_connections: usize,
    /// Browser origins allowed to call the API. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_listen_addr: None,
            max_connections: 1000,
            cors_origins: Vec::new(),
        }
    }
}

/// Primary provider settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Used when a request omits `max_tokens`.
    pub default_max_tokens: u32,
    /// File with one API key per line (`#` starts a comment).
    pub keys_file: Option<PathBuf>,
    #[serde(skip)]
    pub api_keys: Vec<Secret<String>>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: gemini_client::DEFAULT_BASE_URL.to_string(),
            model: gemini_client::DEFAULT_MODEL.to_string(),
            temperature: gemini_client::DEFAULT_TEMPERATURE,
            default_max_tokens: 2048,
            keys_file: None,
            api_keys: Vec::new(),
        }
    }
}

/// Rotation and retry tunables
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub quota_backoff_ms: u64,
    pub attempt_timeout_secs: u64,
    /// How long a quota-failed key stays out of rotation. 0 keeps it out
    /// until the next reset.
    pub failure_ttl_secs: u64,
    /// Period of the failed-set reset task. 0 disables the task.
    pub reset_interval_secs: u64,
    /// Assumed per-key daily request limit used for health percentages.
    pub assumed_daily_limit: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            quota_backoff_ms: 1000,
            attempt_timeout_secs: 60,
            failure_ttl_secs: 3600,
            reset_interval_secs: 0,
            assumed_daily_limit: 1500,
        }
    }
}

impl RotationConfig {
    pub fn quota_backoff(&self) -> Duration {
        Duration::from_millis(self.quota_backoff_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn failure_ttl(&self) -> Option<Duration> {
        (self.failure_ttl_secs > 0).then(|| Duration::from_secs(self.failure_ttl_secs))
    }

    pub fn reset_interval(&self) -> Option<Duration> {
        (self.reset_interval_secs > 0).then(|| Duration::from_secs(self.reset_interval_secs))
    }
}

/// Scripture search fallback settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScriptureConfig {
    pub base_url: String,
    pub bible_id: String,
    pub search_limit: usize,
    pub timeout_secs: u64,
    pub assumed_daily_limit: u64,
    pub api_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
}

impl Default for ScriptureConfig {
    fn default() -> Self {
        Self {
            base_url: scripture::API_BIBLE_BASE_URL.to_string(),
            // King James Version on API.Bible
            bible_id: "de4e12af7f28f599-02".to_string(),
            search_limit: 5,
            timeout_secs: 10,
            assumed_daily_limit: 5000,
            api_key_file: None,
            api_key: None,
        }
    }
}

impl ScriptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay secrets from the
    /// environment and key files, then validate.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.gemini.api_keys = load_gemini_keys(config.gemini.keys_file.as_deref())?;
        config.scripture.api_key = load_bible_key(config.scripture.api_key_file.as_deref())?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.gemini.api_keys.is_empty() {
            return Err(common::Error::MissingSecret(
                "no Gemini API keys: set GEMINI_API_KEYS, GEMINI_API_KEY_1..N or gemini.keys_file"
                    .into(),
            ));
        }

        for (name, url) in [
            ("gemini.base_url", &self.gemini.base_url),
            ("scripture.base_url", &self.scripture.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        for origin in &self.server.cors_origins {
            if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://")
            {
                return Err(common::Error::Config(format!(
                    "cors origin must be \"*\" or start with http:// or https://, got: {origin}"
                )));
            }
        }

        let non_zero = [
            ("server.max_connections", self.server.max_connections as u64),
            ("gemini.default_max_tokens", self.gemini.default_max_tokens as u64),
            ("rotation.attempt_timeout_secs", self.rotation.attempt_timeout_secs),
            ("rotation.assumed_daily_limit", self.rotation.assumed_daily_limit),
            ("scripture.search_limit", self.scripture.search_limit as u64),
            ("scripture.timeout_secs", self.scripture.timeout_secs),
            ("scripture.assumed_daily_limit", self.scripture.assumed_daily_limit),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("study-gateway.toml")
    }
}

/// Resolve Gemini keys: `GEMINI_API_KEYS`, then numbered variables, then file.
fn load_gemini_keys(keys_file: Option<&Path>) -> common::Result<Vec<Secret<String>>> {
    if let Ok(list) = std::env::var("GEMINI_API_KEYS") {
        let keys = parse_key_list(&list);
        if !keys.is_empty() {
            return Ok(keys);
        }
    }

    let numbered: Vec<Secret<String>> = (1..)
        .map_while(|i| std::env::var(format!("GEMINI_API_KEY_{i}")).ok())
        .map(|k| k.trim().to_owned())
        .filter(|k| !k.is_empty())
        .map(Secret::new)
        .collect();
    if !numbered.is_empty() {
        return Ok(numbered);
    }

    match keys_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                common::Error::Config(format!("failed to read keys_file {}: {e}", path.display()))
            })?;
            Ok(parse_keys_file(&contents))
        }
        None => Ok(Vec::new()),
    }
}

fn load_bible_key(key_file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(key) = std::env::var("BIBLE_API_KEY") {
        let key = key.trim().to_owned();
        if !key.is_empty() {
            return Ok(Some(Secret::new(key)));
        }
    }
    let Some(path) = key_file else {
        return Ok(None);
    };
    let key = std::fs::read_to_string(path).map_err(|e| {
        common::Error::Config(format!("failed to read api_key_file {}: {e}", path.display()))
    })?;
    let key = key.trim().to_owned();
    Ok((!key.is_empty()).then(|| Secret::new(key)))
}

/// Comma-separated keys, blanks dropped.
fn parse_key_list(list: &str) -> Vec<Secret<String>> {
    list.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| Secret::new(k.to_owned()))
        .collect()
}

/// One key per line; blank lines and `#` comments skipped.
fn parse_keys_file(contents: &str) -> Vec<Secret<String>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|k| Secret::new(k.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const SECRET_VARS: &[&str] = &[
        "GEMINI_API_KEYS",
        "GEMINI_API_KEY_1",
        "GEMINI_API_KEY_2",
        "GEMINI_API_KEY_3",
        "BIBLE_API_KEY",
    ];

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    unsafe fn clear_secret_env() {
        for var in SECRET_VARS {
            unsafe { remove_env(var) };
        }
    }

    fn exposed(keys: &[Secret<String>]) -> Vec<&str> {
        keys.iter().map(|k| k.expose().as_str()).collect()
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("study-gateway.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[server]
listen_addr = "127.0.0.1:8080"
"#;

    #[test]
    fn defaults_apply_to_minimal_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", "alpha-key");
        }

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.max_connections, 1000);
        assert!(config.server.admin_listen_addr.is_none());
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.rotation.quota_backoff(), Duration::from_secs(1));
        assert_eq!(config.rotation.attempt_timeout(), Duration::from_secs(60));
        assert_eq!(config.rotation.failure_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.rotation.reset_interval(), None);
        assert_eq!(config.rotation.assumed_daily_limit, 1500);
        assert_eq!(config.scripture.search_limit, 5);
        assert_eq!(config.scripture.assumed_daily_limit, 5000);
        assert!(config.scripture.api_key.is_none());

        unsafe { clear_secret_env() };
    }

    #[test]
    fn full_file_overrides_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:3000"
admin_listen_addr = "127.0.0.1:9090"
max_connections = 64
cors_origins = ["https://study.example.org"]

[gemini]
model = "gemini-1.5-pro"
default_max_tokens = 512

[rotation]
quota_backoff_ms = 0
failure_ttl_secs = 0
reset_interval_secs = 86400

[scripture]
bible_id = "9879dbb7cfe39e4d-04"
search_limit = 3
"#,
        );
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", "a,b");
        }

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(
            config.server.admin_listen_addr,
            Some("127.0.0.1:9090".parse().unwrap())
        );
        assert_eq!(config.server.cors_origins, vec!["https://study.example.org"]);
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
        assert_eq!(config.gemini.default_max_tokens, 512);
        assert_eq!(config.rotation.quota_backoff(), Duration::ZERO);
        assert_eq!(config.rotation.failure_ttl(), None);
        assert_eq!(
            config.rotation.reset_interval(),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(config.scripture.bible_id, "9879dbb7cfe39e4d-04");
        assert_eq!(config.scripture.search_limit, 3);

        unsafe { clear_secret_env() };
    }

    #[test]
    fn comma_separated_keys_keep_order() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", " first , second,,third ");
            set_env("GEMINI_API_KEY_1", "ignored");
        }

        let keys = load_gemini_keys(None).unwrap();
        assert_eq!(exposed(&keys), vec!["first", "second", "third"]);

        unsafe { clear_secret_env() };
    }

    #[test]
    fn numbered_keys_stop_at_first_gap() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEY_1", "one");
            set_env("GEMINI_API_KEY_2", "two");
            set_env("GEMINI_API_KEY_4", "four");
        }

        let keys = load_gemini_keys(None).unwrap();
        assert_eq!(exposed(&keys), vec!["one", "two"]);

        unsafe {
            remove_env("GEMINI_API_KEY_4");
            clear_secret_env();
        }
    }

    #[test]
    fn keys_file_skips_comments_and_blanks() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let keys_path = dir.path().join("gemini_keys");
        std::fs::write(&keys_path, "# project A\nkey-a\n\n  key-b  \n# retired\n").unwrap();
        unsafe { clear_secret_env() };

        let keys = load_gemini_keys(Some(&keys_path)).unwrap();
        assert_eq!(exposed(&keys), vec!["key-a", "key-b"]);
    }

    #[test]
    fn env_keys_override_keys_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let keys_path = dir.path().join("gemini_keys");
        std::fs::write(&keys_path, "from-file\n").unwrap();
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", "from-env");
        }

        let keys = load_gemini_keys(Some(&keys_path)).unwrap();
        assert_eq!(exposed(&keys), vec!["from-env"]);

        unsafe { clear_secret_env() };
    }

    #[test]
    fn missing_keys_file_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let result = load_gemini_keys(Some(Path::new("/nonexistent/gemini_keys")));
        assert!(result.is_err());
    }

    #[test]
    fn no_keys_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);
        unsafe { clear_secret_env() };

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("no Gemini API keys"), "got: {err}");
    }

    #[test]
    fn bible_key_from_env_or_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("bible_key");
        std::fs::write(&key_path, "bible-from-file\n").unwrap();
        unsafe { clear_secret_env() };

        let key = load_bible_key(Some(&key_path)).unwrap();
        assert_eq!(key.unwrap().expose(), "bible-from-file");

        unsafe { set_env("BIBLE_API_KEY", "bible-from-env") };
        let key = load_bible_key(Some(&key_path)).unwrap();
        assert_eq!(key.unwrap().expose(), "bible-from-env");

        unsafe { clear_secret_env() };
        assert!(load_bible_key(None).unwrap().is_none());
    }

    #[test]
    fn blank_bible_key_file_yields_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("bible_key");
        std::fs::write(&key_path, "  \n").unwrap();
        unsafe { clear_secret_env() };

        assert!(load_bible_key(Some(&key_path)).unwrap().is_none());
    }

    #[test]
    fn invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[gemini]
base_url = "generativelanguage.googleapis.com"
"#,
        );
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", "k");
        }

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("gemini.base_url must start with http"),
            "got: {err}"
        );

        unsafe { clear_secret_env() };
    }

    #[test]
    fn zero_limits_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", "k");
        }

        for (section, field) in [
            ("server", "max_connections"),
            ("rotation", "attempt_timeout_secs"),
            ("rotation", "assumed_daily_limit"),
            ("scripture", "search_limit"),
        ] {
            let path = write_config(&dir, &format!("[{section}]\n{field} = 0\n"));
            let err = Config::load(&path).unwrap_err().to_string();
            assert!(
                err.contains(&format!("{section}.{field} must be greater than 0")),
                "got: {err}"
            );
        }

        unsafe { clear_secret_env() };
    }

    #[test]
    fn bad_cors_origin_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server]\ncors_origins = [\"study.example.org\"]\n");
        unsafe {
            clear_secret_env();
            set_env("GEMINI_API_KEYS", "k");
        }

        assert!(Config::load(&path).is_err());

        unsafe { clear_secret_env() };
    }

    #[test]
    fn invalid_toml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_file_rejected() {
        assert!(Config::load(Path::new("/nonexistent/path/study-gateway.toml")).is_err());
    }

    #[test]
    fn resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        assert_eq!(
            Config::resolve_path(Some("/cli/wins.toml")),
            PathBuf::from("/cli/wins.toml")
        );
        assert_eq!(Config::resolve_path(None), PathBuf::from("/env/path.toml"));

        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("study-gateway.toml")
        );
    }
}
