use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Display preferences, mirrored to the account data store on change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub hide_user_list: bool,
    #[serde(default)]
    pub hide_room_list: bool,
    #[serde(default)]
    pub bare_message_view: bool,
    #[serde(default)]
    pub disable_images: bool,
}

/// A display preference that `/uitoggle` can flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiToggle {
    Rooms,
    Users,
    BareMessages,
    Images,
}

impl FromStr for UiToggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rooms" => Ok(Self::Rooms),
            "users" => Ok(Self::Users),
            "baremessages" => Ok(Self::BareMessages),
            "images" => Ok(Self::Images),
            other => Err(format!("unknown toggle: {}", other)),
        }
    }
}

impl Preferences {
    /// Flip one preference and return its new value.
    pub fn toggle(&mut self, target: UiToggle) -> bool {
        let flag = match target {
            UiToggle::Rooms => &mut self.hide_room_list,
            UiToggle::Users => &mut self.hide_user_list,
            UiToggle::BareMessages => &mut self.bare_message_view,
            UiToggle::Images => &mut self.disable_images,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub homeserver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Used only when the keyring holds no token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(skip, default = "cache_dir")]
    pub cache_dir: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound(PathBuf),
    InvalidJson(String),
    IoError(std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(path) => write!(f, "Config file not found: {}", path.display()),
            ConfigError::InvalidJson(msg) => write!(f, "Invalid JSON in config: {}", msg),
            ConfigError::IoError(e) => write!(f, "IO error reading config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config").join("parley").join("config.json"))
}

/// Root of the on-disk cache (room state, history, media).
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("parley")
}

/// Diagnostic log file. Lives outside [`cache_dir`] so `Config::clear`
/// never removes the log that is open for writing.
pub fn log_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("parley"))
        .unwrap_or_else(|| PathBuf::from("/tmp").join("parley-logs"))
        .join("parley.log")
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidJson(e.to_string()))
}

impl Config {
    pub fn new(homeserver: &str) -> Self {
        Self {
            homeserver: homeserver.to_string(),
            user_id: None,
            access_token: None,
            preferences: Preferences::default(),
            cache_dir: cache_dir(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        fs::write(path, content)?;
        Ok(())
    }

    pub fn set_session(&mut self, user_id: &str) {
        self.user_id = Some(user_id.to_string());
    }

    pub fn clear_session(&mut self) {
        self.access_token = None;
    }

    /// Wipe cached state and session credentials.
    ///
    /// There is no failure signal: anything that cannot be removed is only
    /// written to the log.
    pub fn clear(&mut self) {
        self.clear_session();
        match fs::remove_dir_all(&self.cache_dir) {
            Ok(()) => tracing::info!(dir = %self.cache_dir.display(), "cleared cache"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(dir = %self.cache_dir.display(), error = %e, "failed to clear cache")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_config() {
        let json = r#"{
            "homeserver": "https://matrix.example.org",
            "user_id": "@alice:example.org",
            "preferences": { "hide_user_list": true }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.homeserver, "https://matrix.example.org");
        assert_eq!(config.user_id.as_deref(), Some("@alice:example.org"));
        assert!(config.preferences.hide_user_list);
        assert!(!config.preferences.disable_images);
    }

    #[test]
    fn backward_compatible_without_preferences() {
        let json = r#"{ "homeserver": "https://hs" }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.preferences, Preferences::default());
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn parse_ui_toggle() {
        assert_eq!("rooms".parse::<UiToggle>(), Ok(UiToggle::Rooms));
        assert_eq!("users".parse::<UiToggle>(), Ok(UiToggle::Users));
        assert_eq!("baremessages".parse::<UiToggle>(), Ok(UiToggle::BareMessages));
        assert_eq!("images".parse::<UiToggle>(), Ok(UiToggle::Images));
        assert!("Images".parse::<UiToggle>().is_err());
        assert!("".parse::<UiToggle>().is_err());
    }

    #[test]
    fn toggle_flips_only_target() {
        let mut prefs = Preferences::default();
        assert!(prefs.toggle(UiToggle::BareMessages));
        assert_eq!(
            prefs,
            Preferences {
                bare_message_view: true,
                ..Preferences::default()
            }
        );
        assert!(!prefs.toggle(UiToggle::BareMessages));
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new("https://hs");
        config.preferences.disable_images = true;
        config.save(&path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.homeserver, "https://hs");
        assert!(loaded.preferences.disable_images);
    }

    #[test]
    fn load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn clear_removes_cache_and_token() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        fs::create_dir_all(cache.join("history")).unwrap();
        fs::write(cache.join("history").join("room.json"), "[]").unwrap();

        let mut config = Config::new("https://hs");
        config.cache_dir = cache.clone();
        config.access_token = Some("secret".to_string());
        config.clear();

        assert!(!cache.exists());
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn clear_keeps_log_next_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("parley");
        let logs = dir.path().join("parley-logs");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&logs).unwrap();
        fs::write(cache.join("sync.json"), "{}").unwrap();
        fs::write(logs.join("parley.log"), "started\n").unwrap();

        let mut config = Config::new("https://hs");
        config.cache_dir = cache.clone();
        config.clear();

        assert!(!cache.exists());
        assert_eq!(fs::read_to_string(logs.join("parley.log")).unwrap(), "started\n");
    }

    #[test]
    fn log_file_is_outside_cache() {
        assert!(!log_path().starts_with(cache_dir()));
    }

    #[test]
    fn clear_without_cache_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new("https://hs");
        config.cache_dir = dir.path().join("never-created");
        config.clear();
        assert!(!config.cache_dir.exists());
    }
}
