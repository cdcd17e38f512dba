use crate::api::models::Participant;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const BASE_URL_ENV: &str = "STOREFRONT_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub base_url: String,
    pub token: Option<String>,
    pub user: Option<Participant>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("storefront-admin.toml"))
    }

    /// Loads the settings file, falling back to defaults when it is missing or
    /// unreadable. `STOREFRONT_API_URL` wins over the stored origin.
    pub fn load() -> Self {
        let mut settings = Self::toml_path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                settings.base_url = crate::utils::normalize_url(&url);
            }
        }
        settings
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = fs::read_to_string(path) else {
            return Self::new();
        };
        match toml::from_str::<Settings>(&text) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable settings at {}: {e}", path.display());
                Self::new()
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        match Self::toml_path() {
            Some(path) => self.save_to(&path),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir")),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        fs::write(path, text)
    }

    pub fn origin(&self) -> String {
        if self.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            crate::utils::normalize_url(&self.base_url)
        }
    }

    pub fn session(&self) -> Session {
        Session::new(self.token.clone(), self.user.clone())
    }

    /// Persists a fresh login so the next start skips the login screen.
    pub fn remember_login(token: &str, user: &Participant) -> std::io::Result<()> {
        let mut settings = Self::load();
        settings.token = Some(token.to_string());
        settings.user = Some(user.clone());
        settings.save()
    }

    pub fn forget_login() -> std::io::Result<()> {
        let mut settings = Self::load();
        settings.token = None;
        settings.user = None;
        settings.save()
    }
}

#[derive(Debug, Default)]
struct SessionData {
    token: Option<String>,
    user: Option<Participant>,
}

/// Who is logged in and with which bearer token. Cheap to clone; every
/// clone observes the same state, so clearing it on a 401 is seen by all
/// holders.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionData>>,
}

impl Session {
    pub fn new(token: Option<String>, user: Option<Participant>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionData { token, user })),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().ok().and_then(|d| d.token.clone())
    }

    pub fn user(&self) -> Option<Participant> {
        self.inner.read().ok().and_then(|d| d.user.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.user().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn establish(&self, token: String, user: Participant) {
        if let Ok(mut data) = self.inner.write() {
            data.token = Some(token);
            data.user = Some(user);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut data) = self.inner.write() {
            data.token = None;
            data.user = None;
        }
    }
}
