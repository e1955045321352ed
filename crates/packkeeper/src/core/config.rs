//! Configuration types for the remote clients

use std::time::Duration;

use crate::core::{PackError, Result};

/// Public Modrinth API
pub const MODRINTH_API_BASE: &str = "https://api.modrinth.com";

/// Public CurseForge API
pub const CURSEFORGE_API_BASE: &str = "https://api.curseforge.com";

/// Environment variable holding the CurseForge API key
pub const CURSEFORGE_API_KEY_VAR: &str = "CURSEFORGE_API_KEY";
/// Environment variable holding the game version filter
pub const CURSEFORGE_GAME_VERSION_VAR: &str = "CURSEFORGE_GAME_VERSION";
/// Environment variable holding the mod loader type filter
pub const CURSEFORGE_MOD_LOADER_TYPE_VAR: &str = "CURSEFORGE_MOD_LOADER_TYPE";

/// Transport settings shared by every remote client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for a single JSON lookup
    pub timeout: Duration,
    /// Timeout for a single artifact download
    pub download_timeout: Duration,
    pub user_agent: String,
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
    /// Pause between consecutive lookups, keeps us under the services' rate limits
    pub request_delay: Duration,
}

impl ClientConfig {
    /// Calculate retry delay for the given attempt using exponential backoff
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        let factor = 2_u64.saturating_pow(attempt as u32);
        let delay = (self.retry_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay.as_millis() as u64))
    }

    /// Config without any sleeping, for tests against local mock servers
    pub fn immediate() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::ZERO,
            max_retry_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(300),
            user_agent: format!("packkeeper/{}", env!("CARGO_PKG_VERSION")),
            max_retries: 4,
            retry_delay: Duration::from_millis(600),
            max_retry_delay: Duration::from_secs(8),
            request_delay: Duration::from_millis(150),
        }
    }
}

/// Settings for the classification service
#[derive(Debug, Clone)]
pub struct ModrinthConfig {
    pub base_url: String,
}

impl Default for ModrinthConfig {
    fn default() -> Self {
        Self {
            base_url: MODRINTH_API_BASE.to_string(),
        }
    }
}

/// Settings for the override catalog
#[derive(Clone)]
pub struct CurseForgeConfig {
    pub base_url: String,
    pub api_key: String,
    /// Only list files published for this game version
    pub game_version: Option<String>,
    /// Only list files for this loader (CurseForge numeric loader type)
    pub mod_loader_type: Option<String>,
}

impl std::fmt::Debug for CurseForgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurseForgeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("game_version", &self.game_version)
            .field("mod_loader_type", &self.mod_loader_type)
            .finish()
    }
}

impl CurseForgeConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            base_url: CURSEFORGE_API_BASE.to_string(),
            api_key: api_key.into(),
            game_version: None,
            mod_loader_type: None,
        }
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_game_version<S: Into<String>>(mut self, game_version: S) -> Self {
        self.game_version = Some(game_version.into());
        self
    }

    pub fn with_mod_loader_type<S: Into<String>>(mut self, mod_loader_type: S) -> Self {
        self.mod_loader_type = Some(mod_loader_type.into());
        self
    }

    /// Build the config from an already-loaded settings source
    ///
    /// `lookup` is usually `std::env::var(..).ok()`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get(CURSEFORGE_API_KEY_VAR).ok_or_else(|| PackError::Configuration {
            message: format!("{} is not set", CURSEFORGE_API_KEY_VAR),
            field: Some(CURSEFORGE_API_KEY_VAR.to_string()),
            suggestion: Some(format!(
                "Set {} in your environment or .env file",
                CURSEFORGE_API_KEY_VAR
            )),
        })?;

        Ok(Self {
            base_url: CURSEFORGE_API_BASE.to_string(),
            api_key,
            game_version: get(CURSEFORGE_GAME_VERSION_VAR),
            mod_loader_type: get(CURSEFORGE_MOD_LOADER_TYPE_VAR),
        })
    }
}
