use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub services: Option<ServicesConfig>,
    pub limits: Option<LimitsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub completion_key: Option<String>,
    pub pdfco_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub completion_url: Option<String>,
    pub completion_model: Option<String>,
    pub pdfco_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub completion_timeout_secs: Option<u64>,
    pub document_timeout_secs: Option<u64>,
    pub max_prompt_chars: Option<usize>,
    pub session_idle_secs: Option<u64>,
    pub max_upload_mb: Option<u32>,
}

/// Platform config directory path: `<config_dir>/formfox/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("formfox").join("config.toml"))
}

/// Load config by cascading CWD `.formfox.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".formfox.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            completion_key: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.completion_key.clone())
                .or_else(|| base.api_keys.as_ref().and_then(|a| a.completion_key.clone())),
            pdfco_key: overlay
                .api_keys
                .as_ref()
                .and_then(|a| a.pdfco_key.clone())
                .or_else(|| base.api_keys.as_ref().and_then(|a| a.pdfco_key.clone())),
        }),
        services: Some(ServicesConfig {
            completion_url: overlay
                .services
                .as_ref()
                .and_then(|s| s.completion_url.clone())
                .or_else(|| base.services.as_ref().and_then(|s| s.completion_url.clone())),
            completion_model: overlay
                .services
                .as_ref()
                .and_then(|s| s.completion_model.clone())
                .or_else(|| {
                    base.services
                        .as_ref()
                        .and_then(|s| s.completion_model.clone())
                }),
            pdfco_url: overlay
                .services
                .as_ref()
                .and_then(|s| s.pdfco_url.clone())
                .or_else(|| base.services.as_ref().and_then(|s| s.pdfco_url.clone())),
        }),
        limits: Some(LimitsConfig {
            completion_timeout_secs: overlay
                .limits
                .as_ref()
                .and_then(|l| l.completion_timeout_secs)
                .or_else(|| base.limits.as_ref().and_then(|l| l.completion_timeout_secs)),
            document_timeout_secs: overlay
                .limits
                .as_ref()
                .and_then(|l| l.document_timeout_secs)
                .or_else(|| base.limits.as_ref().and_then(|l| l.document_timeout_secs)),
            max_prompt_chars: overlay
                .limits
                .as_ref()
                .and_then(|l| l.max_prompt_chars)
                .or_else(|| base.limits.as_ref().and_then(|l| l.max_prompt_chars)),
            session_idle_secs: overlay
                .limits
                .as_ref()
                .and_then(|l| l.session_idle_secs)
                .or_else(|| base.limits.as_ref().and_then(|l| l.session_idle_secs)),
            max_upload_mb: overlay
                .limits
                .as_ref()
                .and_then(|l| l.max_upload_mb)
                .or_else(|| base.limits.as_ref().and_then(|l| l.max_upload_mb)),
        }),
    }
}
