use std::env;
use std::path::PathBuf;

use serde::Deserialize;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub ocr: OcrToolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Resource ceilings applied before the external tool is launched.
/// Read-only after startup.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_mb: u64,
    pub max_pages: usize,
}

impl LimitsConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

/// External OCR toolchain binding.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrToolConfig {
    /// Binary invoked for every job. Overridable for tests and packaging.
    pub binary: String,
    /// Internal worker count passed as `--jobs`. Kept at 1 or 2 to bound
    /// resource usage per request on constrained hosts.
    pub jobs: u32,
    /// Wall-clock ceiling for one invocation.
    pub timeout_secs: u64,
    /// Application-owned scratch root. Falls back to the system temp dir.
    pub temp_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("TEXTLAYER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("TEXTLAYER_PORT", 8000),
            },
            limits: LimitsConfig {
                max_upload_mb: parse_env_or("TEXTLAYER_MAX_UPLOAD_MB", 200),
                max_pages: parse_env_or("TEXTLAYER_MAX_PAGES", 1000),
            },
            ocr: OcrToolConfig {
                binary: env::var("TEXTLAYER_OCR_BINARY").unwrap_or_else(|_| "ocrmypdf".to_string()),
                jobs: parse_env_or("TEXTLAYER_OCR_JOBS", 1),
                timeout_secs: parse_env_or("TEXTLAYER_OCR_TIMEOUT", 600),
                temp_root: env::var("TEXTLAYER_TEMP_ROOT").ok().map(PathBuf::from),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
