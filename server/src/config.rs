use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_KEY: &str = "dev-api-key-12345";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Process-wide settings, read once at startup and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let api_key = non_empty_var("API_KEY").unwrap_or_else(|| DEFAULT_API_KEY.to_string());

        let upload_dir = non_empty_var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let max_file_size = non_empty_var("MAX_FILE_SIZE")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);

        let host = non_empty_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = non_empty_var("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            api_key,
            upload_dir,
            max_file_size,
            host,
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Transport ceiling for request bodies. Kept well above `max_file_size`
    /// so oversized files are still read and rejected by the validator.
    pub fn request_body_limit(&self) -> usize {
        self.max_file_size
            .saturating_mul(2)
            .saturating_add(MULTIPART_OVERHEAD)
    }

    pub fn uses_default_api_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
