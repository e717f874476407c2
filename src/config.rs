use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::listing::PaginationMode;
use crate::tmdb::TMDB_BASE;

const DEFAULT_BIND: &str = "0.0.0.0:3147";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    pub pagination: PaginationMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .context("Missing required environment variable: TMDB_API_KEY")?;
        let tmdb_base_url = env::var("TMDB_BASE_URL").unwrap_or_else(|_| TMDB_BASE.to_string());
        let data_dir = env::var("REELSHELF_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        let bind_raw = env::var("REELSHELF_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid REELSHELF_BIND address '{}'", bind_raw))?;
        let pagination = match env::var("REELSHELF_PAGINATION").as_deref() {
            Err(_) | Ok("infinite") => PaginationMode::Append,
            Ok("numbered") => PaginationMode::Replace,
            Ok(other) => anyhow::bail!(
                "Invalid REELSHELF_PAGINATION '{}' (expected 'infinite' or 'numbered')",
                other
            ),
        };

        info!("All required environment variables are set");
        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            data_dir,
            bind,
            pagination,
        })
    }
}
