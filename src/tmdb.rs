use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::{CastMember, MovieDetail, MoviePage, MovieSummary};
use crate::scope::Scope;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";

#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn now_playing(&self, page: u32, scope: &Scope) -> Result<MoviePage, FetchError>;
    /// Raw keyword search. Callers go through [`MovieApi::search`].
    async fn search_movies(
        &self,
        query: &str,
        page: u32,
        scope: &Scope,
    ) -> Result<MoviePage, FetchError>;
    async fn details(&self, id: i64, scope: &Scope) -> Result<MovieDetail, FetchError>;
    async fn credits(&self, id: i64, scope: &Scope) -> Result<Vec<CastMember>, FetchError>;
    async fn recommendations(
        &self,
        id: i64,
        scope: &Scope,
    ) -> Result<Vec<MovieSummary>, FetchError>;

    /// Keyword search; a blank query yields an empty page without touching the network.
    async fn search(&self, query: &str, page: u32, scope: &Scope) -> Result<MoviePage, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(MoviePage::empty(page));
        }
        self.search_movies(query, page, scope).await
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let user_agent = format!("reelshelf/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.tmdb_api_key.clone(), config.tmdb_base_url.clone())
    }

    fn url(&self, path: &str, extra: &str) -> String {
        format!(
            "{}{path}?api_key={}&language=en-US{extra}",
            self.base_url, self.api_key
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        scope: &Scope,
    ) -> Result<T, FetchError> {
        scope
            .run(async {
                let res = self.client.get(url).send().await?;
                let status = res.status();
                let text = res.text().await?;
                if !status.is_success() {
                    return Err(FetchError::BadResponse {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Ok(serde_json::from_str(&text)?)
            })
            .await
    }
}

#[async_trait]
impl MovieApi for TmdbClient {
    async fn now_playing(&self, page: u32, scope: &Scope) -> Result<MoviePage, FetchError> {
        debug!(page, "fetching now playing");
        let url = self.url("/movie/now_playing", &format!("&page={page}"));
        let data: PagedResponse = self.get_json(&url, scope).await?;
        Ok(data.into_page())
    }

    async fn search_movies(
        &self,
        query: &str,
        page: u32,
        scope: &Scope,
    ) -> Result<MoviePage, FetchError> {
        debug!(query, page, "searching movies");
        let url = self.url(
            "/search/movie",
            &format!("&query={}&page={page}", urlencoding::encode(query)),
        );
        let data: PagedResponse = self.get_json(&url, scope).await?;
        Ok(data.into_page())
    }

    async fn details(&self, id: i64, scope: &Scope) -> Result<MovieDetail, FetchError> {
        let url = self.url(&format!("/movie/{id}"), "");
        self.get_json(&url, scope).await
    }

    async fn credits(&self, id: i64, scope: &Scope) -> Result<Vec<CastMember>, FetchError> {
        #[derive(Deserialize)]
        struct Credits {
            #[serde(default)]
            cast: Vec<CastMember>,
        }

        let url = self.url(&format!("/movie/{id}/credits"), "");
        let data: Credits = self.get_json(&url, scope).await?;
        Ok(data.cast)
    }

    async fn recommendations(
        &self,
        id: i64,
        scope: &Scope,
    ) -> Result<Vec<MovieSummary>, FetchError> {
        let url = self.url(&format!("/movie/{id}/recommendations"), "&page=1");
        let data: PagedResponse = self.get_json(&url, scope).await?;
        Ok(data.results)
    }
}

#[derive(Debug, Deserialize)]
struct PagedResponse {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    results: Vec<MovieSummary>,
    #[serde(default)]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

impl PagedResponse {
    fn into_page(self) -> MoviePage {
        MoviePage {
            items: self.results,
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}
