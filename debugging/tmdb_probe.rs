//! Query TMDB through the app's client and print the normalized result.
//! Usage:
//!   cargo run --bin tmdb_probe -- now-playing [page]
//!   cargo run --bin tmdb_probe -- search <query> [page]
//!   cargo run --bin tmdb_probe -- movie <tmdb_id>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use reelshelf::details::{self, DetailView};
use reelshelf::present::MovieCard;
use reelshelf::scope::Scope;
use reelshelf::tmdb::{MovieApi, TmdbClient, TMDB_BASE};
use reelshelf::toggle::FavoriteState;
use serde_json::json;
use std::env;

fn usage() -> anyhow::Error {
    anyhow::anyhow!("usage: tmdb_probe <now-playing [page] | search <query> [page] | movie <id>>")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
    let base = env::var("TMDB_BASE_URL").unwrap_or_else(|_| TMDB_BASE.to_string());
    let client = TmdbClient::new(api_key, base)?;
    let scope = Scope::new();

    let args: Vec<String> = env::args().skip(1).collect();
    let page_arg = |idx: usize| -> Result<u32> {
        args.get(idx)
            .map(|p| p.parse::<u32>().context("page must be a number"))
            .unwrap_or(Ok(1))
    };

    let output = match args.first().map(String::as_str) {
        Some("now-playing") => {
            let page = client.now_playing(page_arg(1)?, &scope).await?;
            let cards: Vec<MovieCard> = page.items.iter().map(|m| MovieCard::new(m, None)).collect();
            json!({ "page": page.page, "total_pages": page.total_pages, "cards": cards })
        }
        Some("search") => {
            let query = args.get(1).ok_or_else(usage)?;
            let page = client.search(query, page_arg(2)?, &scope).await?;
            let cards: Vec<MovieCard> = page.items.iter().map(|m| MovieCard::new(m, None)).collect();
            json!({ "query": query, "total_pages": page.total_pages, "cards": cards })
        }
        Some("movie") => {
            let id: i64 = args
                .get(1)
                .ok_or_else(usage)?
                .parse()
                .context("movie id must be a number")?;
            let movie = details::aggregate(&client, id, &scope).await?;
            serde_json::to_value(DetailView::new(&movie, FavoriteState::Unknown))?
        }
        _ => return Err(usage()),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
