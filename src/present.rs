use chrono::NaiveDate;
use serde::Serialize;

use crate::favorites::FavoriteIds;
use crate::models::{FavoriteEntry, MovieSummary};

const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/w780";
const PLACEHOLDER_BACKDROP: &str = "https://placehold.co/780x439/cccccc/333333?text=No+Backdrop";

/// Colour of the vote ring on a movie card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteTier {
    Green,
    Orange,
    Red,
}

impl VoteTier {
    pub fn for_percent(percent: u32) -> Self {
        match percent {
            70.. => VoteTier::Green,
            40..=69 => VoteTier::Orange,
            _ => VoteTier::Red,
        }
    }
}

pub fn vote_percent(vote_average: f32) -> u32 {
    (vote_average.clamp(0.0, 10.0) * 10.0).round() as u32
}

/// Filled stars out of five.
pub fn star_count(vote_average: f32) -> u8 {
    (vote_average.clamp(0.0, 10.0) / 2.0).round() as u8
}

/// `2024-03-07` -> `Mar 07, 2024`; anything unparseable is `N/A`.
pub fn release_label(date: Option<&str>) -> String {
    date.and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn poster_url(path: Option<&str>) -> Option<String> {
    image_url(POSTER_BASE, path)
}

pub fn backdrop_url(backdrop: Option<&str>, poster: Option<&str>) -> String {
    image_url(BACKDROP_BASE, backdrop)
        .or_else(|| poster_url(poster))
        .unwrap_or_else(|| PLACEHOLDER_BACKDROP.to_string())
}

fn image_url(base: &str, path: Option<&str>) -> Option<String> {
    let path = path?.trim();
    if path.is_empty() {
        return None;
    }
    Some(format!("{base}/{}", path.trim_start_matches('/')))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieCard {
    pub id: i64,
    pub title: String,
    pub poster_url: Option<String>,
    pub release_label: String,
    pub vote_percent: u32,
    pub vote_tier: VoteTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl MovieCard {
    /// Builds a card; `favorites` is only given when the list shows favorite badges.
    pub fn new(movie: &MovieSummary, favorites: Option<&FavoriteIds>) -> Self {
        let percent = vote_percent(movie.vote_average);
        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_url: poster_url(movie.poster_path.as_deref()),
            release_label: release_label(movie.release_date.as_deref()),
            vote_percent: percent,
            vote_tier: VoteTier::for_percent(percent),
            is_favorite: favorites.map(|ids| ids.contains(&movie.id)),
        }
    }
}

/// Row on the watchlist screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchListRow {
    pub id: i64,
    pub title: String,
    pub poster_url: Option<String>,
    pub release_label: String,
}

impl From<&FavoriteEntry> for WatchListRow {
    fn from(entry: &FavoriteEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            poster_url: poster_url(entry.poster_path.as_deref()),
            release_label: release_label(entry.release_date.as_deref()),
        }
    }
}
