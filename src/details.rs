use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::models::{CastMember, FavoriteEntry, MovieDetail, MovieSummary};
use crate::present::{self, MovieCard, VoteTier};
use crate::scope::Scope;
use crate::tmdb::MovieApi;
use crate::toggle::FavoriteState;

pub const MAX_CAST: usize = 5;
pub const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPart {
    Details,
    Credits,
    Recommendations,
}

impl DetailPart {
    fn message(&self) -> &'static str {
        match self {
            DetailPart::Details => "Failed to fetch movie details.",
            DetailPart::Credits => "Failed to fetch cast details.",
            DetailPart::Recommendations => "Failed to fetch recommendations.",
        }
    }
}

/// The first sub-request that failed; its siblings' results are discarded.
#[derive(Debug, Error)]
#[error("{}", .part.message())]
pub struct DetailError {
    pub part: DetailPart,
    #[source]
    pub source: FetchError,
}

impl DetailError {
    fn wrap(part: DetailPart) -> impl FnOnce(FetchError) -> DetailError {
        move |source| DetailError { part, source }
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetails {
    pub detail: MovieDetail,
    pub cast: Vec<CastMember>,
    pub recommendations: Vec<MovieSummary>,
}

impl MovieDetails {
    pub fn favorite_entry(&self) -> FavoriteEntry {
        self.detail.favorite_entry()
    }
}

/// Fetches details, credits and recommendations concurrently. All three must
/// succeed; there is no partial result.
pub async fn aggregate(
    api: &dyn MovieApi,
    id: i64,
    scope: &Scope,
) -> Result<MovieDetails, DetailError> {
    debug!(id, "aggregating movie details");
    let result = tokio::try_join!(
        async {
            api.details(id, scope)
                .await
                .map_err(DetailError::wrap(DetailPart::Details))
        },
        async {
            api.credits(id, scope)
                .await
                .map_err(DetailError::wrap(DetailPart::Credits))
        },
        async {
            api.recommendations(id, scope)
                .await
                .map_err(DetailError::wrap(DetailPart::Recommendations))
        },
    );
    let (detail, mut cast, mut recommendations) = match result {
        Ok(parts) => parts,
        Err(e) => {
            if !e.is_cancelled() {
                warn!("Detail aggregation for {} failed: {} ({})", id, e, e.source);
            }
            return Err(e);
        }
    };
    cast.truncate(MAX_CAST);
    recommendations.truncate(MAX_RECOMMENDATIONS);
    Ok(MovieDetails {
        detail,
        cast,
        recommendations,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastView {
    pub name: String,
    pub character: Option<String>,
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyView {
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub release_label: String,
    pub poster_url: Option<String>,
    pub backdrop_url: String,
    pub vote_percent: u32,
    pub vote_tier: VoteTier,
    pub stars: u8,
    pub vote_count: u32,
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub language: Option<String>,
    pub production_companies: Vec<CompanyView>,
    pub homepage: Option<String>,
    pub cast: Vec<CastView>,
    pub recommendations: Vec<MovieCard>,
    pub favorite: FavoriteState,
}

impl DetailView {
    pub fn new(details: &MovieDetails, favorite: FavoriteState) -> Self {
        let d = &details.detail;
        let percent = present::vote_percent(d.vote_average);
        Self {
            id: d.id,
            title: d.title.clone(),
            overview: if d.overview.trim().is_empty() {
                "No overview available.".to_string()
            } else {
                d.overview.clone()
            },
            release_label: present::release_label(d.release_date.as_deref()),
            poster_url: present::poster_url(d.poster_path.as_deref()),
            backdrop_url: present::backdrop_url(
                d.backdrop_path.as_deref(),
                d.poster_path.as_deref(),
            ),
            vote_percent: percent,
            vote_tier: VoteTier::for_percent(percent),
            stars: present::star_count(d.vote_average),
            vote_count: d.vote_count,
            genres: d.genres.iter().map(|g| g.name.clone()).collect(),
            runtime_minutes: d.runtime.filter(|r| *r > 0),
            language: d
                .spoken_languages
                .first()
                .map(|l| l.english_name.clone())
                .filter(|n| !n.is_empty()),
            production_companies: d
                .production_companies
                .iter()
                .map(|c| CompanyView {
                    name: c.name.clone(),
                    logo_url: present::poster_url(c.logo_path.as_deref()),
                })
                .collect(),
            homepage: d.homepage.clone().filter(|h| !h.is_empty()),
            cast: details
                .cast
                .iter()
                .map(|c| CastView {
                    name: c.name.clone(),
                    character: c.character.clone(),
                    profile_url: present::poster_url(c.profile_path.as_deref()),
                })
                .collect(),
            recommendations: details
                .recommendations
                .iter()
                .map(|m| MovieCard::new(m, None))
                .collect(),
            favorite,
        }
    }
}
