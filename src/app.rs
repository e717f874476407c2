use crate::config::Config;
use crate::details;
use crate::favorites::{FavoritesStore, FileStore};
use crate::listing::{fetch_page, ListConfig, ListController, PageRequest, PaginationMode};
use crate::models::FavoriteEntry;
use crate::navigation::{Navigator, Route};
use crate::scope::Scope;
use crate::screens::{Load, Loaded, Screen, ScreenState, ScreenView};
use crate::search::{Debouncer, SEARCH_DEBOUNCE};
use crate::tmdb::{MovieApi, TmdbClient};
use crate::toggle::{FavoriteChange, FavoriteToggle};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn MovieApi>,
    pub favorites: Arc<FavoritesStore>,
    pub nav: Arc<Mutex<Navigator>>,
    pub debouncer: Debouncer,
    pub search_debounce: Duration,
}

/// A load detached from the navigator lock, tied to the screen that asked for it.
struct Pending {
    screen_id: u64,
    scope: Scope,
    load: Load,
}

fn pending_for(screen: &Screen, load: Option<Load>) -> Option<Pending> {
    load.map(|load| Pending {
        screen_id: screen.id,
        scope: screen.scope.clone(),
        load,
    })
}

impl AppState {
    /// Builds the navigator and fills the home screen.
    pub async fn new(
        api: Arc<dyn MovieApi>,
        favorites: Arc<FavoritesStore>,
        pagination: PaginationMode,
        search_debounce: Duration,
    ) -> Self {
        let list = match pagination {
            PaginationMode::Append => ListConfig::infinite_scroll(),
            PaginationMode::Replace => ListConfig::numbered_pages(),
        }
        .with_favorite_badge(true);
        let (nav, load) = Navigator::new(list, list, &favorites);
        let pending = pending_for(nav.current(), load);
        let state = Self {
            api,
            favorites,
            nav: Arc::new(Mutex::new(nav)),
            debouncer: Debouncer::new(),
            search_debounce,
        };
        state.run(pending).await;
        state
    }

    /// Fetches without holding the navigator, then applies the result if the
    /// screen is still on the stack.
    async fn run(&self, pending: Option<Pending>) {
        let Some(Pending {
            screen_id,
            scope,
            load,
        }) = pending
        else {
            return;
        };
        let loaded = match load {
            Load::Page(request) => {
                let result = fetch_page(self.api.as_ref(), &request, &scope).await;
                Loaded::Page(request, result)
            }
            Load::Details(id) => {
                Loaded::Details(details::aggregate(self.api.as_ref(), id, &scope).await)
            }
        };
        let mut nav = self.nav.lock().await;
        match nav.get_mut(screen_id) {
            Some(screen) => screen.complete(loaded),
            None => debug!(screen = screen_id, "dropping result for retired screen"),
        }
    }

    async fn render(&self) -> ScreenView {
        let mut nav = self.nav.lock().await;
        nav.current_mut().render(&self.favorites).await
    }

    async fn list_intent<F>(&self, intent: F) -> Result<Json<ScreenView>, ApiError>
    where
        F: FnOnce(&mut ListController) -> Option<PageRequest>,
    {
        let pending = {
            let mut nav = self.nav.lock().await;
            let screen = nav.current_mut();
            let list = screen.list_mut().ok_or(ApiError::WrongScreen("list"))?;
            let load = intent(list).map(Load::Page);
            pending_for(screen, load)
        };
        self.run(pending).await;
        Ok(Json(self.render().await))
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let favorites = Arc::new(FavoritesStore::load(Arc::new(FileStore::new(&config.data_dir))).await);
    info!(
        "Loaded {} favorites from {}",
        favorites.ids().len(),
        config.data_dir.display()
    );
    let api: Arc<dyn MovieApi> = Arc::new(TmdbClient::from_config(&config)?);
    let state = AppState::new(api, favorites, config.pagination, SEARCH_DEBOUNCE).await;

    let app = build_router(state);

    info!("Listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/screen", get(current_screen))
        .route("/navigate", post(navigate))
        .route("/back", post(back))
        .route("/screen/query", post(set_query))
        .route("/screen/scroll", post(scroll))
        .route("/screen/end-reached", post(end_reached))
        .route("/screen/momentum", post(momentum_begin))
        .route("/screen/page", post(select_page))
        .route("/screen/favorites/:id/toggle", post(toggle_favorite))
        .route("/watchlist", get(watchlist))
        .route("/watchlist/:id", delete(remove_from_watchlist))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("current screen is not a {0} screen")]
    WrongScreen(&'static str),
    #[error("movie {0} is not on the current screen")]
    NotOnScreen(i64),
    #[error("movie details are still loading")]
    NotLoaded,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotOnScreen(_) => StatusCode::NOT_FOUND,
            ApiError::WrongScreen(_) | ApiError::NotLoaded => StatusCode::CONFLICT,
        };
        (
            status,
            Json(json!({"status": "error", "message": self.to_string()})),
        )
            .into_response()
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn current_screen(State(state): State<AppState>) -> Json<ScreenView> {
    Json(state.render().await)
}

#[derive(Debug, Deserialize)]
struct NavigateBody {
    route: Route,
}

async fn navigate(State(state): State<AppState>, Json(body): Json<NavigateBody>) -> Json<ScreenView> {
    let pending = {
        let mut nav = state.nav.lock().await;
        let load = nav.push(body.route, &state.favorites);
        pending_for(nav.current(), load)
    };
    state.run(pending).await;
    Json(state.render().await)
}

async fn back(State(state): State<AppState>) -> Json<ScreenView> {
    let pending = {
        let mut nav = state.nav.lock().await;
        let load = nav.back();
        pending_for(nav.current(), load)
    };
    state.run(pending).await;
    Json(state.render().await)
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    query: String,
}

async fn set_query(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> Result<(StatusCode, Json<ScreenView>), ApiError> {
    if !state.debouncer.settle(state.search_debounce).await {
        debug!(query = %body.query, "search superseded by newer input");
        return Ok((StatusCode::ACCEPTED, Json(state.render().await)));
    }
    let pending = {
        let mut nav = state.nav.lock().await;
        let screen = nav.current_mut();
        if screen.route != Route::Search {
            return Err(ApiError::WrongScreen("search"));
        }
        screen.error = None;
        let list = screen.list_mut().ok_or(ApiError::WrongScreen("search"))?;
        let request = list.set_query(&body.query);
        pending_for(screen, Some(Load::Page(request)))
    };
    state.run(pending).await;
    Ok((StatusCode::OK, Json(state.render().await)))
}

#[derive(Debug, Deserialize)]
struct ScrollBody {
    offset: f32,
    viewport: f32,
    content: f32,
}

async fn scroll(
    State(state): State<AppState>,
    Json(body): Json<ScrollBody>,
) -> Result<Json<ScreenView>, ApiError> {
    state
        .list_intent(|list| list.on_scroll(body.offset, body.viewport, body.content))
        .await
}

async fn end_reached(State(state): State<AppState>) -> Result<Json<ScreenView>, ApiError> {
    state.list_intent(|list| list.on_end_reached()).await
}

async fn momentum_begin(State(state): State<AppState>) -> Result<Json<ScreenView>, ApiError> {
    state
        .list_intent(|list| {
            list.on_momentum_begin();
            None
        })
        .await
}

#[derive(Debug, Deserialize)]
struct PageBody {
    page: u32,
}

async fn select_page(
    State(state): State<AppState>,
    Json(body): Json<PageBody>,
) -> Result<Json<ScreenView>, ApiError> {
    state.list_intent(|list| list.select_page(body.page)).await
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(movie_id): Path<i64>,
) -> Result<Json<ScreenView>, ApiError> {
    let change = {
        let mut nav = state.nav.lock().await;
        let change = match &mut nav.current_mut().state {
            ScreenState::Details(d) => {
                if d.movie_id != movie_id {
                    return Err(ApiError::NotOnScreen(movie_id));
                }
                let entry = d
                    .loaded
                    .as_ref()
                    .map(|m| m.favorite_entry())
                    .ok_or(ApiError::NotLoaded)?;
                d.toggle.flip(entry)
            }
            ScreenState::List(list) => {
                let entry = list
                    .items()
                    .iter()
                    .find(|m| m.id == movie_id)
                    .map(FavoriteEntry::from)
                    .ok_or(ApiError::NotOnScreen(movie_id))?;
                FavoriteToggle::new(movie_id, &state.favorites).flip(entry)
            }
            ScreenState::WatchList => {
                if !state.favorites.contains(movie_id) {
                    return Err(ApiError::NotOnScreen(movie_id));
                }
                FavoriteChange::Remove(movie_id)
            }
        };
        change
    };
    // Applied outside the navigator lock.
    if !change.apply(&state.favorites).await {
        debug!(movie_id, "favorite already in the requested state");
    }
    Ok(Json(state.render().await))
}

async fn watchlist(State(state): State<AppState>) -> Json<Vec<FavoriteEntry>> {
    Json(state.favorites.entries().await)
}

async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path(movie_id): Path<i64>,
) -> StatusCode {
    if state.favorites.remove(movie_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
