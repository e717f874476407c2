use serde::Serialize;
use tracing::{debug, warn};

use crate::details::{DetailError, DetailView, MovieDetails};
use crate::error::FetchError;
use crate::favorites::FavoritesStore;
use crate::listing::{ListController, ListSource, PageCursor, PageRequest, PaginationMode};
use crate::models::MoviePage;
use crate::navigation::Route;
use crate::present::{MovieCard, WatchListRow};
use crate::scope::Scope;
use crate::toggle::FavoriteToggle;

const LIST_ERROR: &str = "Failed to load movies.";

/// Network work a screen needs done on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Load {
    Page(PageRequest),
    Details(i64),
}

#[derive(Debug)]
pub enum Loaded {
    Page(PageRequest, Result<MoviePage, FetchError>),
    Details(Result<MovieDetails, DetailError>),
}

#[derive(Debug)]
pub struct DetailScreen {
    pub movie_id: i64,
    pub toggle: FavoriteToggle,
    pub loaded: Option<MovieDetails>,
}

#[derive(Debug)]
pub enum ScreenState {
    List(ListController),
    Details(Box<DetailScreen>),
    WatchList,
}

#[derive(Debug)]
pub struct Screen {
    pub id: u64,
    pub route: Route,
    pub scope: Scope,
    pub state: ScreenState,
    pub error: Option<String>,
}

impl Screen {
    pub fn new(id: u64, route: Route, state: ScreenState) -> Self {
        Self {
            id,
            route,
            scope: Scope::new(),
            state,
            error: None,
        }
    }

    /// Work to run when the screen is first shown.
    pub fn initial_load(&mut self) -> Option<Load> {
        match &mut self.state {
            ScreenState::List(list) => {
                let blank_search = matches!(list.source(), ListSource::Search(q) if q.is_empty());
                if blank_search {
                    None
                } else {
                    Some(Load::Page(list.start()))
                }
            }
            ScreenState::Details(d) => Some(Load::Details(d.movie_id)),
            ScreenState::WatchList => None,
        }
    }

    /// The screen became the top of the stack again. A list that is showing
    /// the error view starts over from its first page.
    pub fn focus(&mut self) -> Option<Load> {
        if self.error.is_some() && matches!(self.state, ScreenState::List(_)) {
            self.error = None;
            debug!(screen = self.id, "retrying list after error");
            return self.initial_load();
        }
        if let ScreenState::Details(d) = &mut self.state {
            if d.loaded.is_some() {
                d.toggle.refresh();
            }
        }
        None
    }

    pub fn list_mut(&mut self) -> Option<&mut ListController> {
        match &mut self.state {
            ScreenState::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn complete(&mut self, loaded: Loaded) {
        match (loaded, &mut self.state) {
            (Loaded::Page(request, result), ScreenState::List(list)) => match result {
                Ok(page) => {
                    if list.apply(&request, page) {
                        self.error = None;
                    }
                }
                Err(e) => {
                    list.fail(&request);
                    if !e.is_cancelled() {
                        warn!("Failed to load page {}: {}", request.page, e);
                        // Earlier pages stay on screen; only an empty list turns into the error view.
                        if list.items().is_empty() {
                            self.error = Some(LIST_ERROR.to_string());
                        }
                    }
                }
            },
            (Loaded::Details(result), ScreenState::Details(d)) => match result {
                Ok(details) => {
                    d.loaded = Some(details);
                    d.toggle.refresh();
                    self.error = None;
                }
                Err(e) => {
                    if !e.is_cancelled() {
                        self.error = Some(e.to_string());
                    }
                }
            },
            _ => debug!(screen = self.id, "load result does not match screen"),
        }
    }

    pub async fn render(&mut self, favorites: &FavoritesStore) -> ScreenView {
        if let Some(message) = &self.error {
            return ScreenView::Error {
                message: message.clone(),
                action: ErrorAction::GoBack,
            };
        }
        match &mut self.state {
            ScreenState::List(list) => {
                let view = ListView::new(list, favorites);
                match self.route {
                    Route::Search => ScreenView::Search(view),
                    _ => ScreenView::Home(view),
                }
            }
            ScreenState::Details(d) => {
                let favorite = d.toggle.state();
                ScreenView::Details {
                    movie_id: d.movie_id,
                    loading: d.loaded.is_none(),
                    detail: d.loaded.as_ref().map(|m| DetailView::new(m, favorite)),
                }
            }
            ScreenState::WatchList => {
                let rows: Vec<WatchListRow> = favorites
                    .entries()
                    .await
                    .iter()
                    .map(WatchListRow::from)
                    .collect();
                ScreenView::WatchList { rows }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    GoBack,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView {
    pub mode: PaginationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub cards: Vec<MovieCard>,
    pub cursor: PageCursor,
    pub page_window: Vec<u32>,
    pub loading: bool,
    pub end_of_results: bool,
    pub load_error: Option<String>,
}

impl ListView {
    fn new(list: &ListController, favorites: &FavoritesStore) -> Self {
        let mode = list.config().mode;
        Self {
            mode,
            query: match list.source() {
                ListSource::Search(q) => Some(q.clone()),
                ListSource::NowPlaying => None,
            },
            cards: list.cards(&favorites.ids()),
            cursor: list.cursor(),
            page_window: match mode {
                PaginationMode::Replace => list.page_window(),
                PaginationMode::Append => Vec::new(),
            },
            loading: list.is_loading(),
            end_of_results: list.end_of_results(),
            load_error: list.last_failed().then(|| LIST_ERROR.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenView {
    Home(ListView),
    Search(ListView),
    Details {
        movie_id: i64,
        loading: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<DetailView>,
    },
    WatchList {
        rows: Vec<WatchListRow>,
    },
    Error {
        message: String,
        action: ErrorAction,
    },
}
