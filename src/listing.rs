//! Paginated movie lists.
//!
//! One [`ListController`] backs the home and search screens. Its
//! [`PaginationMode`] picks between infinite scroll, where pages accumulate,
//! and numbered pages, where each selected page replaces the list.
//!
//! The controller does no I/O. Intents return a [`PageRequest`]; the caller
//! fetches it (see [`fetch_page`]) and hands the result back to
//! [`ListController::apply`]. Requests carry a generation so a response that
//! lost a race to a newer request is dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::FetchError;
use crate::favorites::FavoriteIds;
use crate::models::{MoviePage, MovieSummary};
use crate::present::MovieCard;
use crate::scope::Scope;
use crate::tmdb::MovieApi;

/// Remaining content, in viewport lengths, at which the next page is requested.
pub const END_REACHED_THRESHOLD: f32 = 0.75;
pub const MAX_VISIBLE_PAGES: u32 = 5;
pub const REPLACE_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListConfig {
    pub mode: PaginationMode,
    pub show_favorite_badge: bool,
    pub max_visible_pages: u32,
    pub replace_page_size: usize,
    pub end_threshold: f32,
}

impl ListConfig {
    pub fn infinite_scroll() -> Self {
        Self {
            mode: PaginationMode::Append,
            show_favorite_badge: false,
            max_visible_pages: MAX_VISIBLE_PAGES,
            replace_page_size: REPLACE_PAGE_SIZE,
            end_threshold: END_REACHED_THRESHOLD,
        }
    }

    pub fn numbered_pages() -> Self {
        Self {
            mode: PaginationMode::Replace,
            ..Self::infinite_scroll()
        }
    }

    pub fn with_favorite_badge(mut self, show: bool) -> Self {
        self.show_favorite_badge = show;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    NowPlaying,
    Search(String),
}

/// Current page and the remote page count (0 until the first page arrives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub page: u32,
    pub total_pages: u32,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 1,
            total_pages: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Append,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub source: ListSource,
    pub page: u32,
    generation: u64,
    merge: Merge,
}

#[derive(Debug, Clone)]
pub struct ListController {
    config: ListConfig,
    source: ListSource,
    items: Vec<MovieSummary>,
    seen: HashSet<i64>,
    cursor: PageCursor,
    generation: u64,
    loading: bool,
    last_failed: bool,
    fired_this_momentum: bool,
    exhausted: bool,
}

impl ListController {
    pub fn new(config: ListConfig, source: ListSource) -> Self {
        Self {
            config,
            source,
            items: Vec::new(),
            seen: HashSet::new(),
            cursor: PageCursor::default(),
            generation: 0,
            loading: false,
            last_failed: false,
            fired_this_momentum: false,
            exhausted: false,
        }
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn source(&self) -> &ListSource {
        &self.source
    }

    pub fn items(&self) -> &[MovieSummary] {
        &self.items
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The latest request failed; items from earlier pages are kept.
    pub fn last_failed(&self) -> bool {
        self.last_failed
    }

    /// True once auto-fetching stopped with results on screen.
    pub fn end_of_results(&self) -> bool {
        self.exhausted && !self.items.is_empty()
    }

    /// Request for the first page of the current source.
    pub fn start(&mut self) -> PageRequest {
        self.reset();
        self.request(1, Merge::Replace)
    }

    /// Switches to a new search term, resetting the cursor to page 1.
    pub fn set_query(&mut self, query: &str) -> PageRequest {
        self.source = ListSource::Search(query.trim().to_string());
        self.start()
    }

    /// A new scroll gesture started; the next end-reached event may fire again.
    pub fn on_momentum_begin(&mut self) {
        self.fired_this_momentum = false;
    }

    pub fn on_scroll(&mut self, offset: f32, viewport: f32, content: f32) -> Option<PageRequest> {
        if is_near_end(offset, viewport, content, self.config.end_threshold) {
            self.on_end_reached()
        } else {
            None
        }
    }

    /// Next page for infinite scroll, at most once per scroll momentum.
    pub fn on_end_reached(&mut self) -> Option<PageRequest> {
        if self.config.mode != PaginationMode::Append
            || self.fired_this_momentum
            || self.exhausted
            || self.loading
        {
            return None;
        }
        if self.cursor.total_pages > 0 && self.cursor.page >= self.cursor.total_pages {
            self.exhausted = true;
            return None;
        }
        self.fired_this_momentum = true;
        Some(self.request(self.cursor.page + 1, Merge::Append))
    }

    /// Replaces the list with `page`, clamped to the known page range.
    pub fn select_page(&mut self, page: u32) -> Option<PageRequest> {
        if self.config.mode != PaginationMode::Replace {
            return None;
        }
        let last = self.cursor.total_pages.max(1);
        Some(self.request(page.clamp(1, last), Merge::Replace))
    }

    pub fn next_page(&mut self) -> Option<PageRequest> {
        if self.cursor.page >= self.cursor.total_pages {
            return None;
        }
        self.select_page(self.cursor.page + 1)
    }

    pub fn previous_page(&mut self) -> Option<PageRequest> {
        if self.cursor.page <= 1 {
            return None;
        }
        self.select_page(self.cursor.page - 1)
    }

    /// Merges a fetched page. Returns false when the request was superseded.
    pub fn apply(&mut self, request: &PageRequest, page: MoviePage) -> bool {
        if request.generation != self.generation {
            return false;
        }
        self.loading = false;
        self.last_failed = false;
        self.cursor = PageCursor {
            page: request.page,
            total_pages: page.total_pages,
        };
        match request.merge {
            Merge::Replace => {
                self.items.clear();
                self.seen.clear();
                let limit = match self.config.mode {
                    PaginationMode::Replace => self.config.replace_page_size,
                    PaginationMode::Append => usize::MAX,
                };
                self.extend(page.items.into_iter().take(limit));
            }
            Merge::Append => {
                if page.items.is_empty() {
                    self.exhausted = true;
                }
                self.extend(page.items);
            }
        }
        if self.config.mode == PaginationMode::Append
            && (self.items.is_empty() || request.page >= self.cursor.total_pages)
        {
            self.exhausted = true;
        }
        true
    }

    /// Marks a request as failed; the cursor stays where it was.
    pub fn fail(&mut self, request: &PageRequest) {
        if request.generation == self.generation {
            self.loading = false;
            self.last_failed = true;
        }
    }

    /// Fetches `request` through `api` and merges the result.
    pub async fn drive(
        &mut self,
        request: PageRequest,
        api: &dyn MovieApi,
        scope: &Scope,
    ) -> Result<(), FetchError> {
        match fetch_page(api, &request, scope).await {
            Ok(page) => {
                self.apply(&request, page);
                Ok(())
            }
            Err(e) => {
                self.fail(&request);
                Err(e)
            }
        }
    }

    pub fn page_window(&self) -> Vec<u32> {
        page_window(
            self.cursor.page,
            self.cursor.total_pages,
            self.config.max_visible_pages,
        )
    }

    pub fn cards(&self, favorites: &FavoriteIds) -> Vec<MovieCard> {
        let badge = self.config.show_favorite_badge.then_some(favorites);
        self.items.iter().map(|m| MovieCard::new(m, badge)).collect()
    }

    fn reset(&mut self) {
        self.items.clear();
        self.seen.clear();
        self.cursor = PageCursor::default();
        self.exhausted = false;
        self.last_failed = false;
        self.fired_this_momentum = false;
    }

    fn request(&mut self, page: u32, merge: Merge) -> PageRequest {
        self.generation += 1;
        self.loading = true;
        PageRequest {
            source: self.source.clone(),
            page,
            generation: self.generation,
            merge,
        }
    }

    fn extend(&mut self, items: impl IntoIterator<Item = MovieSummary>) {
        for movie in items {
            if self.seen.insert(movie.id) {
                self.items.push(movie);
            }
        }
    }
}

pub async fn fetch_page(
    api: &dyn MovieApi,
    request: &PageRequest,
    scope: &Scope,
) -> Result<MoviePage, FetchError> {
    match &request.source {
        ListSource::NowPlaying => api.now_playing(request.page, scope).await,
        ListSource::Search(query) => api.search(query, request.page, scope).await,
    }
}

/// Up to `max_visible` page numbers centred on `current`, clamped to `[1, total]`.
pub fn page_window(current: u32, total: u32, max_visible: u32) -> Vec<u32> {
    if total == 0 || max_visible == 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total);
    let mut start = current.saturating_sub(max_visible / 2).max(1);
    let mut end = start + max_visible - 1;
    if end > total {
        end = total;
        start = (end + 1).saturating_sub(max_visible).max(1);
    }
    (start..=end).collect()
}

pub fn is_near_end(offset: f32, viewport: f32, content: f32, threshold: f32) -> bool {
    if viewport <= 0.0 {
        return false;
    }
    let remaining = content - (offset + viewport);
    remaining <= threshold * viewport
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movies(page: u32, n: usize) -> MoviePage {
        MoviePage {
            items: (0..n)
                .map(|i| MovieSummary {
                    id: (page as i64) * 1000 + i as i64,
                    title: format!("p{page}-{i}"),
                    poster_path: None,
                    release_date: None,
                    vote_average: 6.0,
                })
                .collect(),
            page,
            total_pages: 50,
        }
    }

    #[test]
    fn window_is_centred_and_clamped() {
        assert_eq!(page_window(7, 20, 5), vec![5, 6, 7, 8, 9]);
        assert_eq!(page_window(1, 20, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(20, 20, 5), vec![16, 17, 18, 19, 20]);
        assert_eq!(page_window(2, 3, 5), vec![1, 2, 3]);
        assert_eq!(page_window(1, 0, 5), Vec::<u32>::new());
    }

    #[test]
    fn append_accumulates_one_page_per_momentum() {
        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        assert!(list.apply(&first, movies(1, 20)));

        for k in 2..=4u32 {
            list.on_momentum_begin();
            let req = list.on_end_reached().expect("trigger");
            assert_eq!(req.page, k);
            // Repeated end-reached events from the same gesture are ignored.
            assert!(list.on_end_reached().is_none());
            list.apply(&req, movies(k, 20));
            assert!(list.on_end_reached().is_none());
        }
        assert_eq!(list.items().len(), 4 * 20);
        assert_eq!(list.cursor().page, 4);
    }

    #[test]
    fn empty_page_stops_auto_fetch() {
        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        list.apply(&first, movies(1, 3));
        list.on_momentum_begin();
        let req = list.on_end_reached().unwrap();
        list.apply(
            &req,
            MoviePage {
                items: Vec::new(),
                page: 2,
                total_pages: 50,
            },
        );
        list.on_momentum_begin();
        assert!(list.on_end_reached().is_none());
        assert!(list.end_of_results());
    }

    #[test]
    fn append_stops_at_last_page() {
        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        let mut page = movies(1, 5);
        page.total_pages = 1;
        list.apply(&first, page);
        list.on_momentum_begin();
        assert!(list.on_end_reached().is_none());
    }

    #[test]
    fn scroll_threshold_triggers_near_the_end() {
        assert!(!is_near_end(0.0, 800.0, 4000.0, END_REACHED_THRESHOLD));
        assert!(is_near_end(2700.0, 800.0, 4000.0, END_REACHED_THRESHOLD));
        assert!(!is_near_end(2500.0, 800.0, 4000.0, END_REACHED_THRESHOLD));

        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        list.apply(&first, movies(1, 20));
        list.on_momentum_begin();
        assert!(list.on_scroll(0.0, 800.0, 4000.0).is_none());
        assert_eq!(list.on_scroll(3000.0, 800.0, 4000.0).map(|r| r.page), Some(2));
    }

    #[test]
    fn replace_mode_swaps_and_truncates() {
        let mut list = ListController::new(ListConfig::numbered_pages(), ListSource::NowPlaying);
        let first = list.start();
        list.apply(&first, movies(1, 20));
        assert_eq!(list.items().len(), REPLACE_PAGE_SIZE);
        assert!(list.on_end_reached().is_none());

        let req = list.select_page(7).unwrap();
        list.apply(&req, movies(7, 20));
        assert_eq!(list.items().len(), REPLACE_PAGE_SIZE);
        assert_eq!(list.items()[0].id, 7000);
        assert_eq!(list.page_window(), vec![5, 6, 7, 8, 9]);

        let req = list.select_page(999).unwrap();
        assert_eq!(req.page, 50);
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut list = ListController::new(ListConfig::numbered_pages(), ListSource::NowPlaying);
        let first = list.start();
        list.apply(&first, movies(1, 20));
        let slow = list.select_page(2).unwrap();
        let fast = list.select_page(3).unwrap();
        assert!(list.apply(&fast, movies(3, 20)));
        assert!(!list.apply(&slow, movies(2, 20)));
        assert_eq!(list.cursor().page, 3);
    }

    #[test]
    fn new_query_resets_cursor() {
        let mut list = ListController::new(
            ListConfig::infinite_scroll(),
            ListSource::Search("alien".to_string()),
        );
        let first = list.start();
        list.apply(&first, movies(1, 20));
        list.on_momentum_begin();
        let req = list.on_end_reached().unwrap();
        list.apply(&req, movies(2, 20));

        let req = list.set_query("  heat ");
        assert_eq!(req.page, 1);
        assert_eq!(req.source, ListSource::Search("heat".to_string()));
        assert!(list.items().is_empty());
        assert_eq!(list.cursor().page, 1);
    }

    #[test]
    fn duplicate_ids_are_not_appended_twice() {
        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        list.apply(&first, movies(1, 4));
        list.on_momentum_begin();
        let req = list.on_end_reached().unwrap();
        list.apply(&req, movies(1, 6));
        assert_eq!(list.items().len(), 6);
    }

    #[test]
    fn next_and_previous_stay_in_range() {
        let mut list = ListController::new(ListConfig::numbered_pages(), ListSource::NowPlaying);
        assert!(list.previous_page().is_none());
        let first = list.start();
        let mut page = movies(1, 20);
        page.total_pages = 2;
        list.apply(&first, page);

        let req = list.next_page().unwrap();
        assert_eq!(req.page, 2);
        let mut page = movies(2, 20);
        page.total_pages = 2;
        list.apply(&req, page);
        assert!(list.next_page().is_none());
        assert_eq!(list.previous_page().map(|r| r.page), Some(1));
    }

    struct PagedApi;

    #[async_trait::async_trait]
    impl MovieApi for PagedApi {
        async fn now_playing(&self, page: u32, _: &Scope) -> Result<MoviePage, FetchError> {
            if page > 2 {
                return Err(FetchError::BadResponse {
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(movies(page, 10))
        }
        async fn search_movies(
            &self,
            _query: &str,
            page: u32,
            _: &Scope,
        ) -> Result<MoviePage, FetchError> {
            Ok(movies(page, 10))
        }
        async fn details(
            &self,
            _id: i64,
            _: &Scope,
        ) -> Result<crate::models::MovieDetail, FetchError> {
            Err(FetchError::Cancelled)
        }
        async fn credits(
            &self,
            _id: i64,
            _: &Scope,
        ) -> Result<Vec<crate::models::CastMember>, FetchError> {
            Ok(Vec::new())
        }
        async fn recommendations(
            &self,
            _id: i64,
            _: &Scope,
        ) -> Result<Vec<MovieSummary>, FetchError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn drive_fetches_and_merges() {
        let scope = Scope::new();
        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        list.drive(first, &PagedApi, &scope).await.unwrap();
        list.on_momentum_begin();
        let req = list.on_end_reached().unwrap();
        list.drive(req, &PagedApi, &scope).await.unwrap();

        list.on_momentum_begin();
        let req = list.on_end_reached().unwrap();
        assert!(list.drive(req, &PagedApi, &scope).await.is_err());
        assert!(!list.is_loading());
        assert_eq!(list.items().len(), 20);
        assert_eq!(list.cursor().page, 2);
    }

    #[test]
    fn failed_request_keeps_cursor_and_allows_retry() {
        let mut list = ListController::new(ListConfig::infinite_scroll(), ListSource::NowPlaying);
        let first = list.start();
        list.apply(&first, movies(1, 4));
        list.on_momentum_begin();
        let req = list.on_end_reached().unwrap();
        list.fail(&req);
        assert_eq!(list.cursor().page, 1);
        assert_eq!(list.items().len(), 4);
        assert!(list.last_failed());
        list.on_momentum_begin();
        let retry = list.on_end_reached().unwrap();
        assert_eq!(retry.page, 2);
        list.apply(&retry, movies(2, 4));
        assert!(!list.last_failed());
        assert_eq!(list.items().len(), 8);
    }
}
