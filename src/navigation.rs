//! Screen stack.
//!
//! `Home` is the root and is never popped. `Details` may sit on top of
//! another `Details` (opening a recommendation). Popping a screen cancels its
//! scope, so fetches it started cannot land in retired state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::favorites::FavoritesStore;
use crate::listing::{ListConfig, ListController, ListSource};
use crate::screens::{DetailScreen, Load, Screen, ScreenState};
use crate::toggle::FavoriteToggle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Search,
    WatchList,
    Details(i64),
}

#[derive(Debug)]
pub struct Navigator {
    stack: Vec<Screen>,
    next_id: u64,
    home_list: ListConfig,
    search_list: ListConfig,
}

impl Navigator {
    /// Creates the stack with its root `Home` screen and the load that fills it.
    pub fn new(
        home_list: ListConfig,
        search_list: ListConfig,
        favorites: &FavoritesStore,
    ) -> (Self, Option<Load>) {
        let mut nav = Self {
            stack: Vec::new(),
            next_id: 0,
            home_list,
            search_list,
        };
        let mut home = nav.build(Route::Home, favorites);
        let load = home.initial_load();
        nav.stack.push(home);
        (nav, load)
    }

    pub fn current(&self) -> &Screen {
        // The stack always holds the root.
        &self.stack[self.stack.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut Screen {
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.stack.iter().map(|s| s.route).collect()
    }

    /// Live screen by id; `None` once it has been popped.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Screen> {
        self.stack.iter_mut().find(|s| s.id == id)
    }

    /// Opens `route`. Navigating to `Home` unwinds to the root instead of stacking.
    pub fn push(&mut self, route: Route, favorites: &FavoritesStore) -> Option<Load> {
        if route == Route::Home {
            while self.stack.len() > 1 {
                self.pop();
            }
            return self.current_mut().focus();
        }
        let mut screen = self.build(route, favorites);
        let load = screen.initial_load();
        debug!(screen = screen.id, route = ?route, "screen pushed");
        self.stack.push(screen);
        load
    }

    /// Pops the top screen unless it is the root, then focuses the new top.
    /// At the root this only re-focuses, which retries a failed home list.
    pub fn back(&mut self) -> Option<Load> {
        if self.stack.len() > 1 {
            self.pop();
        } else {
            debug!("back requested at root");
        }
        self.current_mut().focus()
    }

    fn pop(&mut self) {
        if let Some(screen) = self.stack.pop() {
            screen.scope.cancel();
            debug!(screen = screen.id, route = ?screen.route, "screen torn down");
        }
    }

    fn build(&mut self, route: Route, favorites: &FavoritesStore) -> Screen {
        self.next_id += 1;
        let state = match route {
            Route::Home => {
                ScreenState::List(ListController::new(self.home_list, ListSource::NowPlaying))
            }
            Route::Search => ScreenState::List(ListController::new(
                self.search_list,
                ListSource::Search(String::new()),
            )),
            Route::WatchList => ScreenState::WatchList,
            Route::Details(movie_id) => ScreenState::Details(Box::new(DetailScreen {
                movie_id,
                toggle: FavoriteToggle::new(movie_id, favorites),
                loaded: None,
            })),
        };
        Screen::new(self.next_id, route, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::MemoryStore;
    use std::sync::Arc;

    async fn navigator() -> (Navigator, FavoritesStore) {
        let store = FavoritesStore::load(Arc::new(MemoryStore::new())).await;
        let (nav, load) = Navigator::new(
            ListConfig::infinite_scroll(),
            ListConfig::infinite_scroll().with_favorite_badge(true),
            &store,
        );
        assert!(matches!(load, Some(Load::Page(_))));
        (nav, store)
    }

    #[tokio::test]
    async fn details_can_stack_recursively() {
        let (mut nav, store) = navigator().await;
        assert_eq!(nav.push(Route::Details(1), &store), Some(Load::Details(1)));
        assert_eq!(nav.push(Route::Details(2), &store), Some(Load::Details(2)));
        assert_eq!(
            nav.routes(),
            vec![Route::Home, Route::Details(1), Route::Details(2)]
        );
    }

    #[tokio::test]
    async fn back_cancels_popped_scope_and_keeps_root() {
        let (mut nav, store) = navigator().await;
        nav.push(Route::Details(1), &store);
        let scope = nav.current().scope.clone();
        let id = nav.current().id;

        assert!(nav.back().is_none());
        assert!(scope.is_cancelled());
        assert!(nav.get_mut(id).is_none());
        assert!(nav.back().is_none());
        assert_eq!(nav.depth(), 1);
    }

    #[tokio::test]
    async fn back_at_root_retries_failed_home() {
        let (mut nav, _store) = navigator().await;
        nav.current_mut().error = Some("Failed to load movies.".to_string());
        match nav.back() {
            Some(Load::Page(request)) => assert_eq!(request.page, 1),
            other => panic!("expected a page reload, got {other:?}"),
        }
        assert!(nav.current().error.is_none());
        assert!(nav.back().is_none());
    }

    #[tokio::test]
    async fn home_unwinds_to_root() {
        let (mut nav, store) = navigator().await;
        nav.push(Route::Search, &store);
        nav.push(Route::Details(3), &store);
        let scopes: Vec<_> = vec![nav.current().scope.clone()];
        assert!(nav.push(Route::Home, &store).is_none());
        assert_eq!(nav.routes(), vec![Route::Home]);
        assert!(scopes.iter().all(|s| s.is_cancelled()));
    }

    #[test]
    fn routes_use_snake_case_json() {
        let route: Route = serde_json::from_str(r#"{"details": 550}"#).unwrap();
        assert_eq!(route, Route::Details(550));
        let route: Route = serde_json::from_str(r#""watch_list""#).unwrap();
        assert_eq!(route, Route::WatchList);
    }
}
