use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::favorites::{FavoriteIds, FavoritesStore};
use crate::models::FavoriteEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteState {
    Unknown,
    Favorited,
    NotFavorited,
}

impl FavoriteState {
    fn from_ids(ids: &FavoriteIds, movie_id: i64) -> Self {
        if ids.contains(&movie_id) {
            FavoriteState::Favorited
        } else {
            FavoriteState::NotFavorited
        }
    }
}

/// Favorite indicator for one movie on one screen.
///
/// Starts `Unknown` and resolves on the first [`FavoriteToggle::refresh`].
/// After that it follows the store subscription, so a toggle made on any
/// screen shows up here without waiting for a re-focus.
#[derive(Debug)]
pub struct FavoriteToggle {
    movie_id: i64,
    state: FavoriteState,
    rx: watch::Receiver<FavoriteIds>,
}

impl FavoriteToggle {
    pub fn new(movie_id: i64, store: &FavoritesStore) -> Self {
        Self {
            movie_id,
            state: FavoriteState::Unknown,
            rx: store.subscribe(),
        }
    }

    /// Re-checks membership; called when the owning screen gains focus.
    pub fn refresh(&mut self) -> FavoriteState {
        self.state = FavoriteState::from_ids(&self.rx.borrow_and_update(), self.movie_id);
        self.state
    }

    pub fn state(&mut self) -> FavoriteState {
        if self.state != FavoriteState::Unknown && self.rx.has_changed().unwrap_or(false) {
            return self.refresh();
        }
        self.state
    }

    /// Flips the indicator immediately and returns the store change that
    /// records it. The caller applies the change once it holds no screen state.
    pub fn flip(&mut self, entry: FavoriteEntry) -> FavoriteChange {
        let current = match self.state() {
            FavoriteState::Unknown => self.refresh(),
            known => known,
        };
        self.state = match current {
            FavoriteState::Favorited => FavoriteState::NotFavorited,
            _ => FavoriteState::Favorited,
        };
        debug!(movie_id = self.movie_id, state = ?self.state, "favorite toggled");
        match self.state {
            FavoriteState::Favorited => FavoriteChange::Add(entry),
            _ => FavoriteChange::Remove(self.movie_id),
        }
    }
}

/// Pending favorites mutation produced by [`FavoriteToggle::flip`].
#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteChange {
    Add(FavoriteEntry),
    Remove(i64),
}

impl FavoriteChange {
    /// Applies the change; storage failures are logged by the store, never reverted.
    pub async fn apply(self, store: &FavoritesStore) -> bool {
        match self {
            FavoriteChange::Add(entry) => store.add(entry).await,
            FavoriteChange::Remove(id) => store.remove(id).await,
        }
    }
}
