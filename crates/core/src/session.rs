//! A browsing session: navigator + persistence + debounced UI work.
//!
//! Every navigation action is persisted before it returns. Scroll offsets
//! are coalesced and written by [`Session::tick`], or earlier when any
//! other action saves the whole state. [`Session::unload`] flushes
//! whatever is pending.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::catalog::{Catalog, DEFAULT_SUGGESTION_LIMIT, Suggestion};
use crate::debounce::{
    DEFAULT_SCROLL_COALESCE, DEFAULT_SUGGESTION_DELAY, Debouncer, MAX_SCROLL_COALESCE,
};
use crate::deep_link::{DeepLink, bootstrap};
use crate::error::NavError;
use crate::navigator::{Navigator, PlayerOverlay, Transition};
use crate::projection::{Screen, project};
use crate::store::{KeyValueStore, ViewStateStore};
use crate::types::{ItemRef, ItemType, Section, VideoKey};
use crate::view_state::{BookmarkOutcome, ViewState};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Clamped to [`MAX_SCROLL_COALESCE`].
    pub scroll_coalesce: Duration,
    pub suggestion_delay: Duration,
    pub suggestion_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scroll_coalesce: DEFAULT_SCROLL_COALESCE,
            suggestion_delay: DEFAULT_SUGGESTION_DELAY,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

/// Suggestions that became due during a [`Session::tick`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionUpdate {
    pub item_type: ItemType,
    pub query: String,
    pub suggestions: Vec<Suggestion>,
}

/// Progress notification posted by the embedded player.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerMessage {
    current_time: f64,
    duration: f64,
}

#[derive(Debug)]
pub struct Session<S> {
    navigator: Navigator,
    store: ViewStateStore<S>,
    scroll: Debouncer<()>,
    suggestions: Debouncer<(ItemType, String)>,
    settled: Option<SuggestionUpdate>,
    suggestion_limit: usize,
}

impl<S: KeyValueStore> Session<S> {
    /// Load, reconcile (or apply the deep link) and persist the result.
    pub fn start(
        catalog: Arc<Catalog>,
        backend: S,
        deep_link: Option<&DeepLink>,
        config: SessionConfig,
    ) -> Self {
        let store = ViewStateStore::new(backend);
        let state = bootstrap(store.load(), &catalog, deep_link);
        let mut session = Self {
            navigator: Navigator::new(catalog, state),
            store,
            scroll: Debouncer::window(config.scroll_coalesce.min(MAX_SCROLL_COALESCE)),
            suggestions: Debouncer::trailing(config.suggestion_delay),
            settled: None,
            suggestion_limit: config.suggestion_limit,
        };
        session.persist();
        session
    }

    /// Re-run bootstrap against the current persisted state, as a page
    /// load with the given deep link would.
    pub fn restart(&mut self, deep_link: Option<&DeepLink>) {
        self.unload();
        let state = bootstrap(
            self.navigator.state().clone(),
            self.navigator.catalog(),
            deep_link,
        );
        self.navigator.replace_state(state);
        self.hide_suggestions();
        self.persist();
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn state(&self) -> &ViewState {
        self.navigator.state()
    }

    pub fn catalog(&self) -> &Catalog {
        self.navigator.catalog()
    }

    pub fn store(&self) -> &ViewStateStore<S> {
        &self.store
    }

    pub fn backend_mut(&mut self) -> &mut S {
        self.store.backend_mut()
    }

    pub fn screen(&self) -> Screen {
        project(
            self.navigator.state(),
            self.navigator.catalog(),
            self.navigator.player(),
        )
    }

    /// Write the whole state. Any coalesced scroll offset goes with it.
    fn persist(&mut self) {
        self.scroll.cancel();
        self.store.save(self.navigator.state());
    }

    pub fn open_section(&mut self, section: Section) -> Transition {
        let t = self.navigator.open_section(section);
        self.persist();
        t
    }

    pub fn open_detail(
        &mut self,
        item: ItemRef,
        origin: Option<Section>,
        scroll: Option<u32>,
    ) -> Transition {
        let t = self.navigator.open_detail(item, origin, scroll);
        self.persist();
        t
    }

    pub fn close_detail(&mut self) -> Result<Transition, NavError> {
        let t = self.navigator.close_detail()?;
        self.persist();
        Ok(t)
    }

    pub fn search(&mut self, item_type: ItemType, query: &str) -> Transition {
        self.hide_suggestions();
        let t = self.navigator.search(item_type, query);
        self.persist();
        t
    }

    pub fn set_genre(&mut self, item_type: ItemType, genre: &str) -> Result<Transition, NavError> {
        let t = self.navigator.set_genre(item_type, genre)?;
        self.persist();
        Ok(t)
    }

    pub fn add_watch_later(&mut self, item: ItemRef) -> BookmarkOutcome {
        let outcome = self.navigator.add_watch_later(item);
        if outcome == BookmarkOutcome::Added {
            self.persist();
        }
        outcome
    }

    pub fn remove_watch_later(&mut self, item: &ItemRef) -> BookmarkOutcome {
        let outcome = self.navigator.remove_watch_later(item);
        if outcome == BookmarkOutcome::Removed {
            self.persist();
        }
        outcome
    }

    /// Open the player for a catalog video; `None` when the key does not resolve.
    pub fn play(&mut self, video_key: VideoKey) -> Option<PlayerOverlay> {
        let link = self
            .navigator
            .catalog()
            .resolve_video(&video_key)
            .map(|(_, link)| link.to_string())?;
        Some(self.play_link(video_key, &link))
    }

    /// Open the player for an arbitrary embed link.
    pub fn play_link(&mut self, video_key: VideoKey, link: &str) -> PlayerOverlay {
        let overlay = self.navigator.play_video(video_key, link).clone();
        self.persist();
        overlay
    }

    pub fn record_progress(
        &mut self,
        video_key: VideoKey,
        position_seconds: f64,
        duration_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<bool, NavError> {
        let applied =
            self.navigator
                .record_progress(video_key, position_seconds, duration_seconds, now)?;
        if applied {
            self.persist();
        }
        Ok(applied)
    }

    /// Apply a raw message from the player channel. Anything that is not a
    /// well-formed progress notification for an open player is ignored.
    pub fn player_message(&mut self, message: &Value, now: DateTime<Utc>) -> bool {
        let Some(video_key) = self.navigator.player().map(|p| p.video_key.clone()) else {
            debug!("player message with no open player");
            return false;
        };
        let Ok(msg) = PlayerMessage::deserialize(message) else {
            debug!("ignoring unrelated player message");
            return false;
        };
        self.record_progress(video_key, msg.current_time, msg.duration, now)
            .unwrap_or(false)
    }

    pub fn close_player(&mut self) -> Result<Transition, NavError> {
        let t = self.navigator.close_player()?;
        self.persist();
        Ok(t)
    }

    /// Record a scroll offset; persisted within the coalescing window.
    pub fn record_scroll(&mut self, section: Section, offset: u32, now: Instant) {
        self.navigator.set_scroll(section, offset);
        self.scroll.push((), now);
    }

    /// Feed raw search input. An empty query hides suggestions at once;
    /// otherwise they are computed once the input settles.
    pub fn suggestion_input(&mut self, item_type: ItemType, query: &str, now: Instant) {
        let query = query.trim();
        if query.is_empty() {
            self.hide_suggestions();
        } else {
            self.suggestions.push((item_type, query.to_string()), now);
        }
    }

    fn hide_suggestions(&mut self) {
        self.suggestions.cancel();
        self.settled = None;
    }

    /// The most recent suggestions whose input has settled.
    pub fn settled_suggestions(&self) -> Option<&SuggestionUpdate> {
        self.settled.as_ref()
    }

    pub fn has_pending_suggestions(&self) -> bool {
        self.suggestions.is_pending()
    }

    /// Suggestions for a query right now, bypassing the debounce.
    pub fn suggest(&self, item_type: ItemType, query: &str) -> Vec<Suggestion> {
        self.navigator
            .catalog()
            .suggest(item_type, query, self.suggestion_limit)
    }

    /// Perform the writes and refreshes whose deadlines have passed.
    pub fn tick(&mut self, now: Instant) -> Option<SuggestionUpdate> {
        if self.scroll.poll(now).is_some() {
            self.store.save_scroll(self.navigator.state());
        }
        let (item_type, query) = self.suggestions.poll(now)?;
        let update = SuggestionUpdate {
            suggestions: self.suggest(item_type, &query),
            item_type,
            query,
        };
        self.settled = Some(update.clone());
        Some(update)
    }

    /// Earliest pending deadline, for scheduling the next tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.scroll.deadline(), self.suggestions.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.scroll.is_pending()
    }

    /// Page unload: nothing pending may be lost.
    pub fn unload(&mut self) {
        if self.scroll.flush().is_some() {
            self.store.save_scroll(self.navigator.state());
        }
    }
}
