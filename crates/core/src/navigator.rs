//! Navigation state machine.
//!
//! The view the user sees is always derived from [`ViewState`]:
//!
//! ```text
//!            open_section                 open_detail
//!   Home <-----------------> List(type) ---------------> Detail(type, id, origin)
//!     ^                          ^  ^                           |
//!     |                          |  +------- close_detail ------+
//!     +-----> WatchLater --------+---------- open_detail -------+
//! ```
//!
//! The player is an overlay on top of whichever view was current and is
//! not persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{ALL_GENRES, Catalog, CatalogItem, sort_by_title};
use crate::error::NavError;
use crate::types::{ItemRef, ItemType, Section, VideoKey};
use crate::view_state::{BookmarkOutcome, ResumePosition, SectionFilter, ViewState};

/// What is on screen, read from [`ViewState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavView {
    Home,
    List { item_type: ItemType },
    Detail { item: ItemRef, origin: Option<Section> },
    WatchLater,
}

/// Where the presenter should put the scroll position after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "offset", rename_all = "snake_case")]
pub enum ScrollTarget {
    Top,
    Offset(u32),
    Keep,
}

/// Result of a navigation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub view: NavView,
    pub scroll: ScrollTarget,
    /// Set when the requested item was missing and the navigator fell back
    /// to the nearest list.
    pub fallback: bool,
}

/// The open player overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerOverlay {
    pub video_key: VideoKey,
    pub link: String,
    pub resume_from: f64,
    /// A detail view was open when playback started.
    pub return_to_detail: bool,
}

/// Visible items of a list section: search wins over genre, sorted by title.
pub fn visible_items<'a>(
    catalog: &'a Catalog,
    item_type: ItemType,
    filter: &SectionFilter,
) -> Vec<CatalogItem<'a>> {
    let mut items = if !filter.search_query.trim().is_empty() {
        catalog.search(item_type, &filter.search_query)
    } else {
        catalog.by_genre(item_type, &filter.active_genre)
    };
    sort_by_title(&mut items);
    items
}

/// A genre filter button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreButton {
    pub genre: String,
    pub active: bool,
}

/// Genre buttons for a list, recomputed from the catalog on every render.
pub fn genre_buttons(
    catalog: &Catalog,
    item_type: ItemType,
    filter: &SectionFilter,
) -> Vec<GenreButton> {
    catalog
        .genres_of(item_type)
        .into_iter()
        .map(|genre| GenreButton {
            active: genre == filter.active_genre,
            genre,
        })
        .collect()
}

pub struct Navigator {
    catalog: Arc<Catalog>,
    state: ViewState,
    player: Option<PlayerOverlay>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("state", &self.state)
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

impl Navigator {
    /// `state` must already be reconciled against `catalog`.
    pub fn new(catalog: Arc<Catalog>, state: ViewState) -> Self {
        Self {
            catalog,
            state,
            player: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn player(&self) -> Option<&PlayerOverlay> {
        self.player.as_ref()
    }

    pub fn view(&self) -> NavView {
        if let Some(item) = &self.state.open_detail {
            return NavView::Detail {
                item: item.clone(),
                origin: self.state.origin_section,
            };
        }
        match self.state.active_section {
            Section::Home => NavView::Home,
            Section::WatchLater => NavView::WatchLater,
            Section::Series => NavView::List {
                item_type: ItemType::Series,
            },
            Section::Movies => NavView::List {
                item_type: ItemType::Movie,
            },
        }
    }

    fn transition(&self, scroll: ScrollTarget) -> Transition {
        Transition {
            view: self.view(),
            scroll,
            fallback: false,
        }
    }

    fn leave_overlay(&mut self) {
        if let Some(player) = self.player.take() {
            debug!(video = %player.video_key, "player dismissed by navigation");
        }
    }

    fn clear_detail(&mut self) {
        self.state.open_detail = None;
        self.state.origin_section = None;
    }

    pub fn open_section(&mut self, section: Section) -> Transition {
        self.leave_overlay();
        self.clear_detail();
        self.state.active_section = section;
        debug!(section = %section, "open section");

        let scroll = match section {
            Section::WatchLater => ScrollTarget::Offset(self.state.scroll_offset(section)),
            _ => ScrollTarget::Top,
        };
        self.transition(scroll)
    }

    /// Open a detail view. `scroll` is the offset of the view being left,
    /// saved so that closing the detail can restore it.
    pub fn open_detail(
        &mut self,
        item: ItemRef,
        origin: Option<Section>,
        scroll: Option<u32>,
    ) -> Transition {
        self.leave_overlay();

        if self.state.open_detail.is_none() {
            if let Some(offset) = scroll {
                self.state
                    .scroll_offsets
                    .insert(self.state.active_section, offset);
            }
        }

        if !self.catalog.contains(&item) {
            warn!(item = %item, "detail requested for a missing item, showing its list");
            self.clear_detail();
            self.state.active_section = item.item_type.section();
            return Transition {
                fallback: true,
                ..self.transition(ScrollTarget::Top)
            };
        }

        if let Some(origin) = origin {
            self.state.active_section = origin;
        }
        self.state.origin_section = origin;
        self.state.opened_items.insert(item.clone());
        debug!(item = %item, origin = ?origin, "open detail");
        self.state.open_detail = Some(item);
        self.transition(ScrollTarget::Top)
    }

    pub fn close_detail(&mut self) -> Result<Transition, NavError> {
        let item = self.state.open_detail.clone().ok_or(NavError::DetailNotOpen)?;
        self.leave_overlay();

        let target = self
            .state
            .origin_section
            .unwrap_or_else(|| item.item_type.section());
        self.clear_detail();
        self.state.active_section = target;
        debug!(item = %item, target = %target, "close detail");

        Ok(self.transition(ScrollTarget::Offset(self.state.scroll_offset(target))))
    }

    /// Apply a search. Resets the genre to "All"; an empty query shows the
    /// whole list.
    pub fn search(&mut self, item_type: ItemType, query: &str) -> Transition {
        self.leave_overlay();
        self.clear_detail();
        let filter = self.state.filter_mut(item_type);
        filter.search_query = query.trim().to_string();
        filter.active_genre = ALL_GENRES.to_string();
        self.state.active_section = item_type.section();
        debug!(item_type = %item_type, query = %query.trim(), "search");
        self.transition(ScrollTarget::Top)
    }

    /// Apply a genre filter. Clears the search query.
    pub fn set_genre(&mut self, item_type: ItemType, genre: &str) -> Result<Transition, NavError> {
        if !self.catalog.has_genre(item_type, genre) {
            return Err(NavError::UnknownGenre {
                item_type,
                genre: genre.to_string(),
            });
        }
        self.leave_overlay();
        self.clear_detail();
        let filter = self.state.filter_mut(item_type);
        filter.search_query.clear();
        filter.active_genre = genre.to_string();
        self.state.active_section = item_type.section();
        debug!(item_type = %item_type, genre, "set genre");
        Ok(self.transition(ScrollTarget::Top))
    }

    pub fn add_watch_later(&mut self, item: ItemRef) -> BookmarkOutcome {
        if !self.catalog.contains(&item) {
            warn!(item = %item, "cannot bookmark a missing item");
            return BookmarkOutcome::NotFound;
        }
        let outcome = self.state.watch_later.add(item.clone());
        info!(item = %item, outcome = ?outcome, "watch later add");
        outcome
    }

    /// Remove a bookmark. Works for entries whose item has left the catalog.
    pub fn remove_watch_later(&mut self, item: &ItemRef) -> BookmarkOutcome {
        let outcome = self.state.watch_later.remove(item);
        info!(item = %item, outcome = ?outcome, "watch later remove");
        outcome
    }

    /// Open the player overlay, resuming from the saved position if any.
    pub fn play_video(&mut self, video_key: VideoKey, link: &str) -> &PlayerOverlay {
        let resume_from = self
            .state
            .resume_positions
            .get(&video_key)
            .map(|p| p.position_seconds)
            .unwrap_or(0.0);
        info!(video = %video_key, resume_from, "play");
        self.player.insert(PlayerOverlay {
            video_key,
            link: link.trim().to_string(),
            resume_from,
            return_to_detail: self.state.open_detail.is_some(),
        })
    }

    /// Upsert a resume position, last write wins. Returns `false` for
    /// values that cannot be a playback position.
    pub fn record_progress(
        &mut self,
        video_key: VideoKey,
        position_seconds: f64,
        duration_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<bool, NavError> {
        if self.player.is_none() {
            return Err(NavError::PlayerNotOpen);
        }
        if !(position_seconds.is_finite() && position_seconds >= 0.0)
            || !(duration_seconds.is_finite() && duration_seconds > 0.0)
        {
            debug!(video = %video_key, position_seconds, duration_seconds, "ignoring invalid progress");
            return Ok(false);
        }
        self.state.resume_positions.insert(
            video_key,
            ResumePosition::new(position_seconds, duration_seconds, now),
        );
        Ok(true)
    }

    /// Close the player and mark its video watched.
    pub fn close_player(&mut self) -> Result<Transition, NavError> {
        let player = self.player.take().ok_or(NavError::PlayerNotOpen)?;
        self.state.watched_videos.insert(player.video_key.clone());
        debug!(video = %player.video_key, "close player");

        if player.return_to_detail && self.state.open_detail.is_some() {
            return Ok(self.transition(ScrollTarget::Keep));
        }
        let section = self.state.active_section;
        Ok(self.transition(ScrollTarget::Offset(self.state.scroll_offset(section))))
    }

    /// Record the scroll offset of a section.
    pub fn set_scroll(&mut self, section: Section, offset: u32) {
        self.state.scroll_offsets.insert(section, offset);
    }

    /// Replace the whole state, e.g. when a deep link resets navigation.
    pub fn replace_state(&mut self, state: ViewState) {
        self.player = None;
        self.state = state;
    }

    pub fn visible_items(&self, item_type: ItemType) -> Vec<CatalogItem<'_>> {
        visible_items(&self.catalog, item_type, self.state.filter(item_type))
    }

    pub fn genre_buttons(&self, item_type: ItemType) -> Vec<GenreButton> {
        genre_buttons(&self.catalog, item_type, self.state.filter(item_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::fixture;

    fn nav() -> Navigator {
        Navigator::new(Arc::new(fixture()), ViewState::default())
    }

    fn titles(items: Vec<CatalogItem<'_>>) -> Vec<&str> {
        items.into_iter().map(|i| i.title()).collect()
    }

    #[test]
    fn starts_at_home() {
        assert_eq!(nav().view(), NavView::Home);
    }

    #[test]
    fn series_list_is_alphabetical_with_all_active() {
        let mut nav = nav();
        let t = nav.open_section(Section::Series);
        assert_eq!(t.view, NavView::List { item_type: ItemType::Series });
        assert_eq!(titles(nav.visible_items(ItemType::Series)), ["Alpha", "Zeta"]);

        let buttons = nav.genre_buttons(ItemType::Series);
        let labels: Vec<&str> = buttons.iter().map(|b| b.genre.as_str()).collect();
        assert_eq!(labels, ["All", "Action", "Comedy"]);
        assert!(buttons[0].active);
        assert!(buttons[1..].iter().all(|b| !b.active));
    }

    #[test]
    fn genre_filter_then_bookmark_round_trip() {
        let mut nav = nav();
        nav.set_genre(ItemType::Series, "Action").unwrap();
        assert_eq!(titles(nav.visible_items(ItemType::Series)), ["Zeta"]);

        assert_eq!(nav.add_watch_later(ItemRef::series("s2")), BookmarkOutcome::Added);
        let entries: Vec<&ItemRef> = nav.state().watch_later.iter().collect();
        assert_eq!(entries, [&ItemRef::series("s2")]);

        assert_eq!(
            nav.remove_watch_later(&ItemRef::series("s2")),
            BookmarkOutcome::Removed
        );
        assert!(nav.state().watch_later.is_empty());
    }

    #[test]
    fn empty_search_clears_genre_filter() {
        let mut nav = nav();
        nav.set_genre(ItemType::Series, "Action").unwrap();
        nav.search(ItemType::Series, "");
        assert_eq!(nav.state().series_filter.active_genre, "All");
        assert_eq!(titles(nav.visible_items(ItemType::Series)), ["Alpha", "Zeta"]);
    }

    #[test]
    fn genre_after_search_clears_query() {
        let mut nav = nav();
        nav.search(ItemType::Movie, "  maze ");
        assert_eq!(nav.state().movie_filter.search_query, "maze");
        assert_eq!(titles(nav.visible_items(ItemType::Movie)), ["the maze runner"]);

        nav.set_genre(ItemType::Movie, "Romance").unwrap();
        assert_eq!(nav.state().movie_filter.search_query, "");
        assert_eq!(titles(nav.visible_items(ItemType::Movie)), ["Your Name"]);
    }

    #[test]
    fn unknown_genre_is_refused() {
        let mut nav = nav();
        nav.open_section(Section::Series);
        let before = nav.state().clone();
        let err = nav.set_genre(ItemType::Series, "Romance").unwrap_err();
        assert!(matches!(err, NavError::UnknownGenre { .. }));
        assert_eq!(nav.state(), &before);
    }

    #[test]
    fn bookmarking_twice_reports_already_present() {
        let mut nav = nav();
        assert_eq!(nav.add_watch_later(ItemRef::movie("m1")), BookmarkOutcome::Added);
        let once = nav.state().watch_later.clone();
        assert_eq!(
            nav.add_watch_later(ItemRef::movie("m1")),
            BookmarkOutcome::AlreadyPresent
        );
        assert_eq!(nav.state().watch_later, once);
        assert_eq!(nav.add_watch_later(ItemRef::movie("nope")), BookmarkOutcome::NotFound);
    }

    #[test]
    fn detail_from_list_returns_to_list_with_scroll() {
        let mut nav = nav();
        nav.open_section(Section::Series);
        let t = nav.open_detail(ItemRef::series("s1"), None, Some(640));
        assert_eq!(
            t.view,
            NavView::Detail { item: ItemRef::series("s1"), origin: None }
        );
        assert!(nav.state().opened_items.contains(&ItemRef::series("s1")));

        let t = nav.close_detail().unwrap();
        assert_eq!(t.view, NavView::List { item_type: ItemType::Series });
        assert_eq!(t.scroll, ScrollTarget::Offset(640));
        assert_eq!(nav.state().open_detail, None);
    }

    #[test]
    fn detail_from_watch_later_returns_there() {
        let mut nav = nav();
        nav.add_watch_later(ItemRef::movie("m1"));
        nav.open_section(Section::WatchLater);
        nav.open_detail(ItemRef::movie("m1"), Some(Section::WatchLater), Some(90));
        assert_eq!(nav.state().active_section, Section::WatchLater);

        let t = nav.close_detail().unwrap();
        assert_eq!(t.view, NavView::WatchLater);
        assert_eq!(t.scroll, ScrollTarget::Offset(90));
    }

    #[test]
    fn detail_for_missing_item_falls_back_to_list() {
        let mut nav = nav();
        let t = nav.open_detail(ItemRef::movie("m9"), None, None);
        assert!(t.fallback);
        assert_eq!(t.view, NavView::List { item_type: ItemType::Movie });
        assert_eq!(nav.state().open_detail, None);
    }

    #[test]
    fn close_detail_without_detail_is_an_error() {
        assert_eq!(nav().close_detail().unwrap_err(), NavError::DetailNotOpen);
    }

    #[test]
    fn progress_is_last_write_wins() {
        let mut nav = nav();
        let key = VideoKey::movie("m1");
        nav.play_video(key.clone(), "https://v.example/yn");
        let now = Utc::now();
        assert!(nav.record_progress(key.clone(), 30.0, 120.0, now).unwrap());
        assert!(nav.record_progress(key.clone(), 45.0, 120.0, now).unwrap());
        assert_eq!(nav.state().resume_positions[&key].position_seconds, 45.0);

        assert!(nav.record_progress(key.clone(), 10.0, 120.0, now).unwrap());
        assert_eq!(nav.state().resume_positions[&key].position_seconds, 10.0);
    }

    #[test]
    fn progress_requires_player_and_valid_numbers() {
        let mut nav = nav();
        let key = VideoKey::movie("m1");
        assert_eq!(
            nav.record_progress(key.clone(), 1.0, 2.0, Utc::now()),
            Err(NavError::PlayerNotOpen)
        );
        nav.play_video(key.clone(), "l");
        assert_eq!(nav.record_progress(key.clone(), f64::NAN, 2.0, Utc::now()), Ok(false));
        assert_eq!(nav.record_progress(key.clone(), 1.0, 0.0, Utc::now()), Ok(false));
        assert!(nav.state().resume_positions.is_empty());
    }

    #[test]
    fn play_resumes_from_saved_position() {
        let mut nav = nav();
        let key = VideoKey::episode("s1", "s1-e1");
        assert_eq!(nav.play_video(key.clone(), "l").resume_from, 0.0);
        nav.record_progress(key.clone(), 75.0, 1400.0, Utc::now()).unwrap();
        nav.close_player().unwrap();
        assert_eq!(nav.play_video(key, " l ").resume_from, 75.0);
        assert_eq!(nav.player().unwrap().link, "l");
    }

    #[test]
    fn closing_player_returns_to_detail_and_marks_watched() {
        let mut nav = nav();
        nav.open_section(Section::Series);
        nav.open_detail(ItemRef::series("s1"), None, Some(10));
        let key = VideoKey::episode("s1", "s1-e2");
        nav.play_video(key.clone(), "https://v.example/z2");

        let t = nav.close_player().unwrap();
        assert_eq!(t.scroll, ScrollTarget::Keep);
        assert!(matches!(t.view, NavView::Detail { .. }));
        assert!(nav.state().watched_videos.contains(&key));
        assert!(nav.player().is_none());
        assert_eq!(nav.close_player().unwrap_err(), NavError::PlayerNotOpen);
    }

    #[test]
    fn closing_player_without_detail_restores_section_scroll() {
        let mut nav = nav();
        nav.open_section(Section::Movies);
        nav.set_scroll(Section::Movies, 250);
        nav.play_video(VideoKey::movie("m2"), "l");
        let t = nav.close_player().unwrap();
        assert_eq!(t.view, NavView::List { item_type: ItemType::Movie });
        assert_eq!(t.scroll, ScrollTarget::Offset(250));
    }

    #[test]
    fn navigation_dismisses_player() {
        let mut nav = nav();
        nav.play_video(VideoKey::movie("m1"), "l");
        nav.open_section(Section::Movies);
        assert!(nav.player().is_none());
    }
}
