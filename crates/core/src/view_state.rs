use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::catalog::{ALL_GENRES, Catalog};
use crate::types::{ItemRef, ItemType, Section, VideoKey};

/// Per-type list filter. Search and genre override each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionFilter {
    pub active_genre: String,
    pub search_query: String,
}

impl Default for SectionFilter {
    fn default() -> Self {
        Self {
            active_genre: ALL_GENRES.to_string(),
            search_query: String::new(),
        }
    }
}

/// Result of a watch-later mutation, surfaced to the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkOutcome {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
    NotFound,
}

/// Insertion-ordered set of bookmarked items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WatchLater(Vec<ItemRef>);

impl WatchLater {
    /// Build from stored entries, keeping the first occurrence of duplicates.
    pub fn from_entries(entries: impl IntoIterator<Item = ItemRef>) -> Self {
        let mut list = Self::default();
        for entry in entries {
            list.add(entry);
        }
        list
    }

    pub fn add(&mut self, item: ItemRef) -> BookmarkOutcome {
        if self.contains(&item) {
            BookmarkOutcome::AlreadyPresent
        } else {
            self.0.push(item);
            BookmarkOutcome::Added
        }
    }

    pub fn remove(&mut self, item: &ItemRef) -> BookmarkOutcome {
        let before = self.0.len();
        self.0.retain(|entry| entry != item);
        if self.0.len() < before {
            BookmarkOutcome::Removed
        } else {
            BookmarkOutcome::NotPresent
        }
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.0.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemRef> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Last known playback offset for a video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePosition {
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

impl ResumePosition {
    /// Timestamps are kept at millisecond precision, the resolution they
    /// are persisted with.
    pub fn new(position_seconds: f64, duration_seconds: f64, updated_at: DateTime<Utc>) -> Self {
        let updated_at =
            DateTime::from_timestamp_millis(updated_at.timestamp_millis()).unwrap_or(updated_at);
        Self {
            position_seconds,
            duration_seconds,
            updated_at,
        }
    }
}

/// Everything persisted about where the user is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub active_section: Section,
    pub open_detail: Option<ItemRef>,
    pub origin_section: Option<Section>,
    pub series_filter: SectionFilter,
    pub movie_filter: SectionFilter,
    pub scroll_offsets: BTreeMap<Section, u32>,
    pub watch_later: WatchLater,
    pub resume_positions: BTreeMap<VideoKey, ResumePosition>,
    pub opened_items: BTreeSet<ItemRef>,
    pub watched_videos: BTreeSet<VideoKey>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            active_section: Section::Home,
            open_detail: None,
            origin_section: None,
            series_filter: SectionFilter::default(),
            movie_filter: SectionFilter::default(),
            scroll_offsets: BTreeMap::new(),
            watch_later: WatchLater::default(),
            resume_positions: BTreeMap::new(),
            opened_items: BTreeSet::new(),
            watched_videos: BTreeSet::new(),
        }
    }
}

impl ViewState {
    pub fn filter(&self, item_type: ItemType) -> &SectionFilter {
        match item_type {
            ItemType::Series => &self.series_filter,
            ItemType::Movie => &self.movie_filter,
        }
    }

    pub fn filter_mut(&mut self, item_type: ItemType) -> &mut SectionFilter {
        match item_type {
            ItemType::Series => &mut self.series_filter,
            ItemType::Movie => &mut self.movie_filter,
        }
    }

    pub fn scroll_offset(&self, section: Section) -> u32 {
        self.scroll_offsets.get(&section).copied().unwrap_or(0)
    }

    /// Drop the navigation part of the state, keeping bookmarks, progress
    /// and opened/watched marks.
    pub fn reset_navigation(&mut self) {
        let keep = std::mem::take(self);
        *self = Self {
            watch_later: keep.watch_later,
            resume_positions: keep.resume_positions,
            opened_items: keep.opened_items,
            watched_videos: keep.watched_videos,
            ..Self::default()
        };
    }
}

/// Drop references the catalog can no longer satisfy.
///
/// A stale detail falls back to its type's list; a genre that no longer
/// occurs resets to "All". Watch-later entries are live references and are
/// kept; missing ones are skipped at render time.
pub fn reconcile(mut state: ViewState, catalog: &Catalog) -> ViewState {
    if let Some(detail) = state.open_detail.take() {
        if catalog.contains(&detail) {
            state.open_detail = Some(detail);
        } else {
            warn!(item = %detail, "persisted detail view refers to a missing item");
            state.active_section = detail.item_type.section();
            state.origin_section = None;
        }
    }

    if state.open_detail.is_none() && state.origin_section.take().is_some() {
        warn!("dropping origin section without an open detail view");
    }

    for item_type in ItemType::ALL {
        let filter = state.filter_mut(item_type);
        if !catalog.has_genre(item_type, &filter.active_genre) {
            warn!(
                item_type = %item_type,
                genre = %filter.active_genre,
                "persisted genre no longer exists, resetting to All"
            );
            filter.active_genre = ALL_GENRES.to_string();
        }
    }

    state
}
