//! Key/value persistence of [`ViewState`].
//!
//! The persisted layout is a flat set of string keys:
//!
//! | key | value |
//! |---|---|
//! | `lastActiveSection` | `home`, `series`, `movies`, `watchLater` |
//! | `lastDetailType` / `lastDetailId` | `series`/`movie` and an item id, both or neither |
//! | `originSection` | section key |
//! | `searchQuery_<series\|movies>` | absent when empty |
//! | `activeGenre_<series\|movies>` | genre, `All` by default |
//! | `scrollPosition_<section>` | integer offset |
//! | `watchLater` | JSON array of `{type, id}` |
//! | `videoProgress` | JSON map of video key to `{currentTime, duration, timestamp}` |
//! | `openedItems` | JSON array of `{type, id}` |
//! | `watchedVideos` | JSON array of video keys |
//!
//! Loading never fails: every key is decoded on its own and falls back to
//! its default when absent or malformed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::ALL_GENRES;
use crate::types::{ItemRef, ItemType, Section, VideoKey};
use crate::view_state::{ResumePosition, SectionFilter, ViewState, WatchLater};

pub const KEY_ACTIVE_SECTION: &str = "lastActiveSection";
pub const KEY_DETAIL_TYPE: &str = "lastDetailType";
pub const KEY_DETAIL_ID: &str = "lastDetailId";
pub const KEY_ORIGIN_SECTION: &str = "originSection";
pub const KEY_WATCH_LATER: &str = "watchLater";
pub const KEY_VIDEO_PROGRESS: &str = "videoProgress";
pub const KEY_OPENED_ITEMS: &str = "openedItems";
pub const KEY_WATCHED_VIDEOS: &str = "watchedVideos";

pub fn search_query_key(item_type: ItemType) -> String {
    format!("searchQuery_{}", item_type.section())
}

pub fn active_genre_key(item_type: ItemType) -> String {
    format!("activeGenre_{}", item_type.section())
}

pub fn scroll_key(section: Section) -> String {
    format!("scrollPosition_{section}")
}

/// Minimal string key/value store, the shape of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// A pending write recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvChange {
    Set(String, String),
    Remove(String),
}

impl KvChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Set(k, _) | Self::Remove(k) => k,
        }
    }
}

/// In-process store that remembers which keys changed since the last
/// [`MemoryStore::take_changes`], so a durable backend can apply only the
/// difference.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    changed: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from durable rows. Seeded entries are not reported as changes.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            changed: BTreeSet::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Drain the changed keys in key order.
    pub fn take_changes(&mut self) -> Vec<KvChange> {
        std::mem::take(&mut self.changed)
            .into_iter()
            .map(|key| match self.entries.get(&key) {
                Some(value) => KvChange::Set(key, value.clone()),
                None => KvChange::Remove(key),
            })
            .collect()
    }

    /// Mark keys as changed again, e.g. after a failed durable write.
    pub fn mark_changed<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        self.changed.extend(keys.into_iter().map(str::to_string));
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        if self.entries.get(key) != Some(&value) {
            self.entries.insert(key.to_string(), value);
            self.changed.insert(key.to_string());
        }
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.changed.insert(key.to_string());
        }
    }
}

/// Persisted form of a resume position.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRecord {
    current_time: f64,
    duration: f64,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
}

/// Reads and writes [`ViewState`] through a [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct ViewStateStore<S> {
    backend: S,
}

impl<S: KeyValueStore> ViewStateStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_inner(self) -> S {
        self.backend
    }

    /// Read the persisted state, defaulting field by field.
    pub fn load(&self) -> ViewState {
        let mut state = ViewState::default();

        if let Some(raw) = self.backend.get(KEY_ACTIVE_SECTION) {
            match Section::parse(&raw) {
                Some(section) => state.active_section = section,
                None => warn!(value = %raw, "ignoring malformed {KEY_ACTIVE_SECTION}"),
            }
        }

        let detail_type = self.backend.get(KEY_DETAIL_TYPE);
        let detail_id = self.backend.get(KEY_DETAIL_ID);
        match (detail_type, detail_id) {
            (Some(t), Some(id)) if !id.is_empty() => match ItemType::parse(&t) {
                Some(item_type) => state.open_detail = Some(ItemRef::new(item_type, id)),
                None => warn!(value = %t, "ignoring malformed {KEY_DETAIL_TYPE}"),
            },
            (None, None) => {}
            _ => warn!("ignoring half-written detail reference"),
        }

        if let Some(raw) = self.backend.get(KEY_ORIGIN_SECTION) {
            state.origin_section = Section::parse(&raw);
            if state.origin_section.is_none() {
                warn!(value = %raw, "ignoring malformed {KEY_ORIGIN_SECTION}");
            }
        }

        for item_type in ItemType::ALL {
            *state.filter_mut(item_type) = self.load_filter(item_type);
        }

        for section in Section::ALL {
            if let Some(offset) = self.load_scroll(section) {
                state.scroll_offsets.insert(section, offset);
            }
        }

        state.watch_later = WatchLater::from_entries(self.load_item_refs(KEY_WATCH_LATER));
        state.opened_items = self.load_item_refs(KEY_OPENED_ITEMS).into_iter().collect();
        state.watched_videos = self.load_watched();
        state.resume_positions = self.load_progress();

        state
    }

    /// Overwrite the persisted state. Keys for absent values are removed.
    pub fn save(&mut self, state: &ViewState) {
        self.backend
            .set(KEY_ACTIVE_SECTION, state.active_section.as_str().to_string());

        match &state.open_detail {
            Some(item) => {
                self.backend
                    .set(KEY_DETAIL_TYPE, item.item_type.as_str().to_string());
                self.backend.set(KEY_DETAIL_ID, item.id.clone());
            }
            None => {
                self.backend.remove(KEY_DETAIL_TYPE);
                self.backend.remove(KEY_DETAIL_ID);
            }
        }

        match state.origin_section {
            Some(section) => self
                .backend
                .set(KEY_ORIGIN_SECTION, section.as_str().to_string()),
            None => self.backend.remove(KEY_ORIGIN_SECTION),
        }

        for item_type in ItemType::ALL {
            let filter = state.filter(item_type);
            let query_key = search_query_key(item_type);
            if filter.search_query.is_empty() {
                self.backend.remove(&query_key);
            } else {
                self.backend.set(&query_key, filter.search_query.clone());
            }
            self.backend
                .set(&active_genre_key(item_type), filter.active_genre.clone());
        }

        for section in Section::ALL {
            let key = scroll_key(section);
            match state.scroll_offsets.get(&section) {
                Some(offset) => self.backend.set(&key, offset.to_string()),
                None => self.backend.remove(&key),
            }
        }

        let watch_later: Vec<&ItemRef> = state.watch_later.iter().collect();
        self.set_json(KEY_WATCH_LATER, &watch_later);
        self.set_json(KEY_OPENED_ITEMS, &state.opened_items);
        self.set_json(KEY_WATCHED_VIDEOS, &state.watched_videos);

        let progress: BTreeMap<&str, ProgressRecord> = state
            .resume_positions
            .iter()
            .map(|(key, pos)| {
                (
                    key.as_str(),
                    ProgressRecord {
                        current_time: pos.position_seconds,
                        duration: pos.duration_seconds,
                        timestamp: pos.updated_at.timestamp_millis(),
                    },
                )
            })
            .collect();
        self.set_json(KEY_VIDEO_PROGRESS, &progress);
    }

    /// Persist only the scroll offsets, for coalesced scroll writes.
    pub fn save_scroll(&mut self, state: &ViewState) {
        for section in Section::ALL {
            let key = scroll_key(section);
            match state.scroll_offsets.get(&section) {
                Some(offset) => self.backend.set(&key, offset.to_string()),
                None => self.backend.remove(&key),
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.backend.set(key, json),
            Err(e) => warn!(key, error = %e, "failed to encode persisted value"),
        }
    }

    fn load_json(&self, key: &str) -> Option<Value> {
        let raw = self.backend.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt persisted json");
                None
            }
        }
    }

    fn load_filter(&self, item_type: ItemType) -> SectionFilter {
        let active_genre = self
            .backend
            .get(&active_genre_key(item_type))
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| ALL_GENRES.to_string());
        let search_query = self
            .backend
            .get(&search_query_key(item_type))
            .unwrap_or_default();
        SectionFilter {
            active_genre,
            search_query,
        }
    }

    fn load_scroll(&self, section: Section) -> Option<u32> {
        let raw = self.backend.get(&scroll_key(section))?;
        // Browsers may report fractional offsets.
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Some(v.round().min(u32::MAX as f64) as u32),
            _ => {
                warn!(section = %section, value = %raw, "ignoring malformed scroll offset");
                None
            }
        }
    }

    fn load_item_refs(&self, key: &str) -> Vec<ItemRef> {
        let Some(value) = self.load_json(key) else {
            return Vec::new();
        };
        let Value::Array(entries) = value else {
            warn!(key, "expected a json array");
            return Vec::new();
        };
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<ItemRef>(entry) {
                Ok(item) if !item.id.is_empty() => Some(item),
                Ok(_) => None,
                Err(e) => {
                    debug!(key, error = %e, "skipping malformed entry");
                    None
                }
            })
            .collect()
    }

    fn load_watched(&self) -> BTreeSet<VideoKey> {
        let Some(Value::Array(entries)) = self.load_json(KEY_WATCHED_VIDEOS) else {
            return BTreeSet::new();
        };
        entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(s) if !s.is_empty() => Some(VideoKey::from_raw(s)),
                _ => None,
            })
            .collect()
    }

    fn load_progress(&self) -> BTreeMap<VideoKey, ResumePosition> {
        let Some(value) = self.load_json(KEY_VIDEO_PROGRESS) else {
            return BTreeMap::new();
        };
        let Value::Object(map) = value else {
            warn!(key = KEY_VIDEO_PROGRESS, "expected a json object");
            return BTreeMap::new();
        };
        map.into_iter()
            .filter_map(|(key, entry)| {
                let record: ProgressRecord = serde_json::from_value(entry).ok()?;
                if !(record.current_time.is_finite() && record.current_time >= 0.0) {
                    return None;
                }
                let updated_at = DateTime::from_timestamp_millis(record.timestamp)?;
                Some((
                    VideoKey::from_raw(key),
                    ResumePosition::new(record.current_time, record.duration, updated_at),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn populated_state() -> ViewState {
        let mut state = ViewState {
            active_section: Section::WatchLater,
            open_detail: Some(ItemRef::series("s1")),
            origin_section: Some(Section::WatchLater),
            ..ViewState::default()
        };
        state.series_filter.active_genre = "Action".into();
        state.movie_filter.search_query = "maze".into();
        state.scroll_offsets.insert(Section::Series, 420);
        state.scroll_offsets.insert(Section::WatchLater, 0);
        state.watch_later.add(ItemRef::series("s2"));
        state.watch_later.add(ItemRef::movie("m1"));
        state.opened_items.insert(ItemRef::series("s1"));
        state.watched_videos.insert(VideoKey::episode("s1", "s1-e1"));
        state.resume_positions.insert(
            VideoKey::movie("m1"),
            ResumePosition::new(45.5, 120.0, Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()),
        );
        state
    }

    #[test]
    fn empty_store_loads_defaults() {
        let store = ViewStateStore::new(MemoryStore::new());
        assert_eq!(store.load(), ViewState::default());
    }

    #[test]
    fn save_then_load_is_a_fixed_point() {
        let mut store = ViewStateStore::new(MemoryStore::new());
        let state = populated_state();
        store.save(&state);
        let loaded = store.load();
        assert_eq!(loaded, state);

        store.backend_mut().take_changes();
        store.save(&loaded);
        assert!(!store.backend().has_changes());
    }

    #[test]
    fn fractional_positions_survive_reload() {
        let mut state = ViewState::default();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        for i in 1..=2000u32 {
            let x = f64::from(i);
            let position = x * 1103.515245 % 7200.0;
            let duration = position + x / 7.0 + 0.1;
            state.resume_positions.insert(
                VideoKey::episode("s1", &format!("e{i}")),
                ResumePosition::new(position, duration, at),
            );
        }

        let mut store = ViewStateStore::new(MemoryStore::new());
        store.save(&state);
        let loaded = store.load();
        for (key, pos) in &state.resume_positions {
            let back = &loaded.resume_positions[key];
            assert_eq!(back.position_seconds.to_bits(), pos.position_seconds.to_bits(), "{key}");
            assert_eq!(back.duration_seconds.to_bits(), pos.duration_seconds.to_bits(), "{key}");
        }

        store.backend_mut().take_changes();
        store.save(&loaded);
        assert!(!store.backend().has_changes());
    }

    #[test]
    fn save_removes_cleared_keys() {
        let mut store = ViewStateStore::new(MemoryStore::new());
        store.save(&populated_state());
        store.save(&ViewState::default());

        let backend = store.backend();
        assert_eq!(backend.get(KEY_DETAIL_TYPE), None);
        assert_eq!(backend.get(KEY_DETAIL_ID), None);
        assert_eq!(backend.get(KEY_ORIGIN_SECTION), None);
        assert_eq!(backend.get("searchQuery_movies"), None);
        assert_eq!(backend.get("scrollPosition_series"), None);
        assert_eq!(backend.get("activeGenre_series").as_deref(), Some("All"));
    }

    #[test]
    fn uses_documented_key_names() {
        let mut store = ViewStateStore::new(MemoryStore::new());
        store.save(&populated_state());
        let backend = store.backend();
        assert_eq!(backend.get("lastActiveSection").as_deref(), Some("watchLater"));
        assert_eq!(backend.get("lastDetailType").as_deref(), Some("series"));
        assert_eq!(backend.get("lastDetailId").as_deref(), Some("s1"));
        assert_eq!(backend.get("activeGenre_series").as_deref(), Some("Action"));
        assert_eq!(backend.get("searchQuery_movies").as_deref(), Some("maze"));
        assert_eq!(backend.get("scrollPosition_series").as_deref(), Some("420"));

        let progress: Value =
            serde_json::from_str(&backend.get("videoProgress").unwrap()).unwrap();
        assert_eq!(progress["movie:m1"]["currentTime"], 45.5);
        assert_eq!(progress["movie:m1"]["duration"], 120.0);
        assert_eq!(progress["movie:m1"]["timestamp"], 1_700_000_000_123i64);

        let watch_later: Value =
            serde_json::from_str(&backend.get("watchLater").unwrap()).unwrap();
        assert_eq!(
            watch_later,
            serde_json::json!([{ "type": "series", "id": "s2" }, { "type": "movie", "id": "m1" }])
        );
    }

    #[test]
    fn malformed_fields_default_individually() {
        let mut backend = MemoryStore::new();
        backend.set(KEY_ACTIVE_SECTION, "movies".into());
        backend.set(KEY_WATCH_LATER, "{not json".into());
        backend.set(
            KEY_VIDEO_PROGRESS,
            r#"{"movie:m1": {"currentTime": 30, "duration": 120, "timestamp": 1700000000000},
                "movie:m2": "garbage"}"#
                .into(),
        );
        backend.set("scrollPosition_movies", "12.6".into());
        backend.set("scrollPosition_series", "-4".into());
        backend.set(KEY_DETAIL_TYPE, "episode".into());
        backend.set(KEY_DETAIL_ID, "x".into());

        let state = ViewStateStore::new(backend).load();
        assert_eq!(state.active_section, Section::Movies);
        assert!(state.watch_later.is_empty());
        assert_eq!(state.resume_positions.len(), 1);
        assert_eq!(state.scroll_offset(Section::Movies), 13);
        assert!(!state.scroll_offsets.contains_key(&Section::Series));
        assert_eq!(state.open_detail, None);
    }

    #[test]
    fn malformed_watch_later_entries_are_skipped() {
        let mut backend = MemoryStore::new();
        backend.set(
            KEY_WATCH_LATER,
            r#"[{"type":"series","id":"s1"}, {"id":"nope"}, 7,
                {"type":"movie","id":"m1"}, {"type":"series","id":"s1"}]"#
                .into(),
        );
        let state = ViewStateStore::new(backend).load();
        let entries: Vec<&ItemRef> = state.watch_later.iter().collect();
        assert_eq!(entries, [&ItemRef::series("s1"), &ItemRef::movie("m1")]);
    }

    #[test]
    fn half_written_detail_is_ignored() {
        let mut backend = MemoryStore::new();
        backend.set(KEY_DETAIL_TYPE, "movie".into());
        assert_eq!(ViewStateStore::new(backend).load().open_detail, None);
    }

    #[test]
    fn memory_store_reports_only_real_changes() {
        let mut store = MemoryStore::from_entries([("a".to_string(), "1".to_string())]);
        assert!(!store.has_changes());
        store.set("a", "1".into());
        store.remove("missing");
        assert!(!store.has_changes());

        store.set("a", "2".into());
        store.set("b", "x".into());
        store.remove("b");
        assert_eq!(
            store.take_changes(),
            vec![KvChange::Set("a".into(), "2".into()), KvChange::Remove("b".into())]
        );
        assert!(!store.has_changes());
    }
}
