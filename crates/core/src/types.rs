use serde::{Deserialize, Serialize};

/// Catalog content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Series,
    Movie,
}

impl ItemType {
    pub const ALL: [ItemType; 2] = [ItemType::Series, ItemType::Movie];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Movie => "movie",
        }
    }

    /// Parse the value used in deep links and persisted `lastDetailType`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "series" => Some(Self::Series),
            "movie" => Some(Self::Movie),
            _ => None,
        }
    }

    /// Parse either the item form (`movie`) or the section form (`movies`).
    /// Route paths accept both.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        Self::parse(s).or_else(|| Section::parse(s).and_then(Section::list_type))
    }

    /// The list section that shows items of this type.
    pub fn section(self) -> Section {
        match self {
            Self::Series => Section::Series,
            Self::Movie => Section::Movies,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level navigation section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Home,
    Series,
    Movies,
    WatchLater,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Home,
        Section::Series,
        Section::Movies,
        Section::WatchLater,
    ];

    /// Section key used in persisted key names (`scrollPosition_<key>`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Series => "series",
            Self::Movies => "movies",
            Self::WatchLater => "watchLater",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Self::Home),
            "series" => Some(Self::Series),
            "movies" => Some(Self::Movies),
            "watchLater" => Some(Self::WatchLater),
            _ => None,
        }
    }

    /// The catalog type listed by this section, if it is a list section.
    pub fn list_type(self) -> Option<ItemType> {
        match self {
            Self::Series => Some(ItemType::Series),
            Self::Movies => Some(ItemType::Movie),
            Self::Home | Self::WatchLater => None,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable reference to a catalog item: `(itemType, itemId)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: String,
}

impl ItemRef {
    pub fn new(item_type: ItemType, id: impl Into<String>) -> Self {
        Self {
            item_type,
            id: id.into(),
        }
    }

    pub fn series(id: impl Into<String>) -> Self {
        Self::new(ItemType::Series, id)
    }

    pub fn movie(id: impl Into<String>) -> Self {
        Self::new(ItemType::Movie, id)
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.item_type, self.id)
    }
}

/// Stable per-video key used for resume positions and watched marks.
///
/// `movie:<movieId>` or `series:<seriesId>:<episodeId>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoKey(String);

impl VideoKey {
    pub fn movie(movie_id: &str) -> Self {
        Self(format!("movie:{movie_id}"))
    }

    pub fn episode(series_id: &str, episode_id: &str) -> Self {
        Self(format!("series:{series_id}:{episode_id}"))
    }

    /// Wrap a raw key as received from a caller or from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the key into the item it belongs to and, for series, the episode id.
    pub fn parts(&self) -> Option<(ItemRef, Option<&str>)> {
        if let Some(id) = self.0.strip_prefix("movie:") {
            return (!id.is_empty()).then(|| (ItemRef::movie(id), None));
        }
        let rest = self.0.strip_prefix("series:")?;
        let (series_id, episode_id) = rest.split_once(':')?;
        if series_id.is_empty() || episode_id.is_empty() {
            return None;
        }
        Some((ItemRef::series(series_id), Some(episode_id)))
    }
}

impl std::fmt::Display for VideoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
