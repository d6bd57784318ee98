//! Immutable-for-session collection of series and movies.
//!
//! Items are stored in one arena per type and indexed by their stable id.
//! Positions in the arena are never exposed; every cross-view reference
//! uses [`ItemRef`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;
use std::path::Path;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::types::{ItemRef, ItemType, VideoKey};

/// Synthetic genre that matches every item.
pub const ALL_GENRES: &str = "All";

/// Default number of entries returned by [`Catalog::suggest`].
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// Display fields shared by series and movies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(flatten)]
    pub info: ItemInfo,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(flatten)]
    pub info: ItemInfo,
    pub link: String,
}

/// Borrowed view of either kind of catalog item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatalogItem<'a> {
    Series(&'a Series),
    Movie(&'a Movie),
}

impl<'a> CatalogItem<'a> {
    pub fn info(&self) -> &'a ItemInfo {
        match *self {
            Self::Series(s) => &s.info,
            Self::Movie(m) => &m.info,
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            Self::Series(_) => ItemType::Series,
            Self::Movie(_) => ItemType::Movie,
        }
    }

    pub fn id(&self) -> &'a str {
        &self.info().id
    }

    pub fn title(&self) -> &'a str {
        &self.info().title
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.item_type(), self.id())
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        self.info().genres.iter().any(|g| g == genre)
    }

    /// Case-insensitive match against title, description or any genre.
    /// `needle` must already be lowercase.
    fn matches_text(&self, needle: &str) -> bool {
        let info = self.info();
        info.title.to_lowercase().contains(needle)
            || info.description.to_lowercase().contains(needle)
            || info.genres.iter().any(|g| g.to_lowercase().contains(needle))
    }
}

/// A single suggestion with the byte ranges of `title` that matched the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub highlights: Vec<Range<usize>>,
}

// ---------------------------------------------------------------------------
// On-disk format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    series: Vec<SeriesRecord>,
    #[serde(default)]
    movies: Vec<Movie>,
}

#[derive(Deserialize)]
struct SeriesRecord {
    #[serde(flatten)]
    info: ItemInfo,
    #[serde(default)]
    episodes: Vec<EpisodeRecord>,
}

#[derive(Deserialize)]
struct EpisodeRecord {
    #[serde(default)]
    id: Option<String>,
    title: String,
    link: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    series: Vec<Series>,
    movies: Vec<Movie>,
    series_index: HashMap<String, usize>,
    movie_index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from already-parsed records, validating ids.
    ///
    /// Series ids may not contain `:` since episode video keys are
    /// `series:<seriesId>:<episodeId>`. Movie and episode ids may.
    pub fn new(series: Vec<Series>, movies: Vec<Movie>) -> Result<Self, CatalogError> {
        let series: Vec<Series> = series.into_iter().map(normalize_series).collect();
        let movies: Vec<Movie> = movies.into_iter().map(normalize_movie).collect();

        let series_index = build_index(ItemType::Series, series.iter().map(|s| &s.info))?;
        let movie_index = build_index(ItemType::Movie, movies.iter().map(|m| &m.info))?;

        for s in &series {
            if s.info.id.contains(':') {
                return Err(CatalogError::ColonInSeriesId {
                    id: s.info.id.clone(),
                });
            }
            let mut seen = HashSet::new();
            for ep in &s.episodes {
                if !seen.insert(ep.id.as_str()) {
                    return Err(CatalogError::DuplicateEpisodeId {
                        series_id: s.info.id.clone(),
                        episode_id: ep.id.clone(),
                    });
                }
            }
        }

        Ok(Self {
            series,
            movies,
            series_index,
            movie_index,
        })
    }

    /// Parse the static catalog JSON document.
    ///
    /// Episodes without an explicit id get `<seriesId>-e<ordinal>`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let series = file
            .series
            .into_iter()
            .map(|record| {
                let series_id = record.info.id.trim().to_string();
                let episodes = record
                    .episodes
                    .into_iter()
                    .enumerate()
                    .map(|(i, ep)| Episode {
                        id: ep
                            .id
                            .filter(|id| !id.trim().is_empty())
                            .unwrap_or_else(|| format!("{series_id}-e{}", i + 1)),
                        title: ep.title,
                        link: ep.link,
                    })
                    .collect();
                Series {
                    info: record.info,
                    episodes,
                }
            })
            .collect();
        Self::new(series, file.movies)
    }

    /// Read and parse a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            series = catalog.series.len(),
            movies = catalog.movies.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn len(&self, item_type: ItemType) -> usize {
        match item_type {
            ItemType::Series => self.series.len(),
            ItemType::Movie => self.movies.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.movies.is_empty()
    }

    pub fn series(&self, id: &str) -> Option<&Series> {
        self.series_index.get(id).map(|&i| &self.series[i])
    }

    pub fn movie(&self, id: &str) -> Option<&Movie> {
        self.movie_index.get(id).map(|&i| &self.movies[i])
    }

    /// Look up an item. `None` is the normal not-found result.
    pub fn get(&self, item_type: ItemType, id: &str) -> Option<CatalogItem<'_>> {
        match item_type {
            ItemType::Series => self.series(id).map(CatalogItem::Series),
            ItemType::Movie => self.movie(id).map(CatalogItem::Movie),
        }
    }

    pub fn get_ref(&self, item: &ItemRef) -> Option<CatalogItem<'_>> {
        self.get(item.item_type, &item.id)
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.get_ref(item).is_some()
    }

    /// Every item of the given type, in authoring order.
    pub fn items(&self, item_type: ItemType) -> Vec<CatalogItem<'_>> {
        match item_type {
            ItemType::Series => self.series.iter().map(CatalogItem::Series).collect(),
            ItemType::Movie => self.movies.iter().map(CatalogItem::Movie).collect(),
        }
    }

    /// Sorted genres for a type, with the synthetic "All" first.
    pub fn genres_of(&self, item_type: ItemType) -> Vec<String> {
        let genres: BTreeSet<&str> = self
            .items(item_type)
            .into_iter()
            .flat_map(|item| item.info().genres.iter().map(String::as_str))
            .collect();
        std::iter::once(ALL_GENRES.to_string())
            .chain(genres.into_iter().map(str::to_string))
            .collect()
    }

    /// True for "All" and for any genre present on an item of this type.
    pub fn has_genre(&self, item_type: ItemType, genre: &str) -> bool {
        genre == ALL_GENRES || self.items(item_type).iter().any(|i| i.has_genre(genre))
    }

    pub fn filter<P>(&self, item_type: ItemType, predicate: P) -> Vec<CatalogItem<'_>>
    where
        P: Fn(&CatalogItem<'_>) -> bool,
    {
        self.items(item_type)
            .into_iter()
            .filter(|item| predicate(item))
            .collect()
    }

    /// Items carrying `genre`; "All" returns everything.
    pub fn by_genre(&self, item_type: ItemType, genre: &str) -> Vec<CatalogItem<'_>> {
        if genre == ALL_GENRES {
            return self.items(item_type);
        }
        self.filter(item_type, |item| item.has_genre(genre))
    }

    /// Case-insensitive search over title, description and genres.
    /// An empty query matches nothing.
    pub fn search(&self, item_type: ItemType, query: &str) -> Vec<CatalogItem<'_>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.filter(item_type, |item| item.matches_text(&needle))
    }

    /// Title-only suggestions, alphabetical, at most `limit` entries.
    pub fn suggest(&self, item_type: ItemType, query: &str, limit: usize) -> Vec<Suggestion> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let Ok(pattern) = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
        else {
            return Vec::new();
        };

        let mut matches: Vec<CatalogItem<'_>> =
            self.filter(item_type, |item| pattern.is_match(item.title()));
        sort_by_title(&mut matches);

        matches
            .into_iter()
            .take(limit)
            .map(|item| Suggestion {
                id: item.id().to_string(),
                title: item.title().to_string(),
                highlights: pattern.find_iter(item.title()).map(|m| m.range()).collect(),
            })
            .collect()
    }

    /// Map a video key back to its item and playback link.
    pub fn resolve_video(&self, key: &VideoKey) -> Option<(ItemRef, &str)> {
        let (item, episode_id) = key.parts()?;
        match (item.item_type, episode_id) {
            (ItemType::Movie, None) => {
                let movie = self.movie(&item.id)?;
                Some((item, movie.link.as_str()))
            }
            (ItemType::Series, Some(episode_id)) => {
                let series = self.series(&item.id)?;
                let ep = series.episodes.iter().find(|ep| ep.id == episode_id)?;
                Some((item, ep.link.as_str()))
            }
            _ => None,
        }
    }
}

/// Alphabetical by title, case-insensitive, ties broken by the exact title.
///
/// Case folding is Unicode lowercase only; there is no locale collation,
/// so accented titles order by code point after folding.
pub fn sort_by_title(items: &mut [CatalogItem<'_>]) {
    items.sort_by(|a, b| {
        a.title()
            .to_lowercase()
            .cmp(&b.title().to_lowercase())
            .then_with(|| a.title().cmp(b.title()))
    });
}

fn normalize_info(mut info: ItemInfo) -> ItemInfo {
    info.id = info.id.trim().to_string();
    info.title = info.title.trim().to_string();
    let mut seen = HashSet::new();
    info.genres = info
        .genres
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty() && seen.insert(g.clone()))
        .collect();
    info
}

fn normalize_series(mut s: Series) -> Series {
    s.info = normalize_info(s.info);
    for ep in &mut s.episodes {
        ep.id = ep.id.trim().to_string();
        ep.link = ep.link.trim().to_string();
    }
    s
}

fn normalize_movie(mut m: Movie) -> Movie {
    m.info = normalize_info(m.info);
    m.link = m.link.trim().to_string();
    m
}

fn build_index<'a>(
    item_type: ItemType,
    infos: impl Iterator<Item = &'a ItemInfo>,
) -> Result<HashMap<String, usize>, CatalogError> {
    let mut index = HashMap::new();
    for (i, info) in infos.enumerate() {
        if info.id.is_empty() {
            return Err(CatalogError::EmptyId {
                item_type,
                title: info.title.clone(),
            });
        }
        if index.insert(info.id.clone(), i).is_some() {
            return Err(CatalogError::DuplicateId {
                item_type,
                id: info.id.clone(),
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn fixture() -> Catalog {
        Catalog::from_json(
            r#"{
                "series": [
                    { "id": "s1", "title": "Zeta", "description": "A heist drama",
                      "genres": ["Action"],
                      "episodes": [
                        { "title": "Episode 1", "link": " https://v.example/z1 " },
                        { "title": "Episode 2", "link": "https://v.example/z2" }
                      ] },
                    { "id": "s2", "title": "Alpha", "description": "Sketches",
                      "genres": ["Comedy"], "episodes": [] }
                ],
                "movies": [
                    { "id": "m1", "title": "Your Name", "description": "Romantic fantasy",
                      "genres": ["Animation", "Romance"], "link": "https://v.example/yn" },
                    { "id": "m2", "title": "the maze runner", "description": "Trapped in a maze",
                      "genres": ["Action", "Mystery"], "link": "https://v.example/mr" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn derives_episode_ids_and_trims_links() {
        let catalog = fixture();
        let zeta = catalog.series("s1").unwrap();
        let ids: Vec<&str> = zeta.episodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["s1-e1", "s1-e2"]);
        assert_eq!(zeta.episodes[0].link, "https://v.example/z1");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Catalog::from_json(
            r#"{ "movies": [
                { "id": "m1", "title": "A", "link": "x" },
                { "id": "m1", "title": "B", "link": "y" }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId { item_type: ItemType::Movie, .. }));
    }

    #[test]
    fn rejects_empty_ids() {
        let err = Catalog::from_json(r#"{ "movies": [{ "id": " ", "title": "A", "link": "x" }] }"#)
            .unwrap_err();
        assert!(matches!(err, CatalogError::EmptyId { .. }));
    }

    #[test]
    fn same_id_allowed_across_types() {
        let catalog = Catalog::from_json(
            r#"{ "series": [{ "id": "x", "title": "S", "episodes": [] }],
                 "movies": [{ "id": "x", "title": "M", "link": "l" }] }"#,
        )
        .unwrap();
        assert!(catalog.get(ItemType::Series, "x").is_some());
        assert!(catalog.get(ItemType::Movie, "x").is_some());
    }

    #[test]
    fn genres_sorted_with_all_first() {
        let catalog = fixture();
        assert_eq!(catalog.genres_of(ItemType::Series), ["All", "Action", "Comedy"]);
        assert_eq!(
            catalog.genres_of(ItemType::Movie),
            ["All", "Action", "Animation", "Mystery", "Romance"]
        );
    }

    #[test]
    fn search_matches_title_description_and_genre() {
        let catalog = fixture();
        fn titles(items: Vec<CatalogItem<'_>>) -> Vec<String> {
            items.iter().map(|i| i.title().to_string()).collect()
        }
        assert_eq!(titles(catalog.search(ItemType::Series, "ZET")), ["Zeta"]);
        assert_eq!(titles(catalog.search(ItemType::Series, "sketch")), ["Alpha"]);
        assert_eq!(titles(catalog.search(ItemType::Movie, "myst")), ["the maze runner"]);
        assert!(catalog.search(ItemType::Movie, "   ").is_empty());
    }

    #[test]
    fn suggestions_are_sorted_limited_and_highlighted() {
        let catalog = fixture();
        let s = catalog.suggest(ItemType::Series, "a", 5);
        let titles: Vec<&str> = s.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Alpha", "Zeta"]);
        assert_eq!(s[0].highlights, vec![0..1, 4..5]);

        assert_eq!(catalog.suggest(ItemType::Series, "a", 1).len(), 1);
        assert!(catalog.suggest(ItemType::Series, "", 5).is_empty());
    }

    #[test]
    fn suggestions_escape_regex_metacharacters() {
        let catalog = Catalog::from_json(
            r#"{ "series": [{ "id": "b", "title": "Bleach:TYBW (P2)", "episodes": [] }] }"#,
        )
        .unwrap();
        let s = catalog.suggest(ItemType::Series, "(p2", 5);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].highlights, vec![12..15]);
    }

    #[test]
    fn resolves_video_keys() {
        let catalog = fixture();
        let (item, link) = catalog
            .resolve_video(&VideoKey::episode("s1", "s1-e2"))
            .unwrap();
        assert_eq!(item, ItemRef::series("s1"));
        assert_eq!(link, "https://v.example/z2");
        assert!(catalog.resolve_video(&VideoKey::episode("s1", "s1-e9")).is_none());
        assert!(catalog.resolve_video(&VideoKey::movie("m2")).is_some());
    }

    #[test]
    fn sorting_is_case_insensitive() {
        let catalog = fixture();
        let mut movies = catalog.items(ItemType::Movie);
        sort_by_title(&mut movies);
        let titles: Vec<&str> = movies.iter().map(|m| m.title()).collect();
        assert_eq!(titles, ["the maze runner", "Your Name"]);
    }

    #[test]
    fn accented_titles_sort_by_code_point() {
        let json = r#"{
            "series": [],
            "movies": [
                { "id": "m1", "title": "Élite", "link": "https://v.example/1" },
                { "id": "m2", "title": "Zodiac", "link": "https://v.example/2" },
                { "id": "m3", "title": "Amélie", "link": "https://v.example/3" }
            ]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        let mut movies = catalog.items(ItemType::Movie);
        sort_by_title(&mut movies);
        let titles: Vec<&str> = movies.iter().map(|m| m.title()).collect();
        assert_eq!(titles, ["Amélie", "Zodiac", "Élite"]);
    }

    #[test]
    fn bundled_catalog_parses() {
        let catalog = Catalog::from_json(include_str!("../../../data/catalog.json")).unwrap();
        assert_eq!(catalog.len(ItemType::Series), 3);
        assert_eq!(catalog.len(ItemType::Movie), 3);
        assert!(
            catalog
                .resolve_video(&VideoKey::episode("arcane-s1", "arcane-s1-e2"))
                .is_some()
        );
        assert!(
            catalog
                .resolve_video(&VideoKey::episode("the-flash-s3", "paradox"))
                .is_some()
        );
    }

    #[test]
    fn series_id_with_colon_is_rejected() {
        let json = r#"{
            "series": [{
                "id": "bleach:tybw",
                "title": "Bleach:TYBW P2",
                "episodes": [{ "title": "Episode 1", "link": "https://v.example/b1" }]
            }]
        }"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::ColonInSeriesId { ref id } if id == "bleach:tybw"));
    }

    #[test]
    fn colons_in_movie_and_episode_ids_still_resolve() {
        let json = r#"{
            "series": [{
                "id": "bleach-tybw",
                "title": "Bleach:TYBW P2",
                "episodes": [{ "id": "part:2", "title": "Episode 1", "link": "https://v.example/b1" }]
            }],
            "movies": [{ "id": "alien:romulus", "title": "Alien: Romulus", "link": "https://v.example/ar" }]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        let (_, link) = catalog
            .resolve_video(&VideoKey::episode("bleach-tybw", "part:2"))
            .unwrap();
        assert_eq!(link, "https://v.example/b1");
        let (item, _) = catalog
            .resolve_video(&VideoKey::movie("alien:romulus"))
            .unwrap();
        assert_eq!(item, ItemRef::movie("alien:romulus"));
    }
}
