//! Render model handed to the presenter.
//!
//! [`project`] is a pure function of the view state, the catalog and the
//! player overlay. Nothing here is stored; every render recomputes it.

use serde::Serialize;

use crate::catalog::{Catalog, CatalogItem};
use crate::navigator::{GenreButton, NavView, PlayerOverlay, genre_buttons, visible_items};
use crate::types::{ItemRef, ItemType, Section, VideoKey};
use crate::view_state::ViewState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Screen {
    pub view: NavView,
    /// Navigation bar, search box and genre buttons. Hidden while the
    /// player is open and on detail views.
    pub chrome_visible: bool,
    pub content: Content,
    pub player: Option<PlayerOverlay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Home(HomeScreen),
    List(ListScreen),
    Detail(DetailScreen),
    WatchLater(WatchLaterScreen),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeScreen {
    pub series_count: usize,
    pub movie_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardEntry {
    pub item: ItemRef,
    pub title: String,
    pub image: String,
    pub in_watch_later: bool,
    pub opened: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListScreen {
    pub item_type: ItemType,
    pub search_query: String,
    pub genres: Vec<GenreButton>,
    pub items: Vec<CardEntry>,
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoEntry {
    pub video_key: VideoKey,
    pub title: String,
    pub link: String,
    pub resume_from: Option<f64>,
    pub duration: Option<f64>,
    pub watched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailScreen {
    pub item: ItemRef,
    pub title: String,
    pub description: String,
    pub image: String,
    pub genres: Vec<String>,
    pub origin: Option<Section>,
    pub in_watch_later: bool,
    pub opened: bool,
    /// Episodes for a series, the single feature video for a movie.
    pub videos: Vec<VideoEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchLaterScreen {
    pub items: Vec<CardEntry>,
    pub empty_message: Option<String>,
}

pub fn project(state: &ViewState, catalog: &Catalog, player: Option<&PlayerOverlay>) -> Screen {
    let view = derive_view(state, catalog);
    let content = match &view {
        NavView::Home => Content::Home(HomeScreen {
            series_count: catalog.len(ItemType::Series),
            movie_count: catalog.len(ItemType::Movie),
        }),
        NavView::List { item_type } => Content::List(list_screen(state, catalog, *item_type)),
        NavView::WatchLater => Content::WatchLater(watch_later_screen(state, catalog)),
        NavView::Detail { item, origin } => match catalog.get_ref(item) {
            Some(found) => Content::Detail(detail_screen(state, found, *origin)),
            None => Content::List(list_screen(state, catalog, item.item_type)),
        },
    };
    let chrome_visible = player.is_none() && !matches!(content, Content::Detail(_));

    Screen {
        view,
        chrome_visible,
        content,
        player: player.cloned(),
    }
}

/// Like `Navigator::view`, but never points at a missing item.
fn derive_view(state: &ViewState, catalog: &Catalog) -> NavView {
    if let Some(item) = &state.open_detail {
        if catalog.contains(item) {
            return NavView::Detail {
                item: item.clone(),
                origin: state.origin_section,
            };
        }
        return NavView::List {
            item_type: item.item_type,
        };
    }
    match state.active_section {
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

fn card(state: &ViewState, item: CatalogItem<'_>) -> CardEntry {
    let item_ref = item.item_ref();
    CardEntry {
        in_watch_later: state.watch_later.contains(&item_ref),
        opened: state.opened_items.contains(&item_ref),
        title: item.title().to_string(),
        image: item.info().image.clone(),
        item: item_ref,
    }
}

fn list_screen(state: &ViewState, catalog: &Catalog, item_type: ItemType) -> ListScreen {
    let filter = state.filter(item_type);
    let items: Vec<CardEntry> = visible_items(catalog, item_type, filter)
        .into_iter()
        .map(|item| card(state, item))
        .collect();
    let empty_message = items.is_empty().then(|| {
        if filter.search_query.is_empty() {
            "No items to display here.".to_string()
        } else {
            format!("No results found for \"{}\".", filter.search_query)
        }
    });
    ListScreen {
        item_type,
        search_query: filter.search_query.clone(),
        genres: genre_buttons(catalog, item_type, filter),
        items,
        empty_message,
    }
}

fn watch_later_screen(state: &ViewState, catalog: &Catalog) -> WatchLaterScreen {
    let items: Vec<CardEntry> = state
        .watch_later
        .iter()
        .filter_map(|entry| catalog.get_ref(entry))
        .map(|item| card(state, item))
        .collect();
    let empty_message = items
        .is_empty()
        .then(|| "Your Watch Later list is empty.".to_string());
    WatchLaterScreen {
        items,
        empty_message,
    }
}

fn video_entry(state: &ViewState, video_key: VideoKey, title: &str, link: &str) -> VideoEntry {
    let resume = state.resume_positions.get(&video_key);
    VideoEntry {
        resume_from: resume.map(|r| r.position_seconds),
        duration: resume.map(|r| r.duration_seconds),
        watched: state.watched_videos.contains(&video_key),
        title: title.to_string(),
        link: link.to_string(),
        video_key,
    }
}

fn detail_screen(state: &ViewState, item: CatalogItem<'_>, origin: Option<Section>) -> DetailScreen {
    let info = item.info();
    let videos = match item {
        CatalogItem::Series(series) => series
            .episodes
            .iter()
            .map(|ep| {
                video_entry(
                    state,
                    VideoKey::episode(&info.id, &ep.id),
                    &ep.title,
                    &ep.link,
                )
            })
            .collect(),
        CatalogItem::Movie(movie) => vec![video_entry(
            state,
            VideoKey::movie(&info.id),
            &info.title,
            &movie.link,
        )],
    };
    let item_ref = item.item_ref();
    DetailScreen {
        in_watch_later: state.watch_later.contains(&item_ref),
        opened: state.opened_items.contains(&item_ref),
        item: item_ref,
        title: info.title.clone(),
        description: info.description.clone(),
        image: info.image.clone(),
        genres: info.genres.clone(),
        origin,
        videos,
    }
}
