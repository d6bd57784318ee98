use tracing::{info, warn};
use url::Url;

use crate::catalog::Catalog;
use crate::types::{ItemRef, ItemType};
use crate::view_state::{ViewState, reconcile};

/// Direct entry into a detail view via `?type=<series|movie>&id=<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    /// `None` when the `type` parameter was present but not recognised.
    pub item_type: Option<ItemType>,
    pub id: String,
}

impl DeepLink {
    /// Both parameters must be present and non-empty, otherwise there is no
    /// deep link and the persisted state is used as is.
    pub fn from_params(item_type: Option<&str>, id: Option<&str>) -> Option<Self> {
        let item_type = item_type.map(str::trim).filter(|t| !t.is_empty())?;
        let id = id.map(str::trim).filter(|i| !i.is_empty())?;
        Some(Self {
            item_type: ItemType::parse(item_type),
            id: id.to_string(),
        })
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        let mut item_type = None;
        let mut id = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "type" => item_type = Some(v.into_owned()),
                "id" => id = Some(v.into_owned()),
                _ => {}
            }
        }
        Self::from_params(item_type.as_deref(), id.as_deref())
    }

    pub fn item(&self) -> Option<ItemRef> {
        self.item_type.map(|t| ItemRef::new(t, self.id.clone()))
    }
}

/// Link that opens `item` directly, the inverse of [`DeepLink::from_url`].
pub fn share_link(base: &Url, item: &ItemRef) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("type", item.item_type.as_str())
        .append_pair("id", &item.id);
    url
}

/// Produce the first-render state from what was persisted.
///
/// With a deep link the persisted navigation is discarded (bookmarks,
/// progress and opened/watched marks stay) and the session opens the
/// linked item, or Home when it does not resolve. Without one the
/// persisted state is reconciled against the catalog.
pub fn bootstrap(persisted: ViewState, catalog: &Catalog, deep_link: Option<&DeepLink>) -> ViewState {
    let Some(link) = deep_link else {
        return reconcile(persisted, catalog);
    };

    let mut state = persisted;
    state.reset_navigation();

    match link.item().filter(|item| catalog.contains(item)) {
        Some(item) => {
            info!(item = %item, "opening deep link");
            state.active_section = item.item_type.section();
            state.opened_items.insert(item.clone());
            state.open_detail = Some(item);
        }
        None => warn!(id = %link.id, "deep link does not resolve, starting at home"),
    }
    reconcile(state, catalog)
}
