use serde::Serialize;
use thiserror::Error;

use crate::types::ItemType;

/// Errors raised while loading the static catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{item_type} item has an empty id (title: {title:?})")]
    EmptyId { item_type: ItemType, title: String },

    #[error("duplicate {item_type} id: {id}")]
    DuplicateId { item_type: ItemType, id: String },

    #[error("series id {id:?} contains ':', which separates video key parts")]
    ColonInSeriesId { id: String },

    #[error("duplicate episode id {episode_id} in series {series_id}")]
    DuplicateEpisodeId {
        series_id: String,
        episode_id: String,
    },
}

/// Navigator precondition violations.
///
/// These are caller mistakes, never corrupt state: the transition is
/// refused and the view state is left untouched. A missing catalog item
/// is not one of them; the navigator redirects instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("genre {genre:?} does not exist for {item_type}")]
    UnknownGenre { item_type: ItemType, genre: String },

    #[error("no detail view is open")]
    DetailNotOpen,

    #[error("no player is open")]
    PlayerNotOpen,
}

/// Unified API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }
}

impl From<NavError> for ApiError {
    fn from(e: NavError) -> Self {
        match e {
            NavError::UnknownGenre { .. } => Self::BadRequest(e.to_string()),
            NavError::DetailNotOpen | NavError::PlayerNotOpen => Self::Conflict(e.to_string()),
        }
    }
}

/// JSON error envelope: `{ "error": { "code": "…", "message": "…", "details": {} } }`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&ApiError> for ErrorEnvelope {
    fn from(e: &ApiError) -> Self {
        Self {
            error: ErrorBody {
                code: e.code().to_string(),
                message: e.to_string(),
                details: serde_json::Value::Object(serde_json::Map::new()),
            },
        }
    }
}
