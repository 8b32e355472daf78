//! Response shapes shared by every handler.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        backend::Backend,
        models::{Page, Paged},
    },
    ports::repository::RepoError,
};

/// Error answered by a handler, rendered as `{"error":{"code","message"}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0} is temporarily unavailable")]
    Unavailable(Backend),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) | ApiError::Repo(RepoError::NotConnected) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Repo(err) => tracing::error!(error = %err, "Backend call failed"),
            ApiError::Unavailable(backend) => {
                tracing::warn!(%backend, "Request rejected, backend not ready")
            }
            _ => tracing::debug!(status = status.as_u16(), error = %self, "Request rejected"),
        }
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: status.as_u16(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub count: i64,
    pub offset: i64,
    pub limit: i64,
    pub total: i64,
}

/// `{"data":[...],"resultset":{...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub resultset: ResultSet,
}

impl<T> ListEnvelope<T> {
    pub fn new(paged: Paged<T>, page: Page) -> Self {
        Self {
            resultset: ResultSet {
                count: paged.items.len() as i64,
                offset: page.offset,
                limit: page.limit,
                total: paged.total,
            },
            data: paged.items,
        }
    }
}

/// Answer 404 with `message` when the page is empty.
pub fn non_empty<T: Serialize>(
    paged: Paged<T>,
    page: Page,
    message: &str,
) -> ApiResult<Json<ListEnvelope<T>>> {
    if paged.items.is_empty() {
        return Err(ApiError::NotFound(message.to_string()));
    }
    Ok(Json(ListEnvelope::new(paged, page)))
}

/// Acknowledgement of a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub code: u16,
    pub message: String,
}

impl StatusBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: status.as_u16(),
            message: message.into(),
        })
    }
}
