use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;

#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: u32,
    pub pages: u64,
    pub total: u64,
    pub limit: u32,
}

/// `page`/`limit` query parameters, 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        let limit = self.limit();
        Pagination {
            current: self.page(),
            pages: total.div_ceil(u64::from(limit)),
            total,
            limit,
        }
    }
}

pub fn success<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(StatusCode::OK, Some(data), Some(message.into()), None)
}

pub fn created<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(StatusCode::CREATED, Some(data), Some(message.into()), None)
}

pub fn data<T>(data: T) -> Response
where
    T: Serialize,
{
    respond(StatusCode::OK, Some(data), None, None)
}

pub fn paginated<T>(data: T, pagination: Pagination) -> Response
where
    T: Serialize,
{
    respond(StatusCode::OK, Some(data), None, Some(pagination))
}

pub fn empty_success(message: impl Into<String>) -> Response {
    respond::<()>(StatusCode::OK, None, Some(message.into()), None)
}

fn respond<T>(
    status: StatusCode,
    data: Option<T>,
    message: Option<String>,
    pagination: Option<Pagination>,
) -> Response
where
    T: Serialize,
{
    let body = ApiResponse {
        success: true,
        data,
        message,
        pagination,
    };
    (status, Json(body)).into_response()
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    error: Option<String>,
    status: StatusCode,
) -> Response {
    let body = ApiErrorResponse {
        success: false,
        message: message.into(),
        code: code.to_string(),
        error,
    };

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_pagination_rounds_pages_up() {
        let params = PageParams {
            page: Some(2),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 10);
        assert_eq!(
            params.pagination(21),
            Pagination {
                current: 2,
                pages: 3,
                total: 21,
                limit: 10
            }
        );
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let params = PageParams {
            page: Some(0),
            limit: Some(0),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 1);
        assert_eq!(params.pagination(0).pages, 0);
    }
}
