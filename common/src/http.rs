use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;

use super::error::Res;

/// Response envelope shared by every endpoint: `{ success, message?, ...body }`.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Serialize)]
pub struct Data<T: Serialize> {
    pub data: T,
}

/// Listing with its size, e.g. `{ count, data }`.
#[derive(Serialize)]
pub struct Listing<T: Serialize> {
    pub count: usize,
    pub data: Vec<T>,
}

impl<T: Serialize> From<Vec<T>> for Listing<T> {
    fn from(data: Vec<T>) -> Self {
        Listing {
            count: data.len(),
            data,
        }
    }
}

/// Paginated listing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    pub count: usize,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub data: Vec<T>,
}

impl<T: Serialize> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let limit = limit.max(1);
        Page {
            count: data.len(),
            total,
            total_pages: (total + limit - 1) / limit,
            current_page: page,
            data,
        }
    }
}

pub struct Success;
impl Success {
    pub fn ok<T: Serialize>(data: T) -> Res<HttpResponse> {
        Success::respond(StatusCode::OK, None, Data { data })
    }
    pub fn ok_with_message<T: Serialize>(message: &str, data: T) -> Res<HttpResponse> {
        Success::respond(StatusCode::OK, Some(message), Data { data })
    }
    pub fn created<T: Serialize>(data: T) -> Res<HttpResponse> {
        Success::respond(StatusCode::CREATED, None, Data { data })
    }
    pub fn created_with_message<T: Serialize>(message: &str, data: T) -> Res<HttpResponse> {
        Success::respond(StatusCode::CREATED, Some(message), Data { data })
    }
    pub fn message(message: &str) -> Res<HttpResponse> {
        Success::respond(StatusCode::OK, Some(message), serde_json::json!({}))
    }
    /// Serializes `body` next to `success` instead of under `data`.
    pub fn flat<T: Serialize>(body: T) -> Res<HttpResponse> {
        Success::respond(StatusCode::OK, None, body)
    }

    pub fn respond<T: Serialize>(
        status: StatusCode,
        message: Option<&str>,
        body: T,
    ) -> Res<HttpResponse> {
        Result::Ok(HttpResponse::build(status).json(Envelope {
            success: true,
            message: message.map(str::to_string),
            body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        let page = Page::new(vec![1, 2], 25, 3, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.count, 2);
        let empty: Page<i32> = Page::new(vec![], 0, 1, 12);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn envelope_flattens_body() {
        let json = serde_json::to_value(Envelope {
            success: true,
            message: None,
            body: Data { data: 5 },
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": 5 }));
    }
}
