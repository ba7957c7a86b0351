use actix_web::body::{self, BoxBody, MessageBody};
use actix_web::dev::Payload;
use actix_web::web::{self, Bytes};
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use actix_web::{HttpMessage, HttpResponse, ResponseError};
use colored::Colorize;
use common::env_config::Config;
use common::jwt::get_jwt_claims_or_error;
use futures::StreamExt;
use futures::future::{LocalBoxFuture, Ready, ready};
use log::{debug, info};
use serde_json::{Map, Value, json};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

const REDACTED_KEYS: [&str; 5] = [
    "password",
    "currentPassword",
    "newPassword",
    "token",
    "confirmPassword",
];

/// Replaces the values of credential-bearing keys, at any depth.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                if REDACTED_KEYS.contains(&key.as_str()) {
                    *inner = json!("***");
                } else {
                    redact(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Query string as a JSON object; a bare key maps to `true`.
pub fn query_params(query_string: &str) -> Value {
    let mut params = Map::new();
    for pair in query_string.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), json!(value)),
            None => params.insert(pair.to_string(), json!(true)),
        };
    }
    Value::Object(params)
}

pub struct LoggerMiddleware {}

impl LoggerMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let started = Instant::now();

        // Common request info
        let method = req.method().to_string();
        let path = req.path().to_string();
        let query_string = req.query_string().to_string();

        // IP
        let ip_address = req
            .connection_info()
            .realip_remote_addr()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let console_logging_enabled = req
            .app_data::<web::Data<Arc<Config>>>()
            .map(|config| config.console_logging_enabled)
            .unwrap_or(true);
        // provider payloads carry customer data
        let log_bodies = !path.ends_with("/webhook");
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            // Jwt claims
            let user_id = get_jwt_claims_or_error(&req).ok().map(|c| c.user_id);

            // Copy request body from payload and reconstruct it
            let mut payload = req.take_payload();
            let body_bytes = extract_body(&mut payload).await?;
            let mut request_body = if !body_bytes.is_empty() {
                serde_json::from_slice::<Value>(&body_bytes).unwrap_or(Value::Null)
            } else {
                Value::Null
            };
            let new_stream: Pin<
                Box<dyn futures::Stream<Item = Result<Bytes, actix_web::error::PayloadError>>>,
            > = futures::stream::once(async move {
                Ok::<Bytes, actix_web::error::PayloadError>(body_bytes)
            })
            .boxed();
            req.set_payload(Payload::from(new_stream));

            // Call next services
            let res = srv.call(req).await?;

            let status = res.status();
            let status_code = status.as_u16();
            let elapsed_ms = started.elapsed().as_millis();

            // Copy response body and reconstruct response
            let (req, res) = res.into_parts();
            let headers = res.headers().clone();
            let res_body = res.into_body();
            let response_body_bytes = body::to_bytes(res_body).await?;
            let mut response_body =
                serde_json::from_slice::<Value>(&response_body_bytes).unwrap_or(Value::Null);
            let mut new_res = HttpResponse::build(status);
            for (key, value) in headers.iter() {
                new_res.insert_header((key.clone(), value.clone()));
            }
            let new_res = new_res.body(response_body_bytes);
            let res = ServiceResponse::new(req, new_res);

            if console_logging_enabled {
                let colored_status = match status_code {
                    200..=299 => status_code.to_string().green(),
                    300..=399 => status_code.to_string().yellow(),
                    400..=499 => status_code.to_string().bright_red(),
                    _ => status_code.to_string().red(),
                };

                let colored_method = match method.as_str() {
                    "GET" => method.blue(),
                    "POST" => method.yellow(),
                    "PUT" => method.purple(),
                    "DELETE" => method.red(),
                    _ => method.normal(),
                };

                info!(
                    "[{}] {} {} {} ip={} user_id={} params={}",
                    colored_status,
                    colored_method,
                    path.bright_white(),
                    format!("({}ms)", elapsed_ms).bright_black(),
                    ip_address,
                    user_id
                        .map_or("None".to_string(), |id| id.to_string())
                        .bright_blue(),
                    query_params(&query_string).to_string().bright_cyan(),
                );

                if log_bodies {
                    redact(&mut request_body);
                    if request_body.as_object().is_some_and(|body| !body.is_empty()) {
                        debug!(
                            "  Request: {}",
                            request_body.to_string().bright_green()
                        );
                    }

                    redact(&mut response_body);
                    let has_body = response_body.as_object().is_some_and(|b| !b.is_empty());
                    if status_code >= 400 || has_body {
                        debug!(
                            "  Response: {}",
                            response_body.to_string().bright_yellow()
                        );
                    }
                }
            }

            Ok(res)
        })
    }
}

async fn extract_body(payload: &mut Payload) -> Result<Bytes, Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpResponse, post, test as actix_test};

    use super::*;

    #[test]
    fn credentials_are_masked_at_any_depth() {
        let mut body = json!({
            "email": "a@b.ma",
            "password": "Secret123",
            "nested": [{ "newPassword": "Other456" }],
        });
        redact(&mut body);
        assert_eq!(body["email"], "a@b.ma");
        assert_eq!(body["password"], "***");
        assert_eq!(body["nested"][0]["newPassword"], "***");
    }

    #[test]
    fn query_params_are_objects() {
        let params = query_params("page=2&featured&search=rust");
        assert_eq!(params["page"], "2");
        assert_eq!(params["featured"], true);
        assert_eq!(query_params(""), json!({}));
    }

    #[post("/echo")]
    async fn echo(body: Bytes) -> HttpResponse {
        HttpResponse::Ok().body(body)
    }

    #[actix_web::test]
    async fn request_body_survives_logging() {
        let app = actix_test::init_service(App::new().wrap(LoggerMiddleware::new()).service(echo)).await;
        let req = actix_test::TestRequest::post()
            .uri("/echo")
            .set_payload("{\"title\":\"Rust\"}")
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, Bytes::from_static(b"{\"title\":\"Rust\"}"));
    }
}
