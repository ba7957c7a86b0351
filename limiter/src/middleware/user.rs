use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::{error::AppError, jwt::get_jwt_claims_or_error};
use std::{future::Future, pin::Pin, rc::Rc, sync::Arc, time::Duration};

use crate::counter::RateCounter;

/// Caps requests per identity: the authenticated user, else the client address.
pub struct UserRateLimiter {
    counter: Arc<dyn RateCounter>,
    max_requests: u64,
    window: Duration,
}

impl UserRateLimiter {
    pub fn new(counter: Arc<dyn RateCounter>, max_requests: u64, window: Duration) -> Self {
        Self {
            counter,
            max_requests,
            window,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for UserRateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = UserRateLimiterService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(UserRateLimiterService {
            service: Rc::new(service),
            counter: Arc::clone(&self.counter),
            max_requests: self.max_requests,
            window: self.window,
        }))
    }
}

pub struct UserRateLimiterService<S> {
    service: Rc<S>,
    counter: Arc<dyn RateCounter>,
    max_requests: u64,
    window: Duration,
}

impl<S, B> Service<ServiceRequest> for UserRateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let counter = Arc::clone(&self.counter);
        let max_requests = self.max_requests;
        let window = self.window;

        Box::pin(async move {
            let identity = match get_jwt_claims_or_error(&req) {
                Ok(claims) => format!("user:{}", claims.user_id),
                Err(_) => format!(
                    "ip:{}",
                    req.connection_info()
                        .realip_remote_addr()
                        .unwrap_or("unknown")
                ),
            };

            match counter.hit(&identity, window).await {
                Ok(count) if count > max_requests => {
                    log::debug!("Rate limit reached for {} ({} requests)", identity, count);
                    return Ok(req.error_response(AppError::TooManyRequests(
                        "Too many requests, please try again later".to_string(),
                    )));
                }
                Ok(_) => {}
                // counter outage must not take the API down
                Err(e) => log::error!("Rate counter unavailable: {}", e),
            }

            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpResponse, get, test};

    use super::*;
    use crate::counter::MemoryCounter;

    #[get("/ping")]
    async fn ping() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn rejects_after_max_requests() {
        let limiter = UserRateLimiter::new(
            Arc::new(MemoryCounter::new()),
            2,
            Duration::from_secs(60),
        );
        let app = test::init_service(App::new().wrap(limiter).service(ping)).await;

        for _ in 0..2 {
            let res = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request())
                .await;
            assert_eq!(res.status(), 200);
        }
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(res.status(), 429);
    }
}
