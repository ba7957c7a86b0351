use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderValue, RETRY_AFTER},
};
use common::error::AppError;
use governor::{
    Quota, RateLimiter,
    clock::{Clock, QuantaClock},
    state::{InMemoryState, NotKeyed},
};
use std::{future::Future, num::NonZeroU32, pin::Pin, rc::Rc, sync::Arc};

/// Caps the total request rate of the process, whoever sends the requests.
pub struct GlobalLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, QuantaClock>>,
}

impl GlobalLimiter {
    pub fn new(permits_per_sec: u32) -> Self {
        let permits = NonZeroU32::new(permits_per_sec).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(permits);
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GlobalLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = GlobalLimiterService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(GlobalLimiterService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct GlobalLimiterService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, QuantaClock>>,
}

impl<S, B> Service<ServiceRequest> for GlobalLimiterService<S>
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
        let limiter = self.limiter.clone();
        Box::pin(async move {
            match limiter.check() {
                Ok(()) => srv.call(req).await.map(|res| res.map_into_boxed_body()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(QuantaClock::default().now());
                    let mut res = req.error_response(AppError::TooManyRequests(
                        "Server overloaded, please try again later".to_string(),
                    ));
                    // whole seconds, at least one
                    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                    res.headers_mut()
                        .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
                    Ok(res)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpResponse, get, test};

    use super::*;

    #[get("/ping")]
    async fn ping() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn burst_over_quota_is_rejected() {
        let app = test::init_service(App::new().wrap(GlobalLimiter::new(1)).service(ping)).await;
        let first =
            test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        let second =
            test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(first.status(), 200);
        assert_eq!(second.status(), 429);
        assert!(second.headers().contains_key("retry-after"));
    }
}
