use std::{future::Future, pin::Pin, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use futures::future::{Ready, ok};

use common::{
    env_config::Config,
    error::Res,
    jwt::{self, JwtClaims},
};

/// Name of the cookie carrying the session JWT.
pub const TOKEN_COOKIE: &str = "token";

/// Picks the session token from a `Bearer` authorization header, falling back
/// to the `token` cookie. A cookie cleared by logout holds `none`.
pub fn token_from_parts(auth_header: Option<&str>, cookie: Option<&str>) -> Option<String> {
    let bearer = auth_header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }
    cookie
        .filter(|value| !value.is_empty() && *value != "none")
        .map(str::to_owned)
}

pub struct ExtractionMiddleware {}

impl ExtractionMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl<S, B> Transform<S, ServiceRequest> for ExtractionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ExtractionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ExtractionMiddlewareService {
            service: Arc::new(service),
        })
    }
}

pub struct ExtractionMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for ExtractionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);
        let cookie = req.cookie(TOKEN_COOKIE).map(|c| c.value().to_owned());
        let token = token_from_parts(auth_header.as_deref(), cookie.as_deref());

        let secret = req
            .app_data::<web::Data<Arc<Config>>>()
            .map(|config| config.jwt_config.secret.clone());
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            match (token, secret) {
                (Some(token), Some(secret)) => {
                    // validate token and insert claims to request object for future use
                    let claims_res = jwt::validate_jwt(&token, &secret);
                    req.extensions_mut().insert::<Res<JwtClaims>>(claims_res);
                }
                (Some(_), None) => log::warn!("Config missing from app data, token ignored"),
                _ => {}
            }
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpRequest, HttpResponse, cookie::Cookie, get, test as actix_test};
    use common::{
        env_config::Config,
        jwt::{ClaimsSpec, generate_jwt},
        misc::Role,
    };
    use uuid::Uuid;

    use super::*;

    #[test]
    fn bearer_header_wins_over_cookie() {
        assert_eq!(
            token_from_parts(Some("Bearer abc"), Some("def")),
            Some("abc".to_string())
        );
        assert_eq!(
            token_from_parts(Some("Basic abc"), Some("def")),
            Some("def".to_string())
        );
        assert_eq!(token_from_parts(None, Some("none")), None);
        assert_eq!(token_from_parts(Some("Bearer "), None), None);
    }

    #[get("/whoami")]
    async fn whoami(req: HttpRequest) -> HttpResponse {
        match req.extensions().get::<Res<JwtClaims>>() {
            Some(Ok(claims)) => HttpResponse::Ok().body(claims.role.clone()),
            Some(Err(_)) => HttpResponse::Unauthorized().finish(),
            None => HttpResponse::NoContent().finish(),
        }
    }

    fn config() -> Arc<Config> {
        let vars = [
            ("DATABASE_URL", "postgres://localhost/skillup_test"),
            ("JWT_SECRET", "extractor-secret"),
            ("STRIPE_SECRET_KEY", "sk_test_x"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_x"),
        ];
        let lookup = |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        };
        Arc::new(Config::from_lookup(lookup).unwrap())
    }

    #[actix_web::test]
    async fn claims_are_attached_from_cookie() {
        let config = config();
        let token = generate_jwt(
            ClaimsSpec {
                user_id: Uuid::new_v4(),
                role: Role::Instructor,
            },
            &config.jwt_config,
        )
        .unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .wrap(ExtractionMiddleware::new())
                .service(whoami),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(TOKEN_COOKIE, token))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, actix_web::web::Bytes::from_static(b"instructor"));

        let req = actix_test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), 401);

        let req = actix_test::TestRequest::get().uri("/whoami").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), 204);
    }
}
