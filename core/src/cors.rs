use actix_cors::Cors;
use actix_web::http::header::{self, HeaderName};

pub fn middleware(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::COOKIE,
            HeaderName::from_static("stripe-signature"),
        ])
        .expose_headers(&[header::SET_COOKIE])
        .supports_credentials()
        .max_age(3600);

    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
