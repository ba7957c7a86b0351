use middleware::extractor::ExtractionMiddleware;

pub mod middleware {
    pub mod extractor;
}

pub use middleware::extractor::{TOKEN_COOKIE, token_from_parts};

pub fn middleware() -> ExtractionMiddleware {
    ExtractionMiddleware::new()
}
