//! Response construction.
//!
//! # Responsibilities
//! - Build the only three statuses the gateway emits: 200, 302, 404
//! - Attach content headers for static and index payloads
//!
//! # Design Decisions
//! - `content-encoding: gzip` appears iff the payload is gzip
//! - `last-modified` is a fixed value, never the file's mtime
//! - A header that fails to build degrades to 404 instead of panicking

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use bytes::Bytes;

/// Body sent for any `/api/app/` request the registrar could not answer.
pub const API_ERROR_BODY: &str = r#"{"status":"error"}"#;

/// Headers shared by static-file and index responses.
#[derive(Debug, Clone)]
pub struct ContentHeaders {
    pub mime: &'static str,
    pub compressed: bool,
    pub max_age: u32,
    pub last_modified: HeaderValue,
}

pub fn redirect(location: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|e| {
            tracing::warn!(location = %location, error = %e, "Unusable redirect target");
            not_found()
        })
}

pub fn not_found() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

pub fn content(headers: &ContentHeaders, body: Bytes) -> Response<Body> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, headers.mime)
        .header(header::CACHE_CONTROL, format!("max-age={}", headers.max_age))
        .header(header::LAST_MODIFIED, headers.last_modified.clone());

    if headers.compressed {
        builder = builder.header(header::CONTENT_ENCODING, "gzip");
    }

    builder.body(Body::from(body)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build content response");
        not_found()
    })
}

pub fn json(body: Bytes) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(crate::routing::mime::JSON),
    );
    response
}

pub fn api_error() -> Response<Body> {
    json(Bytes::from_static(API_ERROR_BODY.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(compressed: bool) -> ContentHeaders {
        ContentHeaders {
            mime: "text/css; charset=utf-8",
            compressed,
            max_age: 30,
            last_modified: HeaderValue::from_static("Fri, 29 Nov 1974 12:26:08 GMT"),
        }
    }

    #[test]
    fn redirect_has_location_and_no_body_headers() {
        let response = redirect("https://example.com/a/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/a/");
    }

    #[test]
    fn bad_location_degrades_to_not_found() {
        let response = redirect("https://exa\nmple.com/");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn content_encoding_only_when_compressed() {
        let zipped = content(&headers(true), Bytes::from_static(b"x"));
        assert_eq!(zipped.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(zipped.headers()[header::CACHE_CONTROL], "max-age=30");
        assert_eq!(
            zipped.headers()[header::LAST_MODIFIED],
            "Fri, 29 Nov 1974 12:26:08 GMT"
        );

        let plain = content(&headers(false), Bytes::from_static(b"x"));
        assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[test]
    fn api_error_is_json_200() {
        let response = api_error();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }
}
