//! Request classification.
//!
//! # Responsibilities
//! - Split a request target into path, query and extension
//! - Assign exactly one route kind, in strict priority order
//! - Resolve MIME type, compressibility and file location
//!
//! # Design Decisions
//! - Pure function of (target, host, client); no I/O
//! - Prefix matching only, first match wins
//! - Malformed input degrades to `NotFound`, never errors

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use crate::routing::mime;
use crate::routing::query::{parse_query, QueryMap};

const API_USER_PREFIX: &str = "/api/v1/";
const API_APP_PREFIX: &str = "/api/app/";
const API_ADMIN_PREFIX: &str = "/api/admin/";
const ADMIN_UI_PREFIX: &str = "/_admin_/";

/// The single terminal action a request is routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// Canonicalize to the trailing-slash, https form.
    Redirect { location: String },
    ApiUser,
    ApiApp,
    ApiAdmin,
    AdminUi,
    /// A file under the public directory.
    StaticFile { file: PathBuf },
    Index,
    NotFound,
}

impl RouteKind {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RouteKind::Redirect { .. } => "redirect",
            RouteKind::ApiUser => "api-user",
            RouteKind::ApiApp => "api-app",
            RouteKind::ApiAdmin => "api-admin",
            RouteKind::AdminUi => "admin-ui",
            RouteKind::StaticFile { .. } => "static-file",
            RouteKind::Index => "index",
            RouteKind::NotFound => "not-found",
        }
    }
}

/// Structured classification of one request.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub path: String,
    pub raw_query: String,
    pub extension: String,
    pub query: QueryMap,
    pub route: RouteKind,
    pub mime: &'static str,
    pub compressible: bool,
    pub client: Option<SocketAddr>,
}

impl RouteDescriptor {
    /// Whether the request asks to bypass the content cache.
    pub fn bypasses_cache(&self, param: &str) -> bool {
        self.query.get(param).is_some_and(|v| !v.is_empty())
    }
}

/// Turns request targets into [`RouteDescriptor`]s.
#[derive(Debug, Clone)]
pub struct Classifier {
    public_dir: PathBuf,
    server_name: String,
}

impl Classifier {
    /// Create a classifier rooted at `public_dir`.
    ///
    /// `server_name` stands in for the host when a request has none.
    pub fn new(public_dir: impl Into<PathBuf>, server_name: impl Into<String>) -> Self {
        Self {
            public_dir: public_dir.into(),
            server_name: server_name.into(),
        }
    }

    /// Classify a request target such as `/css/site.css?v=2`.
    pub fn classify(
        &self,
        target: &str,
        host: Option<&str>,
        client: Option<SocketAddr>,
    ) -> RouteDescriptor {
        let (path, raw_query) = target.split_once('?').unwrap_or((target, ""));
        let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

        let route = self.route_for(path, raw_query, host);

        let mime = match route {
            RouteKind::Index => mime::HTML,
            _ => mime::resolve(extension),
        };

        RouteDescriptor {
            path: path.to_string(),
            raw_query: raw_query.to_string(),
            extension: extension.to_string(),
            query: parse_query(raw_query),
            route,
            mime,
            compressible: mime::is_compressible(mime),
            client,
        }
    }

    fn route_for(&self, path: &str, raw_query: &str, host: Option<&str>) -> RouteKind {
        let is_index = path.ends_with('/');
        let is_file = path.contains('.');
        let is_api_user = path.starts_with(API_USER_PREFIX);
        let is_api_app = path.starts_with(API_APP_PREFIX);
        let is_api_admin = path.starts_with(API_ADMIN_PREFIX);
        let is_admin = path.starts_with(ADMIN_UI_PREFIX);

        if !(is_index || is_file || is_api_user || is_api_app || is_api_admin || is_admin) {
            let host = host.filter(|h| !h.is_empty()).unwrap_or(&self.server_name);
            return RouteKind::Redirect {
                location: redirect_target(host, path, raw_query),
            };
        }

        if is_api_user {
            RouteKind::ApiUser
        } else if is_api_app {
            RouteKind::ApiApp
        } else if is_api_admin {
            RouteKind::ApiAdmin
        } else if is_admin {
            RouteKind::AdminUi
        } else if is_file {
            match self.resolve_file(path) {
                Some(file) => RouteKind::StaticFile { file },
                None => RouteKind::NotFound,
            }
        } else if is_index {
            RouteKind::Index
        } else {
            RouteKind::NotFound
        }
    }

    /// Map a URL path onto the public directory.
    ///
    /// Only plain path segments are accepted; `..`, `.` and root components
    /// after the leading slash reject the path.
    fn resolve_file(&self, path: &str) -> Option<PathBuf> {
        let relative = path.strip_prefix('/')?;
        let relative = Path::new(relative);

        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain || relative.as_os_str().is_empty() {
            return None;
        }

        Some(self.public_dir.join(relative))
    }
}

fn redirect_target(host: &str, path: &str, raw_query: &str) -> String {
    if raw_query.is_empty() {
        format!("https://{host}{path}/")
    } else {
        format!("https://{host}{path}/?{raw_query}")
    }
}
