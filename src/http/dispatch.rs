//! Per-request dispatch.
//!
//! # Responsibilities
//! - Map a classified request to exactly one terminal action
//! - Own the context objects those actions need (cache, registrar, index)
//!
//! # Design Decisions
//! - Every branch returns a complete response; the stream ends once
//! - Failures never surface as 5xx: fetch errors are 404, query errors are
//!   the fixed JSON fallback under 200

use axum::body::Body;
use axum::http::{HeaderValue, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ContentCache, Lookup};
use crate::config::GatewayConfig;
use crate::http::handlers::{ExternalHandlers, UnimplementedHandlers};
use crate::http::index::{IndexPage, PageRenderer, ShellRenderer};
use crate::http::response::{self, ContentHeaders};
use crate::registrar::Registrar;
use crate::routing::{RouteDescriptor, RouteKind};

const DEFAULT_LAST_MODIFIED: &str = "Fri, 29 Nov 1974 12:26:08 GMT";

/// Carries out the action a [`RouteDescriptor`] selects.
pub struct Dispatcher {
    cache: ContentCache,
    registrar: Registrar,
    index: IndexPage,
    handlers: Arc<dyn ExternalHandlers>,
    bypass_param: String,
    cached_max_age: u32,
    fresh_max_age: u32,
    last_modified: HeaderValue,
    app_topic: String,
    query_timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &GatewayConfig, cache: ContentCache, registrar: Registrar) -> Self {
        let last_modified = HeaderValue::from_str(&config.content.last_modified).unwrap_or_else(|_| {
            tracing::warn!(
                value = %config.content.last_modified,
                "Invalid last_modified value, using default"
            );
            HeaderValue::from_static(DEFAULT_LAST_MODIFIED)
        });

        Self {
            cache,
            registrar,
            index: IndexPage::new(ShellRenderer::new(config.content.index_title.clone())),
            handlers: Arc::new(UnimplementedHandlers),
            bypass_param: config.content.bypass_param.clone(),
            cached_max_age: config.content.cached_max_age,
            fresh_max_age: config.content.fresh_max_age,
            last_modified,
            app_topic: config.registrar.app_topic.clone(),
            query_timeout: Duration::from_millis(config.registrar.timeout_ms),
        }
    }

    /// Replace the index page renderer.
    pub fn with_renderer(mut self, renderer: impl PageRenderer) -> Self {
        self.index = IndexPage::new(renderer);
        self
    }

    /// Install handlers for the user/admin surfaces.
    pub fn with_handlers(mut self, handlers: impl ExternalHandlers) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    pub async fn dispatch(&self, descriptor: &RouteDescriptor) -> Response<Body> {
        match &descriptor.route {
            RouteKind::Redirect { location } => response::redirect(location),
            RouteKind::StaticFile { file } => self.static_file(descriptor, file).await,
            RouteKind::Index => self.index(descriptor).await,
            RouteKind::ApiApp => self.api_app(descriptor).await,
            RouteKind::ApiUser => self.handlers.api_user(descriptor).await,
            RouteKind::ApiAdmin => self.handlers.api_admin(descriptor).await,
            RouteKind::AdminUi => self.handlers.admin_ui(descriptor).await,
            RouteKind::NotFound => response::not_found(),
        }
    }

    async fn static_file(&self, descriptor: &RouteDescriptor, file: &std::path::Path) -> Response<Body> {
        let bypass = descriptor.bypasses_cache(&self.bypass_param);

        let lookup = match self
            .cache
            .load(&descriptor.path, file, descriptor.compressible, bypass)
            .await
        {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::debug!(
                    path = %descriptor.path,
                    reason = e.kind(),
                    error = %e,
                    "Static file not served"
                );
                return response::not_found();
            }
        };

        let max_age = match &lookup {
            Lookup::Hit(_) => self.cached_max_age,
            Lookup::Fetched(_) if bypass => 0,
            Lookup::Fetched(_) => self.fresh_max_age,
        };

        let entry = lookup.entry();
        let headers = ContentHeaders {
            mime: descriptor.mime,
            compressed: entry.compressed,
            max_age,
            last_modified: self.last_modified.clone(),
        };

        response::content(&headers, entry.data.clone())
    }

    async fn index(&self, descriptor: &RouteDescriptor) -> Response<Body> {
        let document = self.index.document().await;
        let max_age = if descriptor.bypasses_cache(&self.bypass_param) {
            0
        } else {
            self.fresh_max_age
        };

        let headers = ContentHeaders {
            mime: descriptor.mime,
            compressed: document.compressed,
            max_age,
            last_modified: self.last_modified.clone(),
        };

        response::content(&headers, document.data.clone())
    }

    async fn api_app(&self, descriptor: &RouteDescriptor) -> Response<Body> {
        match self
            .registrar
            .query(&self.app_topic, &descriptor.query, self.query_timeout)
            .await
        {
            Ok(body) => response::json(body),
            Err(_) => response::api_error(),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache", &self.cache)
            .field("registrar", &self.registrar)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
