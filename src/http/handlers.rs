//! Hooks for the user, admin and admin-UI surfaces.
//!
//! Their business logic lives outside the gateway; the default
//! implementation answers every request with an empty 404.

use axum::body::Body;
use axum::http::Response;
use futures_util::future::BoxFuture;

use crate::http::response;
use crate::routing::RouteDescriptor;

/// Handlers for routes the gateway only forwards to.
pub trait ExternalHandlers: Send + Sync + 'static {
    /// `/api/v1/*`
    fn api_user<'a>(&'a self, descriptor: &'a RouteDescriptor) -> BoxFuture<'a, Response<Body>> {
        unhandled("api-user", descriptor)
    }

    /// `/api/admin/*`
    fn api_admin<'a>(&'a self, descriptor: &'a RouteDescriptor) -> BoxFuture<'a, Response<Body>> {
        unhandled("api-admin", descriptor)
    }

    /// `/_admin_/*`
    fn admin_ui<'a>(&'a self, descriptor: &'a RouteDescriptor) -> BoxFuture<'a, Response<Body>> {
        unhandled("admin-ui", descriptor)
    }
}

/// Uses every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedHandlers;

impl ExternalHandlers for UnimplementedHandlers {}

fn unhandled<'a>(route: &'static str, descriptor: &'a RouteDescriptor) -> BoxFuture<'a, Response<Body>> {
    Box::pin(async move {
        tracing::debug!(route, path = %descriptor.path, "No handler installed");
        response::not_found()
    })
}
