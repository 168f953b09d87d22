//! Index page served for every trailing-slash path.
//!
//! The page is rendered once by a [`PageRenderer`], gzipped, and reused for
//! the life of the process.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::cache::compress;

/// Produces the HTML for the index page.
pub trait PageRenderer: Send + Sync + 'static {
    fn render(&self) -> BoxFuture<'_, Bytes>;
}

/// Minimal HTML shell.
#[derive(Debug, Clone)]
pub struct ShellRenderer {
    title: String,
}

impl ShellRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

impl PageRenderer for ShellRenderer {
    fn render(&self) -> BoxFuture<'_, Bytes> {
        let html = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{title}</title>\n</head>\n<body>\n<div id=\"app\"></div>\n\
             <script type=\"module\" src=\"/app.js\"></script>\n</body>\n</html>\n",
            title = escape_html(&self.title),
        );
        Box::pin(async move { Bytes::from(html) })
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// The rendered, encoded index document.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub data: Bytes,
    pub compressed: bool,
}

/// Lazily built singleton index page.
pub struct IndexPage {
    renderer: Arc<dyn PageRenderer>,
    document: OnceCell<IndexDocument>,
}

impl IndexPage {
    pub fn new(renderer: impl PageRenderer) -> Self {
        Self {
            renderer: Arc::new(renderer),
            document: OnceCell::new(),
        }
    }

    /// The page, rendering and compressing it on first use.
    ///
    /// Concurrent first callers share one render.
    pub async fn document(&self) -> &IndexDocument {
        self.document
            .get_or_init(|| async {
                let html = self.renderer.render().await;
                match compress::gzip(html.clone(), CancellationToken::new()).await {
                    Ok(data) => IndexDocument { data, compressed: true },
                    Err(e) => {
                        tracing::warn!(error = %e, "Index page compression failed, serving raw HTML");
                        IndexDocument { data: html, compressed: false }
                    }
                }
            })
            .await
    }

    pub fn is_built(&self) -> bool {
        self.document.initialized()
    }
}

impl std::fmt::Debug for IndexPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexPage")
            .field("built", &self.is_built())
            .finish()
    }
}
