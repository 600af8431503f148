//! Rendering capability
//!
//! The pipeline only needs three things from a renderer: load a page with a
//! navigation timeout, nudge lazy content into existence, and hand back the
//! serialized document. Everything past that is done in Rust over the
//! returned markup.
//!
//! [`HttpRenderer`] is the shipped implementation. It loads documents over
//! plain HTTP, so there is no script execution and scrolling has nothing to
//! trigger.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch renderer: {0}")]
    Launch(String),

    #[error("Navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u128 },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
}

/// When and how long to wait for a page to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Hard ceiling for the whole navigation
    pub timeout: Duration,
    /// Quiet period after which the network counts as idle
    pub idle: Duration,
}

/// A page opened by a [`Renderer`]
#[async_trait]
pub trait RenderedPage: Send {
    /// Scrolls to the bottom of the document in `step_px` increments, then
    /// back to the top. Callers bound this with their own timeout.
    async fn scroll_through(&mut self, step_px: u32, interval: Duration)
        -> Result<(), RenderError>;

    /// Serialized markup of the current document
    async fn content(&mut self) -> Result<String, RenderError>;

    async fn close(self: Box<Self>);
}

/// One isolated rendering engine instance
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(
        &self,
        url: &Url,
        options: NavigateOptions,
    ) -> Result<Box<dyn RenderedPage>, RenderError>;

    /// Tears the instance down; called once per execution, success or failure
    async fn close(&self);
}

/// Launches a fresh renderer for each job execution
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError>;
}

/// Launches [`HttpRenderer`]s sharing one HTTP client
#[derive(Clone)]
pub struct HttpRendererFactory {
    client: Client,
}

impl HttpRendererFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RendererFactory for HttpRendererFactory {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        Ok(Box::new(HttpRenderer {
            client: self.client.clone(),
        }))
    }
}

/// Renderer that loads static documents over HTTP
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    async fn load(&self, url: &Url, idle: Duration) -> Result<String, RenderError> {
        let navigation_error = |reason: String| RenderError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(navigation_error(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        // Body fully received; nothing else is in flight for a static document.
        tokio::time::sleep(idle).await;
        Ok(body)
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn open(
        &self,
        url: &Url,
        options: NavigateOptions,
    ) -> Result<Box<dyn RenderedPage>, RenderError> {
        let html = tokio::time::timeout(options.timeout, self.load(url, options.idle))
            .await
            .map_err(|_| RenderError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: options.timeout.as_millis(),
            })??;

        Ok(Box::new(StaticPage { html }))
    }

    async fn close(&self) {}
}

/// A fully loaded static document
struct StaticPage {
    html: String,
}

#[async_trait]
impl RenderedPage for StaticPage {
    async fn scroll_through(
        &mut self,
        _step_px: u32,
        _interval: Duration,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) {}
}
