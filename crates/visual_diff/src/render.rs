//! Headless Chromium rendering of markup files.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, EventLifecycleEvent, NavigateParams,
    SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use log::{debug, info, warn};
use std::env;
use std::path::{Path, PathBuf};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use url::Url;

use crate::config::VisualDiffConfig;
use crate::error::{Result, VisualDiffError};
use crate::raster::Raster;
use crate::viewport::Viewport;

const NETWORK_IDLE: &str = "networkIdle";

/// The document a navigation committed: its frame and, for cross-document
/// navigations, its loader.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Navigation {
    frame_id: String,
    loader_id: Option<String>,
}

impl Navigation {
    /// Whether a lifecycle event named `name` reports this navigation's
    /// document as network idle. Events from the previous document share the
    /// frame but carry an older loader.
    fn is_idle(&self, name: &str, frame_id: &str, loader_id: &str) -> bool {
        name == NETWORK_IDLE
            && frame_id == self.frame_id
            && self.loader_id.as_deref().is_none_or(|loader| loader == loader_id)
    }
}

/// Something that can turn a markup file into a raster at a given viewport.
pub trait MarkupRenderer {
    /// Render `markup` and capture the visible viewport.
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::RenderFailure`] when rendering fails.
    fn render(&self, markup: &Path, viewport: Viewport) -> impl Future<Output = Result<Raster>> + Send;
}

/// Converts a local path into a `file://` URL.
///
/// # Errors
///
/// Returns [`VisualDiffError::RenderFailure`] if the path cannot be expressed
/// as a URL.
pub fn to_file_url(path: &Path) -> Result<Url> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&canonical)
        .map_err(|()| VisualDiffError::render(format!("invalid file path for URL: {}", canonical.display())))
}

/// Finds a Chrome or Chromium binary: `CHROME_BIN` first, then `PATH`.
pub fn find_chrome_executable() -> Option<PathBuf> {
    if let Ok(path) = env::var("CHROME_BIN")
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    let path_var = env::var_os("PATH")?;
    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .iter()
        .flat_map(|name| env::split_paths(&path_var).map(move |dir| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Launches a fresh headless browser per render.
#[derive(Clone, Debug)]
pub struct ChromeRenderer {
    config: VisualDiffConfig,
}

impl ChromeRenderer {
    pub const fn new(config: VisualDiffConfig) -> Self {
        Self { config }
    }

    async fn launch(&self, viewport: Viewport) -> Result<(Browser, JoinHandle<()>)> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(viewport.width, viewport.height)
            .arg("--hide-scrollbars")
            .arg("--allow-file-access-from-files")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-sync");
        if let Some(executable) = self.config.chrome_executable.clone().or_else(find_chrome_executable) {
            debug!("[VISUAL] Using browser binary {}", executable.display());
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder.build().map_err(VisualDiffError::render)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(VisualDiffError::render)?;
        let handler_task = spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!("[VISUAL] Browser event error: {err}");
                }
            }
        });
        Ok((browser, handler_task))
    }

    async fn capture(&self, page: &Page, markup: &Path, viewport: Viewport) -> Result<Raster> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(viewport.device_scale_factor)
            .mobile(false)
            .build()
            .map_err(VisualDiffError::render)?;
        page.execute(metrics).await.map_err(VisualDiffError::render)?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(VisualDiffError::render)?;

        // Subscribe before navigating so the idle event cannot be missed.
        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(VisualDiffError::render)?;

        let url = to_file_url(markup)?;
        info!(
            "[VISUAL] Rendering {url} at {}x{} @{}x",
            viewport.width, viewport.height, viewport.device_scale_factor
        );
        let navigated = page
            .execute(NavigateParams::new(url.as_str()))
            .await
            .map_err(VisualDiffError::render)?;
        if let Some(error_text) = navigated.error_text.as_deref() {
            return Err(VisualDiffError::render(format!("navigation to {url} failed: {error_text}")));
        }
        let navigation = Navigation {
            frame_id: navigated.frame_id.inner().clone(),
            loader_id: navigated.loader_id.as_ref().map(|loader| loader.inner().clone()),
        };

        let idle = async {
            while let Some(event) = lifecycle.next().await {
                if navigation.is_idle(&event.name, event.frame_id.inner(), event.loader_id.inner()) {
                    return true;
                }
            }
            false
        };
        match timeout(self.config.network_idle_timeout(), idle).await {
            Ok(true) => debug!("[VISUAL] Network idle"),
            Ok(false) => warn!("[VISUAL] Lifecycle stream ended before network idle"),
            Err(_) => warn!(
                "[VISUAL] No network idle within {}ms, capturing anyway",
                self.config.network_idle_timeout_ms
            ),
        }
        sleep(self.config.settle_delay()).await;

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let response = page.execute(params).await.map_err(VisualDiffError::render)?;
        let base64_str: &str = response.data.as_ref();
        let bytes = BASE64_STANDARD
            .decode(base64_str)
            .map_err(|err| VisualDiffError::render(format!("failed to decode screenshot: {err}")))?;
        Raster::decode(&bytes, "browser screenshot")
    }
}

impl MarkupRenderer for ChromeRenderer {
    async fn render(&self, markup: &Path, viewport: Viewport) -> Result<Raster> {
        let (mut browser, handler_task) = self.launch(viewport).await?;
        let captured = match browser.new_page("about:blank").await {
            Ok(page) => self.capture(&page, markup, viewport).await,
            Err(err) => Err(VisualDiffError::render(err)),
        };
        if let Err(err) = browser.close().await {
            debug!("[VISUAL] Browser close failed: {err}");
        }
        handler_task.abort();
        captured
    }
}
