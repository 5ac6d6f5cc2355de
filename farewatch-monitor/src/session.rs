use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use farewatch_core::extraction::{Browser, BrowserLauncher, ExtractionError, ExtractionPage, LaunchError};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("Failed to open page: {0}")]
    Page(ExtractionError),
}

/// An open page borrowed from the pool. Hand it back with [`BrowserPool::release`].
pub struct PageSession {
    page: Box<dyn ExtractionPage>,
}

impl Deref for PageSession {
    type Target = dyn ExtractionPage;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl DerefMut for PageSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.page.as_mut()
    }
}

/// Keeps one shared automation browser alive and hands out isolated pages.
///
/// The browser is launched lazily and relaunched when it reports itself
/// disconnected. Callers arriving while a launch is in flight wait on the
/// slot lock and reuse the result instead of launching again.
pub struct BrowserPool {
    launcher: Arc<dyn BrowserLauncher>,
    browser: Mutex<Option<Arc<dyn Browser>>>,
    open_sessions: AtomicUsize,
}

impl BrowserPool {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            browser: Mutex::new(None),
            open_sessions: AtomicUsize::new(0),
        }
    }

    async fn connected_browser(&self) -> Result<Arc<dyn Browser>, LaunchError> {
        let mut slot = self.browser.lock().await;

        if let Some(browser) = slot.as_ref() {
            if browser.is_connected().await {
                return Ok(browser.clone());
            }
            warn!("Browser disconnected, relaunching");
        }

        info!("Launching automation browser");
        let browser = self.launcher.launch().await?;
        *slot = Some(browser.clone());
        Ok(browser)
    }

    async fn discard_browser(&self) {
        let previous = self.browser.lock().await.take();
        if let Some(browser) = previous {
            browser.close().await;
        }
    }

    /// Open a fresh page. A page that cannot be created gets one retry on a
    /// relaunched browser.
    pub async fn acquire(&self) -> Result<PageSession, PoolError> {
        let browser = self.connected_browser().await?;

        let page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to open page ({}), relaunching browser", e);
                self.discard_browser().await;
                let browser = self.connected_browser().await?;
                browser.new_page().await.map_err(PoolError::Page)?
            }
        };

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(PageSession { page })
    }

    /// Close the page of a finished attempt
    pub async fn release(&self, mut session: PageSession) {
        session.page.close().await;
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }

    /// Pages acquired and not yet released
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub async fn shutdown(&self) {
        info!("Closing automation browser");
        self.discard_browser().await;
    }
}
