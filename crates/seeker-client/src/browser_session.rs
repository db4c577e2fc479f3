use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use seeker_core::config::{SeekerConfig, SessionMode, SiteLayout};
use seeker_core::error::AppError;
use seeker_core::models::{ItemHandle, Locator};
use seeker_core::traits::{BrowserSession, SessionFactory};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How sessions are launched and where they start.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: SessionMode,
    pub window_size: (u32, u32),
    pub entry_url: String,
    /// Bound on page loads: the entry page, search submission and next-page navigation.
    pub navigation_timeout: Duration,
    pub interstitial_wait: Duration,
    pub layout: SiteLayout,
}

impl SessionOptions {
    pub fn from_config(config: &SeekerConfig) -> Self {
        Self {
            mode: config.session_mode,
            window_size: config.window_size,
            entry_url: config.entry_url.clone(),
            navigation_timeout: Duration::from_secs(30),
            interstitial_wait: config.interstitial_wait,
            layout: config.layout.clone(),
        }
    }
}

/// Launches one Chromium per crawl.
///
/// ```rust,no_run
/// use seeker_client::ChromeSessionFactory;
/// use seeker_core::{SeekerConfig, SessionFactory, BrowserSession};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let factory = ChromeSessionFactory::new(&SeekerConfig::default());
/// let mut session = factory.open().await?;
/// session.search("Software Developer", "Toronto, ON").await?;
/// session.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    options: SessionOptions,
}

impl ChromeSessionFactory {
    pub fn new(config: &SeekerConfig) -> Self {
        Self::with_options(SessionOptions::from_config(config))
    }

    pub fn with_options(options: SessionOptions) -> Self {
        Self { options }
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), AppError> {
        let (width, height) = self.options.window_size;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .window_size(width, height);

        // Snap-packaged Chromium wraps the real binary and drops unknown flags.
        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder = match self.options.mode {
            SessionMode::Headless => builder.arg("--headless=new").arg("--disable-gpu"),
            SessionMode::Interactive => builder.with_head(),
        };

        let config = builder
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::SessionInit(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::SessionInit(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok((browser, handler))
    }
}

impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn open(&self) -> Result<ChromeSession, AppError> {
        let (mut browser, handler) = self.launch().await?;
        tracing::info!(mode = %self.options.mode, url = %self.options.entry_url, "Browser launched");

        let url = self.options.entry_url.as_str();
        let page = match tokio::time::timeout(self.options.navigation_timeout, browser.new_page(url))
            .await
        {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                shutdown(&mut browser, handler).await;
                return Err(AppError::SessionInit(format!("Failed to open {url}: {e}")));
            }
            Err(_) => {
                shutdown(&mut browser, handler).await;
                return Err(AppError::SessionInit(format!(
                    "Timed out after {}s opening {url}",
                    self.options.navigation_timeout.as_secs()
                )));
            }
        };

        Ok(ChromeSession {
            browser,
            handler,
            page,
            options: self.options.clone(),
        })
    }
}

/// One Chromium window driven through the search site.
///
/// Result items are found again by index on every access, so a list that is
/// re-rendered between items does not leave stale element references behind.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    options: SessionOptions,
}

impl ChromeSession {
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, AppError> {
        let found = match locator {
            Locator::Css(selector) => self.page.find_elements(selector.as_str()).await,
            Locator::XPath(expr) => self.page.find_xpaths(expr.as_str()).await,
        };
        found.map_err(|e| AppError::Browser(format!("Lookup of {locator} failed: {e}")))
    }

    async fn first(&self, locator: &Locator) -> Result<Option<Element>, AppError> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    async fn require(&self, locator: &Locator) -> Result<Element, AppError> {
        self.first(locator)
            .await?
            .ok_or_else(|| AppError::Browser(format!("No element matches {locator}")))
    }

    /// Poll until `locator` matches, or `timeout` elapses.
    async fn poll_for(&self, locator: &Locator, timeout: Duration) -> Option<Element> {
        tokio::time::timeout(timeout, async {
            loop {
                if let Ok(Some(element)) = self.first(locator).await {
                    return element;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .ok()
    }

    async fn wait_for_load(&self, action: &str) -> Result<(), AppError> {
        let timeout = self.options.navigation_timeout;
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::Browser(format!("{action} did not load: {e}"))),
            Err(_) => Err(AppError::Browser(format!(
                "{action} did not load within {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), AppError> {
        let input = self
            .first(locator)
            .await
            .map_err(|e| AppError::SearchInput(e.to_string()))?
            .ok_or_else(|| AppError::SearchInput(format!("Search input {locator} not found")))?;

        let filled = async {
            input.click().await?;
            input
                .call_js_fn("function() { this.value = ''; }", false)
                .await?;
            input.type_str(value).await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        filled
            .await
            .map_err(|e| AppError::SearchInput(format!("Could not fill {locator}: {e}")))
    }
}

impl BrowserSession for ChromeSession {
    async fn search(&mut self, query: &str, location: &str) -> Result<(), AppError> {
        let layout = self.options.layout.clone();
        self.fill(&layout.query_input, query).await?;
        self.fill(&layout.location_input, location).await?;

        let submit = self
            .first(&layout.submit)
            .await
            .map_err(|e| AppError::SearchInput(e.to_string()))?
            .ok_or_else(|| {
                AppError::SearchInput(format!("Search button {} not found", layout.submit))
            })?;
        submit
            .click()
            .await
            .map_err(|e| AppError::SearchInput(format!("Could not submit search: {e}")))?;

        self.wait_for_load("Search results").await?;
        tracing::info!(%query, %location, "Search submitted");
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), AppError> {
        match self.poll_for(locator, timeout).await {
            Some(_) => Ok(()),
            None => Err(AppError::ElementTimeout {
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn current_item_handles(&mut self, locator: &Locator) -> Result<Vec<ItemHandle>, AppError> {
        let count = self.find_all(locator).await?.len();
        tracing::debug!(%locator, count, "Result items on page");
        Ok((0..count)
            .map(|index| ItemHandle {
                locator: locator.clone(),
                index,
            })
            .collect())
    }

    async fn open(&mut self, handle: &ItemHandle) -> Result<(), AppError> {
        let element = self
            .find_all(&handle.locator)
            .await?
            .into_iter()
            .nth(handle.index)
            .ok_or_else(|| {
                AppError::Browser(format!(
                    "Item {} of {} is no longer on the page",
                    handle.index, handle.locator
                ))
            })?;

        element
            .scroll_into_view()
            .await
            .map_err(|e| AppError::Browser(format!("Could not scroll to item {}: {e}", handle.index)))?;
        element
            .click()
            .await
            .map_err(|e| AppError::Browser(format!("Could not open item {}: {e}", handle.index)))?;
        Ok(())
    }

    async fn read_text(&mut self, locator: &Locator) -> Result<String, AppError> {
        let element = self.require(locator).await?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| AppError::Browser(format!("Could not read {locator}: {e}")))?;
        Ok(text.unwrap_or_default())
    }

    async fn dismiss_interstitial(&mut self) -> bool {
        let layout = &self.options.layout;
        if self
            .poll_for(&layout.interstitial, self.options.interstitial_wait)
            .await
            .is_none()
        {
            return false;
        }

        match self.first(&layout.interstitial_close).await {
            Ok(Some(close)) => match close.click().await {
                Ok(_) => {
                    tracing::info!("Dismissed interstitial");
                    true
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Interstitial close failed");
                    false
                }
            },
            Ok(None) => {
                tracing::debug!("Interstitial has no close control");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Interstitial close lookup failed");
                false
            }
        }
    }

    async fn find_next(&mut self) -> Result<Option<Locator>, AppError> {
        let next = &self.options.layout.next_page;
        let found = self.first(next).await?;
        Ok(found.map(|_| next.clone()))
    }

    async fn navigate(&mut self, next: &Locator) -> Result<(), AppError> {
        let control = self.require(next).await?;
        control
            .click()
            .await
            .map_err(|e| AppError::Browser(format!("Could not follow {next}: {e}")))?;
        self.wait_for_load("Next page").await
    }

    async fn close(self) {
        let ChromeSession {
            mut browser,
            handler,
            page,
            ..
        } = self;
        let _ = page.close().await;
        shutdown(&mut browser, handler).await;
        tracing::info!("Browser closed");
    }
}

async fn shutdown(browser: &mut Browser, handler: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        tracing::debug!(error = %e, "Browser close failed");
    }
    let _ = browser.wait().await;
    handler.abort();
}

/// Locate the real Chrome/Chromium binary, honouring `CHROME_BIN`.
///
/// Returns `None` to let `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
