use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use url::Url;

use crate::error::AppError;
use crate::models::Locator;
use crate::throttle::ThrottleConfig;

/// Default search entry page.
pub const DEFAULT_ENTRY_URL: &str = "https://ca.indeed.com/browsejobs";

/// Whether the browser runs with a visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Headless,
    /// Windowed, for watching a crawl while debugging.
    Interactive,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Headless => write!(f, "headless"),
            SessionMode::Interactive => write!(f, "interactive"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "headless" | "prod" => Ok(SessionMode::Headless),
            "interactive" | "dev" => Ok(SessionMode::Interactive),
            _ => Err(format!("Unknown session mode: {s}")),
        }
    }
}

/// Where things live on the search site.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    pub query_input: Locator,
    pub location_input: Locator,
    pub submit: Locator,
    /// One match per result item on a listing page.
    pub result_items: Locator,
    /// Appears once an item's detail view has loaded.
    pub detail_container: Locator,
    /// Container whose full text is the listing's info block.
    pub info_block: Locator,
    pub title: Locator,
    pub company: Locator,
    pub location: Locator,
    pub description: Locator,
    pub interstitial: Locator,
    pub interstitial_close: Locator,
    pub next_page: Locator,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            query_input: Locator::css("#what"),
            location_input: Locator::css("#where"),
            submit: Locator::css("#fj"),
            result_items: Locator::xpath("//a[@data-tn-element='jobTitle']"),
            detail_container: Locator::css("#vjs-container"),
            info_block: Locator::css("#vjs-jobinfo"),
            title: Locator::css("#vjs-jobtitle"),
            company: Locator::css("#vjs-cn"),
            location: Locator::css("#vjs-loc"),
            description: Locator::css("#vjs-desc"),
            interstitial: Locator::css("#popover-foreground"),
            interstitial_close: Locator::xpath("//button[@aria-label='Close']"),
            next_page: Locator::xpath("//a[@aria-label='Next']"),
        }
    }
}

/// Everything the orchestrator needs, supplied at construction.
#[derive(Debug, Clone)]
pub struct SeekerConfig {
    /// Page the session opens before searching.
    pub entry_url: String,
    pub session_mode: SessionMode,
    /// Browser viewport; the site decides how many listings fit on a page from it.
    pub window_size: (u32, u32),
    /// Page budget when the caller does not give one.
    pub default_pages: u32,
    /// Snapshots older than this are not reused.
    pub staleness: TimeDelta,
    /// Snapshots kept per (query, location).
    pub retention: usize,
    /// Bounded wait for an item's detail view.
    pub detail_timeout: Duration,
    /// How long to look for an overlay before giving up on it.
    pub interstitial_wait: Duration,
    pub throttle: ThrottleConfig,
    /// Root of the file snapshot store.
    pub data_dir: PathBuf,
    /// Per-crawl log files go here; `None` logs through tracing only.
    pub log_dir: Option<PathBuf>,
    pub layout: SiteLayout,
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            session_mode: SessionMode::Headless,
            window_size: (1920, 1080),
            default_pages: 120,
            staleness: TimeDelta::hours(20),
            retention: 5,
            detail_timeout: Duration::from_secs(5),
            interstitial_wait: Duration::from_secs(2),
            throttle: ThrottleConfig::default(),
            data_dir: PathBuf::from("data"),
            log_dir: Some(PathBuf::from("logs")),
            layout: SiteLayout::default(),
        }
    }
}

impl SeekerConfig {
    /// Defaults overridden by `SEEKER_*` environment variables.
    ///
    /// - `SEEKER_ENTRY_URL`
    /// - `SEEKER_MODE` (`headless` | `interactive`)
    /// - `SEEKER_PAGES`
    /// - `SEEKER_STALE_HOURS`
    /// - `SEEKER_RETENTION`
    /// - `SEEKER_DATA_DIR`
    /// - `SEEKER_LOG_DIR`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(url) = lookup("SEEKER_ENTRY_URL") {
            config.entry_url = url;
        }
        if let Some(raw) = lookup("SEEKER_MODE") {
            config.session_mode = raw
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid SEEKER_MODE: {e}")))?;
        }
        if let Some(raw) = lookup("SEEKER_PAGES") {
            config.default_pages = parse_positive("SEEKER_PAGES", &raw)?;
        }
        if let Some(raw) = lookup("SEEKER_STALE_HOURS") {
            config.staleness = TimeDelta::hours(parse_positive("SEEKER_STALE_HOURS", &raw)?.into());
        }
        if let Some(raw) = lookup("SEEKER_RETENTION") {
            config.retention = parse_positive("SEEKER_RETENTION", &raw)? as usize;
        }
        if let Some(dir) = lookup("SEEKER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SEEKER_LOG_DIR") {
            config.log_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_entry_url(mut self, url: impl Into<String>) -> Self {
        self.entry_url = url.into();
        self
    }

    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    pub fn with_default_pages(mut self, pages: u32) -> Self {
        self.default_pages = pages;
        self
    }

    pub fn with_staleness(mut self, staleness: TimeDelta) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    pub fn with_layout(mut self, layout: SiteLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Check the values that cannot be enforced by their types.
    pub fn validate(&self) -> Result<(), AppError> {
        let url = Url::parse(&self.entry_url)
            .map_err(|e| AppError::Config(format!("Invalid entry URL '{}': {e}", self.entry_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "Entry URL scheme '{}' is not allowed (only http/https)",
                url.scheme()
            )));
        }
        if self.default_pages == 0 {
            return Err(AppError::Config("Default page budget must be at least 1".into()));
        }
        if self.retention == 0 {
            return Err(AppError::Config("Retention must keep at least 1 snapshot".into()));
        }
        if self.staleness <= TimeDelta::zero() {
            return Err(AppError::Config("Staleness threshold must be positive".into()));
        }
        Ok(())
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u32, AppError> {
    let parsed: u32 = raw.trim().parse().map_err(|_| {
        AppError::Config(format!("Invalid {name} '{raw}': must be a positive integer"))
    })?;
    if parsed == 0 {
        return Err(AppError::Config(format!("{name} must be at least 1")));
    }
    Ok(parsed)
}
