pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod paginate;
pub mod parser;
pub mod report;
pub mod seeker;
pub mod store;
pub mod throttle;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{CachePolicy, RunCache};
pub use config::{SeekerConfig, SessionMode, SiteLayout};
pub use error::AppError;
pub use models::{
    ItemHandle, JobRecord, Locator, RunKind, ScrapeRun, SnapshotKey, SnapshotMeta, StopReason,
};
pub use paginate::{CrawlReport, PaginationEngine};
pub use parser::{RawListing, parse_record};
pub use report::{CrawlEvent, CrawlReporter, RunLogReporter, TracingCrawlReporter};
pub use seeker::{JobSeeker, RunOutcome, RunSource};
pub use store::FileSnapshotStore;
pub use throttle::ThrottleConfig;
pub use traits::{BrowserSession, SessionFactory, SnapshotStore};
