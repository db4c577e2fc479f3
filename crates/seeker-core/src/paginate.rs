//! Page-by-page, item-by-item crawl over a [`BrowserSession`].
//!
//! # States
//!
//! ```text
//! Idle --> FetchingPage --> ExtractingItems --> CheckingNext --[next, budget left]--> FetchingPage
//!               |                                    |
//!               +--[lookup error]--> Failed          +--[no next]--> Done(Exhausted)
//!                                                    +--[next, budget spent]--> Done(BudgetReached)
//!                                                    +--[check/navigate error]--> Failed
//! ```
//!
//! Only a failed search (or session start) ends a crawl with an error. Item
//! and page failures are reported and the crawl keeps what it extracted.

use std::time::{Duration, Instant};

use crate::config::{SeekerConfig, SiteLayout};
use crate::error::AppError;
use crate::models::{ItemHandle, JobRecord, StopReason};
use crate::parser::{RawListing, parse_record};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::throttle::ThrottleConfig;
use crate::traits::BrowserSession;

#[derive(Debug, Clone, PartialEq)]
enum CrawlState {
    Idle,
    FetchingPage,
    ExtractingItems(Vec<ItemHandle>),
    CheckingNext,
    Done(StopReason),
    Failed,
}

/// What a crawl produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    /// In listing order, page by page.
    pub records: Vec<JobRecord>,
    /// Pages fully processed; never more than the budget.
    pub pages_actual: u32,
    pub stop: StopReason,
}

/// Drives a session across result pages and parses every listing it opens.
#[derive(Debug, Clone)]
pub struct PaginationEngine {
    layout: SiteLayout,
    detail_timeout: Duration,
    throttle: ThrottleConfig,
}

impl PaginationEngine {
    pub fn new(layout: SiteLayout, detail_timeout: Duration, throttle: ThrottleConfig) -> Self {
        Self {
            layout,
            detail_timeout,
            throttle,
        }
    }

    pub fn from_config(config: &SeekerConfig) -> Self {
        Self::new(
            config.layout.clone(),
            config.detail_timeout,
            config.throttle.clone(),
        )
    }

    /// Submit the search, then page through results until the boundary or the budget.
    ///
    /// Returns `Err` only when the search itself cannot be submitted.
    pub async fn crawl<S, R>(
        &self,
        session: &mut S,
        query: &str,
        location: &str,
        pages_requested: u32,
        reporter: &R,
    ) -> Result<CrawlReport, AppError>
    where
        S: BrowserSession,
        R: CrawlReporter + ?Sized,
    {
        reporter.report(CrawlEvent::Started {
            query,
            location,
            pages_requested,
        });
        session.search(query, location).await?;

        let report = self.paginate(session, pages_requested, reporter).await;
        reporter.report(CrawlEvent::Finished {
            pages_actual: report.pages_actual,
            records: report.records.len(),
            stop: report.stop,
        });
        Ok(report)
    }

    /// Run the page state machine on a session whose search results are showing.
    pub async fn paginate<S, R>(
        &self,
        session: &mut S,
        pages_requested: u32,
        reporter: &R,
    ) -> CrawlReport
    where
        S: BrowserSession,
        R: CrawlReporter + ?Sized,
    {
        let mut records = Vec::new();
        let mut pages_done = 0u32;
        let mut page_started = Instant::now();
        let mut state = CrawlState::Idle;

        let stop = loop {
            state = match state {
                CrawlState::Idle if pages_requested == 0 => {
                    CrawlState::Done(StopReason::BudgetReached)
                }
                CrawlState::Idle => CrawlState::FetchingPage,
                CrawlState::FetchingPage => {
                    let page = pages_done + 1;
                    page_started = Instant::now();
                    reporter.report(CrawlEvent::PageStarted {
                        page,
                        pages_requested,
                    });
                    session.dismiss_interstitial().await;
                    match session.current_item_handles(&self.layout.result_items).await {
                        Ok(handles) => CrawlState::ExtractingItems(handles),
                        Err(error) => {
                            reporter.report(CrawlEvent::PageFailed {
                                page,
                                error: &error,
                            });
                            CrawlState::Failed
                        }
                    }
                }
                CrawlState::ExtractingItems(handles) => {
                    let page = pages_done + 1;
                    let before = records.len();
                    self.extract_page(session, page, &handles, &mut records, reporter)
                        .await;
                    pages_done = page;
                    reporter.report(CrawlEvent::PageCompleted {
                        page,
                        items: handles.len(),
                        extracted: records.len() - before,
                        elapsed: page_started.elapsed(),
                    });
                    CrawlState::CheckingNext
                }
                CrawlState::CheckingNext => {
                    session.dismiss_interstitial().await;
                    match session.find_next().await {
                        Ok(None) => CrawlState::Done(StopReason::Exhausted),
                        Ok(Some(_)) if pages_done >= pages_requested => {
                            CrawlState::Done(StopReason::BudgetReached)
                        }
                        Ok(Some(next)) => match session.navigate(&next).await {
                            Ok(()) => CrawlState::FetchingPage,
                            Err(error) => {
                                reporter.report(CrawlEvent::NextCheckFailed {
                                    page: pages_done,
                                    error: &error,
                                });
                                CrawlState::Failed
                            }
                        },
                        Err(error) => {
                            reporter.report(CrawlEvent::NextCheckFailed {
                                page: pages_done,
                                error: &error,
                            });
                            CrawlState::Failed
                        }
                    }
                }
                CrawlState::Done(stop) => break stop,
                CrawlState::Failed => break StopReason::Failed,
            };
        };

        CrawlReport {
            records,
            pages_actual: pages_done,
            stop,
        }
    }

    /// Extract every item on the current page into `records`.
    ///
    /// A detail-view timeout abandons the rest of the page; any other item error
    /// skips just that item.
    async fn extract_page<S, R>(
        &self,
        session: &mut S,
        page: u32,
        handles: &[ItemHandle],
        records: &mut Vec<JobRecord>,
        reporter: &R,
    ) where
        S: BrowserSession,
        R: CrawlReporter + ?Sized,
    {
        for (index, handle) in handles.iter().enumerate() {
            if index > 0 {
                self.throttle.pause().await;
            }
            match self.extract_item(session, handle).await {
                Ok(record) => records.push(record),
                Err(error) if error.is_timeout() => {
                    reporter.report(CrawlEvent::PageAborted {
                        page,
                        index,
                        remaining: handles.len() - index - 1,
                        error: &error,
                    });
                    break;
                }
                Err(error) => {
                    reporter.report(CrawlEvent::ItemSkipped {
                        page,
                        index,
                        error: &error,
                    });
                }
            }
        }
    }

    async fn extract_item<S: BrowserSession>(
        &self,
        session: &mut S,
        handle: &ItemHandle,
    ) -> Result<JobRecord, AppError> {
        session.open(handle).await?;
        session
            .wait_for(&self.layout.detail_container, self.detail_timeout)
            .await?;

        let title = session.read_text(&self.layout.title).await?;
        let company = session.read_text(&self.layout.company).await?;
        let location = session.read_text(&self.layout.location).await?;
        let description = session.read_text(&self.layout.description).await?;
        let info_block = session.read_text(&self.layout.info_block).await?;

        Ok(parse_record(&RawListing {
            title: &title,
            company: &company,
            location: &location,
            description: &description,
            info_block: &info_block,
        }))
    }
}
