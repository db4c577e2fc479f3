use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One extracted job listing.
///
/// Built once by [`crate::parser::parse_record`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    /// Location with any leading separator stripped.
    pub location: String,
    pub description: String,
    pub salary_base: Option<Decimal>,
    /// Only ever set together with `salary_base`.
    pub salary_upper: Option<Decimal>,
    /// Hyphen-joined employment type terms, e.g. `"Full-time"` or `"Contract-Remote"`.
    pub employment_type: Option<String>,
    /// The employer is marked as responding to applications.
    pub responsive: bool,
}

impl JobRecord {
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Short human-readable summary, without the description.
    pub fn overview(&self) -> String {
        let mut out = format!(
            "Title: {}\nCompany: {} | Location: {}\n",
            self.title, self.company, self.location
        );
        if let Some(base) = &self.salary_base {
            out.push_str(&format!("Salary base: {base}\n"));
        }
        if let Some(upper) = &self.salary_upper {
            out.push_str(&format!("Salary upper: {upper}\n"));
        }
        if let Some(kind) = &self.employment_type {
            out.push_str(&format!("Job-Type: {kind}\n"));
        }
        if self.responsive {
            out.push_str("Responsive: true\n");
        }
        out
    }
}

/// Whether a run is known to cover every page the search can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    /// The crawl hit the pagination boundary.
    #[serde(rename = "maxscrape")]
    Full,
    /// The crawl stopped on its page budget or on a failure.
    #[serde(rename = "scrape")]
    Partial,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Full => "maxscrape",
            RunKind::Partial => "scrape",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maxscrape" => Ok(RunKind::Full),
            "scrape" => Ok(RunKind::Partial),
            _ => Err(format!("Unknown run kind: {s}")),
        }
    }
}

/// Why the pagination engine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No next-page control was found: the pagination boundary.
    Exhausted,
    /// `pages_requested` pages were processed and a next page still existed.
    BudgetReached,
    /// Listing lookup or next-page check failed part way through.
    Failed,
}

impl StopReason {
    pub fn run_kind(&self) -> RunKind {
        match self {
            StopReason::Exhausted => RunKind::Full,
            StopReason::BudgetReached | StopReason::Failed => RunKind::Partial,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Exhausted => "pagination boundary",
            StopReason::BudgetReached => "page budget reached",
            StopReason::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Cache key for a (query, location) pair: `{query}-{location}`, trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotKey(String);

impl SnapshotKey {
    pub fn new(query: &str, location: &str) -> Self {
        Self(format!(
            "{}-{}",
            query.trim().to_lowercase(),
            location.trim().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One crawl outcome, as persisted by the run cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub id: Uuid,
    pub query: String,
    pub location: String,
    pub pages_requested: u32,
    /// Never greater than `pages_requested`.
    pub pages_actual: u32,
    pub created_at: DateTime<Utc>,
    /// In extraction order.
    pub records: Vec<JobRecord>,
    pub kind: RunKind,
}

impl ScrapeRun {
    pub fn new(
        query: impl Into<String>,
        location: impl Into<String>,
        pages_requested: u32,
        pages_actual: u32,
        records: Vec<JobRecord>,
        stop: StopReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            location: location.into(),
            pages_requested,
            pages_actual: pages_actual.min(pages_requested),
            created_at: Utc::now(),
            records,
            kind: stop.run_kind(),
        }
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(&self.query, &self.location)
    }

    /// Metadata stored alongside the payload.
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id,
            key: self.key(),
            query: self.query.clone(),
            location: self.location.clone(),
            kind: self.kind,
            created_at: self.created_at,
            pages_requested: self.pages_requested,
            pages_actual: self.pages_actual,
            record_count: self.records.len(),
        }
    }
}

/// Structured snapshot metadata, readable without loading the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: Uuid,
    pub key: SnapshotKey,
    pub query: String,
    pub location: String,
    pub kind: RunKind,
    pub created_at: DateTime<Utc>,
    pub pages_requested: u32,
    pub pages_actual: u32,
    pub record_count: usize,
}

/// How to find an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// A result item on the current page: the `index`-th match of `locator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    pub locator: Locator,
    pub index: usize,
}
