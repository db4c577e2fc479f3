//! Heuristic parser for a listing's free-text info block.
//!
//! The info block ends with an "extras" line such as
//! `$80,000 - $100,000 a year - Full-time`, optionally followed by a
//! `Responded to ...` line. The parser pulls salary amounts and employment
//! type terms out of that line. It is a best-effort classifier: anything it
//! does not recognise is dropped and the matching fields stay unset.
//!
//! Salary slots are filled by the amounts that parse, in order. A currency
//! token with no readable number is skipped, so the next amount becomes the
//! base and an upper bound is never set without a base.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::models::JobRecord;

/// Prefix of the terminal line marking an employer as responsive.
pub const RESPONDED_MARKER: &str = "Responded";

/// Marks a token as a salary amount.
pub const CURRENCY_MARKER: char = '$';

/// Separates tokens in the extras line.
pub const EXTRAS_DELIMITER: &str = "-";

/// Recognised employment type terms, matched case-sensitively.
pub const EMPLOYMENT_TYPES: &[&str] = &[
    "Full-time",
    "Freelance",
    "Apprenticeship",
    "Volunteer",
    "Casual",
    "Comission",
    "Fly-In/Fly-Out",
    "Contract",
    "Part-time",
    "Permanent",
    "Internship",
    "Temporary",
    "Temporarily remote",
    "Remote",
];

/// Text read from one listing's detail view.
#[derive(Debug, Clone, Copy)]
pub struct RawListing<'a> {
    pub title: &'a str,
    pub company: &'a str,
    pub location: &'a str,
    pub description: &'a str,
    /// The whole info container text, including the extras line.
    pub info_block: &'a str,
}

#[derive(Debug, Default, PartialEq)]
struct Extras {
    salary_base: Option<Decimal>,
    salary_upper: Option<Decimal>,
    employment_type: Option<String>,
}

/// Build a [`JobRecord`] from a listing's raw text. Never fails.
pub fn parse_record(listing: &RawListing<'_>) -> JobRecord {
    let lines: Vec<&str> = listing.info_block.trim().lines().map(str::trim).collect();
    let last = lines.last().copied().unwrap_or_default();

    let (responsive, extras) = if last.starts_with(RESPONDED_MARKER) {
        let extras = lines
            .len()
            .checked_sub(2)
            .map(|i| lines[i])
            .filter(|line| line.starts_with(CURRENCY_MARKER))
            .map(parse_extras)
            .unwrap_or_default();
        (true, extras)
    } else {
        (false, parse_extras(last))
    };

    JobRecord {
        title: listing.title.to_string(),
        company: listing.company.to_string(),
        location: strip_separator(listing.location).to_string(),
        description: listing.description.to_string(),
        salary_base: extras.salary_base,
        salary_upper: extras.salary_upper,
        employment_type: extras.employment_type,
        responsive,
    }
}

fn strip_separator(location: &str) -> &str {
    location.trim_start_matches(|c: char| c == '-' || c.is_whitespace())
}

fn parse_extras(line: &str) -> Extras {
    let tokens: Vec<&str> = line.split(EXTRAS_DELIMITER).map(str::trim).collect();
    let mut amounts = Vec::new();
    let mut types = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].contains(CURRENCY_MARKER) {
            if let Some(amount) = parse_amount(tokens[i]) {
                amounts.push(amount);
            }
            i += 1;
            continue;
        }
        // Terms like "Full-time" contain the delimiter, so they span several tokens.
        match match_employment_type(&tokens[i..]) {
            Some((term, used)) => {
                types.push(term);
                i += used;
            }
            None => i += 1,
        }
    }

    let mut amounts = amounts.into_iter();
    Extras {
        salary_base: amounts.next(),
        salary_upper: amounts.next(),
        employment_type: (!types.is_empty())
            .then(|| types.join(EXTRAS_DELIMITER)),
    }
}

/// Keep digits and the decimal point, then parse exactly.
fn parse_amount(token: &str) -> Option<Decimal> {
    let digits: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    Decimal::from_str(&digits).ok()
}

/// Longest employment type formed by the leading tokens, with the number of tokens it used.
fn match_employment_type(tokens: &[&str]) -> Option<(&'static str, usize)> {
    let max_parts = EMPLOYMENT_TYPES
        .iter()
        .map(|t| t.matches(EXTRAS_DELIMITER).count() + 1)
        .max()
        .unwrap_or(1);

    (1..=tokens.len().min(max_parts)).rev().find_map(|n| {
        if tokens[..n].iter().any(|t| t.contains(CURRENCY_MARKER)) {
            return None;
        }
        let candidate = tokens[..n].join(EXTRAS_DELIMITER);
        EMPLOYMENT_TYPES
            .iter()
            .find(|term| **term == candidate)
            .map(|term| (*term, n))
    })
}
