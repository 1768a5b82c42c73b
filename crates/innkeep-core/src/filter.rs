use chrono::{DateTime, NaiveDate, Utc};
use tracing::trace;

use crate::datetime::parse_day_expr;
use crate::interval::DateInterval;

/// Records that the list screens can filter: every entity exposes its
/// searchable text fields, a status/category token, and (when it has
/// one) a date interval.
pub trait Filterable {
    fn id(&self) -> Option<u64>;
    fn search_fields(&self) -> Vec<&str>;
    fn status_token(&self) -> &str;
    fn interval(&self) -> Option<DateInterval>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Token(String),
}

/// The three independent list predicates, AND-combined: free-text query,
/// status/category token, and date-range overlap. Re-derived from the
/// raw filter terms on every invocation; nothing is cached.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    pub query: Vec<String>,
    pub status: StatusFilter,
    pub range: Option<DateInterval>,
    pub id: Option<u64>,
}

impl Criteria {
    /// Parses CLI filter terms. `status:`, `from:` and `to:` atoms feed
    /// the structured predicates; a bare integer selects a record id;
    /// everything else becomes free-text query words.
    #[tracing::instrument(skip(terms, now))]
    pub fn parse(terms: &[String], now: DateTime<Utc>) -> anyhow::Result<Self> {
        let mut criteria = Criteria::default();
        let mut from: Option<NaiveDate> = None;
        let mut to: Option<NaiveDate> = None;

        for term in terms {
            if let Some(value) = term.strip_prefix("status:") {
                criteria.status = StatusFilter::Token(value.to_ascii_lowercase());
                continue;
            }
            if let Some(value) = term.strip_prefix("from:") {
                from = Some(parse_day_expr(value, now)?);
                continue;
            }
            if let Some(value) = term.strip_prefix("to:") {
                to = Some(parse_day_expr(value, now)?);
                continue;
            }
            if let Ok(id) = term.parse::<u64>() {
                criteria.id = Some(id);
                continue;
            }
            criteria.query.push(term.clone());
        }

        // An open-ended range collapses to a single-day interval and runs
        // through the same overlap test as a closed one.
        criteria.range = match (from, to) {
            (Some(from), Some(to)) => Some(DateInterval::new(from, to)?),
            (Some(from), None) => Some(DateInterval::day(from)),
            (None, Some(to)) => Some(DateInterval::day(to)),
            (None, None) => None,
        };

        Ok(criteria)
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
            && self.status == StatusFilter::All
            && self.range.is_none()
            && self.id.is_none()
    }

    /// The caller asked for specific records, by id or by status token.
    /// List commands use this to decide whether to apply their default
    /// cancelled-record guard.
    pub fn has_explicit_selector(&self) -> bool {
        self.id.is_some() || self.status != StatusFilter::All
    }

    pub fn matches<R: Filterable>(&self, record: &R) -> bool {
        let ok = self.matches_id(record)
            && self.matches_text(record)
            && self.matches_status(record)
            && self.matches_range(record);
        trace!(id = ?record.id(), ok, "filter predicate evaluation");
        ok
    }

    pub fn apply<'a, R: Filterable>(&self, records: &'a [R]) -> Vec<&'a R> {
        records.iter().filter(|r| self.matches(*r)).collect()
    }

    fn matches_id<R: Filterable>(&self, record: &R) -> bool {
        match self.id {
            Some(id) => record.id() == Some(id),
            None => true,
        }
    }

    fn matches_text<R: Filterable>(&self, record: &R) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let fields: Vec<String> = record
            .search_fields()
            .into_iter()
            .map(str::to_ascii_lowercase)
            .collect();
        self.query.iter().all(|word| {
            let needle = word.to_ascii_lowercase();
            fields.iter().any(|field| field.contains(&needle))
        })
    }

    fn matches_status<R: Filterable>(&self, record: &R) -> bool {
        match &self.status {
            StatusFilter::All => true,
            StatusFilter::Token(token) => record.status_token().eq_ignore_ascii_case(token),
        }
    }

    fn matches_range<R: Filterable>(&self, record: &R) -> bool {
        match (self.range, record.interval()) {
            (Some(range), Some(interval)) => interval.overlaps(range),
            // no range selected, or the record has no dates to test
            _ => true,
        }
    }
}
