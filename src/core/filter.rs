//! Purpose: Series filter contract and the stock literal/wildcard/regexp tag-value filters.
//! Exports: `TagFilter`, `ResolvedSeries`, `ResolvedTags`, `TagValueFilter`, `TagFilterSpec`,
//! `MatchKind`, `FilterChain`, `compile_filter`.
//! Role: The scan unit consumes only the yes/no verdict for a row's resolved names.
//! Invariants: A missing tag key never matches.
//! Invariants: Patterns are compiled once, at construction; bad definitions are usage errors.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// Tag names keyed by tag-key name, as resolved from one row key.
pub type ResolvedTags = BTreeMap<String, String>;

/// Metric and tag names of one series.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvedSeries {
    pub metric: String,
    pub tags: ResolvedTags,
}

pub trait TagFilter: Send + Sync + fmt::Debug {
    fn matches(&self, series: &ResolvedSeries) -> bool;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Pipe-separated list of exact values, e.g. `web01|web02`.
    LiteralOr,
    /// Shell-style pattern where `*` matches any run of characters.
    Wildcard,
    /// Regular expression matched anywhere in the value.
    Regexp,
}

/// Serialized form of one tag-value filter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TagFilterSpec {
    pub tagk: String,
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub filter: String,
}

#[derive(Clone, Debug)]
pub struct TagValueFilter {
    spec: TagFilterSpec,
    pattern: Option<Regex>,
}

impl PartialEq for TagValueFilter {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl TagValueFilter {
    pub fn compile(spec: TagFilterSpec) -> Result<Self, Error> {
        if spec.tagk.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("tag filter requires a tagk"));
        }
        let pattern = match spec.kind {
            MatchKind::LiteralOr => None,
            MatchKind::Wildcard => Some(build_regex(&wildcard_regex(&spec.filter))?),
            MatchKind::Regexp => Some(build_regex(&spec.filter)?),
        };
        Ok(Self { spec, pattern })
    }

    pub fn literal_or(tagk: impl Into<String>, values: impl Into<String>) -> Result<Self, Error> {
        Self::from_parts(tagk, MatchKind::LiteralOr, values)
    }

    pub fn wildcard(tagk: impl Into<String>, pattern: impl Into<String>) -> Result<Self, Error> {
        Self::from_parts(tagk, MatchKind::Wildcard, pattern)
    }

    pub fn regexp(tagk: impl Into<String>, pattern: impl Into<String>) -> Result<Self, Error> {
        Self::from_parts(tagk, MatchKind::Regexp, pattern)
    }

    fn from_parts(
        tagk: impl Into<String>,
        kind: MatchKind,
        filter: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::compile(TagFilterSpec {
            tagk: tagk.into(),
            kind,
            filter: filter.into(),
        })
    }

    pub fn spec(&self) -> &TagFilterSpec {
        &self.spec
    }

    fn matches_value(&self, value: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(value),
            None => self.spec.filter.split('|').any(|v| v == value),
        }
    }
}

impl TagFilter for TagValueFilter {
    fn matches(&self, series: &ResolvedSeries) -> bool {
        series
            .tags
            .get(&self.spec.tagk)
            .is_some_and(|value| self.matches_value(value))
    }
}

/// All member filters must match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    pub filters: Vec<TagValueFilter>,
}

impl TagFilter for FilterChain {
    fn matches(&self, series: &ResolvedSeries) -> bool {
        self.filters.iter().all(|filter| filter.matches(series))
    }
}

#[derive(Deserialize)]
struct FilterChainSpec {
    filters: Vec<TagFilterSpec>,
}

pub fn compile_filter(json: &str) -> Result<FilterChain, Error> {
    let chain: FilterChainSpec = serde_json::from_str(json).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid tag filter definition")
            .with_source(err)
    })?;
    let filters = chain
        .filters
        .into_iter()
        .map(TagValueFilter::compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FilterChain { filters })
}

fn build_regex(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid tag filter pattern {pattern:?}"))
            .with_source(err)
    })
}

// `*` is the only wildcard; everything else is literal and the whole value must match.
fn wildcard_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?s)^{body}$")
}
