//! GDELT DOC query construction.
//!
//! A [`SearchQuery`] is built once per run from a set of source domains, a set
//! of GKG themes, and a language. It renders to GDELT's query syntax:
//!
//! ```text
//! (domain:apnews.com OR domain:cnn.com) (theme:ACT_HARMTHREATEN OR theme:ACT_MAKESTATEMENT) sourcelang:english
//! ```
//!
//! Clauses separated by a space are ANDed by GDELT. Terms inside a clause are
//! sorted, so the same inputs always render the same string.

use crate::error::TimespanError;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Outlets searched when no `--domain` is given.
pub const DEFAULT_DOMAINS: &[&str] = &[
    "cnn.com",
    "foxnews.com",
    "nytimes.com",
    "washingtonpost.com",
    "wsj.com",
    "politico.com",
    "apnews.com",
    "thehill.com",
];

/// GKG themes searched when no `--theme` is given.
pub const DEFAULT_THEMES: &[&str] = &["ACT_MAKESTATEMENT", "ACT_HARMTHREATEN"];

pub const DEFAULT_LANGUAGE: &str = "english";

/// Look-back window relative to now, in GDELT's `timespan` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timespan {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
    Months(u32),
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timespan::Minutes(n) => write!(f, "{n}min"),
            Timespan::Hours(n) => write!(f, "{n}h"),
            Timespan::Days(n) => write!(f, "{n}d"),
            Timespan::Weeks(n) => write!(f, "{n}w"),
            Timespan::Months(n) => write!(f, "{n}m"),
        }
    }
}

impl FromStr for Timespan {
    type Err = TimespanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimespanError::Empty);
        }
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (amount, unit) = s.split_at(split);
        let amount: u32 = match amount.parse() {
            Ok(n) if n > 0 => n,
            _ => return Err(TimespanError::Amount(s.to_string())),
        };
        match unit.to_ascii_lowercase().as_str() {
            "min" | "mins" => Ok(Timespan::Minutes(amount)),
            "h" | "hours" => Ok(Timespan::Hours(amount)),
            "d" | "days" => Ok(Timespan::Days(amount)),
            "w" | "weeks" => Ok(Timespan::Weeks(amount)),
            "m" | "months" => Ok(Timespan::Months(amount)),
            other => Err(TimespanError::Unit(other.to_string())),
        }
    }
}

/// Immutable description of one discovery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub domains: BTreeSet<String>,
    pub themes: BTreeSet<String>,
    pub language: String,
    pub timespan: Timespan,
    pub max_records: u32,
}

/// Build the query for one run. Pure; no I/O.
pub fn build_query<D, T>(
    domains: D,
    themes: T,
    language: &str,
    timespan: Timespan,
    max_records: u32,
) -> SearchQuery
where
    D: IntoIterator,
    D::Item: Into<String>,
    T: IntoIterator,
    T::Item: Into<String>,
{
    SearchQuery {
        domains: domains.into_iter().map(Into::into).collect(),
        themes: themes.into_iter().map(Into::into).collect(),
        language: language.to_string(),
        timespan,
        max_records,
    }
}

/// Render `prefix:term` predicates as a disjunction. GDELT rejects
/// parentheses around a single term, so those are only added for two or more.
fn disjunction(prefix: &str, terms: &BTreeSet<String>) -> Option<String> {
    match terms.len() {
        0 => None,
        1 => terms.iter().next().map(|t| format!("{prefix}:{t}")),
        _ => Some(format!(
            "({})",
            terms.iter().map(|t| format!("{prefix}:{t}")).join(" OR ")
        )),
    }
}

impl SearchQuery {
    /// The `query` parameter sent to the DOC API.
    pub fn query_string(&self) -> String {
        let language = (!self.language.is_empty()).then(|| format!("sourcelang:{}", self.language));
        [
            disjunction("domain", &self.domains),
            disjunction("theme", &self.themes),
            language,
        ]
        .into_iter()
        .flatten()
        .join(" ")
    }

    /// Full parameter list for an `ArtList` request, newest first.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query_string()),
            ("mode", "ArtList".to_string()),
            ("format", "json".to_string()),
            ("sort", "DateDesc".to_string()),
            ("timespan", self.timespan.to_string()),
            ("maxrecords", self.max_records.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_query() -> SearchQuery {
        build_query(
            DEFAULT_DOMAINS.iter().copied(),
            DEFAULT_THEMES.iter().copied(),
            DEFAULT_LANGUAGE,
            Timespan::Days(1),
            100,
        )
    }

    #[test]
    fn test_default_query_string() {
        assert_eq!(
            default_query().query_string(),
            "(domain:apnews.com OR domain:cnn.com OR domain:foxnews.com OR domain:nytimes.com \
             OR domain:politico.com OR domain:thehill.com OR domain:washingtonpost.com OR domain:wsj.com) \
             (theme:ACT_HARMTHREATEN OR theme:ACT_MAKESTATEMENT) sourcelang:english"
        );
    }

    #[test]
    fn test_query_string_is_stable_regardless_of_input_order() {
        let a = build_query(["b.com", "a.com"], ["Y", "X"], "english", Timespan::Days(1), 10);
        let b = build_query(["a.com", "b.com"], ["X", "Y"], "english", Timespan::Days(1), 10);
        assert_eq!(a.query_string(), b.query_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_term_has_no_parentheses() {
        let q = build_query(["cnn.com"], ["ACT_MAKESTATEMENT"], "english", Timespan::Days(1), 10);
        assert_eq!(
            q.query_string(),
            "domain:cnn.com theme:ACT_MAKESTATEMENT sourcelang:english"
        );
    }

    #[test]
    fn test_empty_sets_are_omitted() {
        let q = build_query(Vec::<String>::new(), ["X"], "", Timespan::Hours(6), 10);
        assert_eq!(q.query_string(), "theme:X");
    }

    #[test]
    fn test_duplicate_terms_collapse() {
        let q = build_query(["cnn.com", "cnn.com"], Vec::<String>::new(), "english", Timespan::Days(1), 10);
        assert_eq!(q.domains.len(), 1);
    }

    #[test]
    fn test_params() {
        let params = default_query().to_params();
        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("mode"), Some("ArtList"));
        assert_eq!(get("format"), Some("json"));
        assert_eq!(get("sort"), Some("DateDesc"));
        assert_eq!(get("timespan"), Some("1d"));
        assert_eq!(get("maxrecords"), Some("100"));
        assert!(get("query").unwrap().ends_with("sourcelang:english"));
    }

    #[test]
    fn test_timespan_parse_and_display() {
        assert_eq!("1d".parse::<Timespan>(), Ok(Timespan::Days(1)));
        assert_eq!("24h".parse::<Timespan>(), Ok(Timespan::Hours(24)));
        assert_eq!("15min".parse::<Timespan>(), Ok(Timespan::Minutes(15)));
        assert_eq!("2w".parse::<Timespan>(), Ok(Timespan::Weeks(2)));
        assert_eq!("3m".parse::<Timespan>(), Ok(Timespan::Months(3)));
        assert_eq!(Timespan::Minutes(15).to_string(), "15min");
        assert_eq!(Timespan::Days(1).to_string(), "1d");
    }

    #[test]
    fn test_timespan_rejects_garbage() {
        assert_eq!("".parse::<Timespan>(), Err(TimespanError::Empty));
        assert!(matches!("0d".parse::<Timespan>(), Err(TimespanError::Amount(_))));
        assert!(matches!("d".parse::<Timespan>(), Err(TimespanError::Amount(_))));
        assert!(matches!("5y".parse::<Timespan>(), Err(TimespanError::Unit(_))));
    }
}
