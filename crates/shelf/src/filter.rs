//! Title list filtering by region and free text
//!
//! A pass hides every row, picks the candidates whose label matches the
//! wildcard pattern, then decides visibility for each candidate concurrently.
//! Each decision reads the shared settings under a best-effort lock; a
//! decision that cannot get the lock in time is skipped and the row stays
//! hidden.

use crate::config::{Settings, keys};
use crate::lock::BestEffortLock;
use crate::navigation::TitleList;
use futures::stream::{self, StreamExt};
use globset::{GlobBuilder, GlobMatcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_CONCURRENCY: usize = 8;

/// Region selector plus typed filter text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    pub region: String,
    pub text: String,
}

impl FilterQuery {
    pub fn new<R: Into<String>, T: Into<String>>(region: R, text: T) -> Self {
        Self {
            region: region.into(),
            text: text.into(),
        }
    }

    /// `*region* *` without text, otherwise `*region*text*`
    pub fn pattern(&self) -> String {
        if self.text.is_empty() {
            format!("*{}* *", self.region)
        } else {
            format!("*{}*{}*", self.region, self.text)
        }
    }

    /// Region-only matching is case sensitive; text matching is not
    pub fn case_insensitive(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn matcher(&self) -> LabelMatcher {
        LabelMatcher::new(&self.pattern(), self.case_insensitive())
    }
}

/// Wildcard matcher over row labels
#[derive(Debug, Clone)]
pub enum LabelMatcher {
    Glob(GlobMatcher),
    /// Used when the pattern does not compile; pieces must appear in order
    Substring { pieces: Vec<String>, case_insensitive: bool },
}

impl LabelMatcher {
    pub fn new(pattern: &str, case_insensitive: bool) -> Self {
        let escaped = escape_pattern(pattern);
        match GlobBuilder::new(&escaped)
            .case_insensitive(case_insensitive)
            .literal_separator(false)
            .build()
            .map(|g| g.compile_matcher())
        {
            Ok(matcher) => LabelMatcher::Glob(matcher),
            Err(e) => {
                warn!("Filter pattern {:?} rejected ({}), falling back to substring", pattern, e);
                let pieces = pattern
                    .split('*')
                    .filter(|s| !s.is_empty())
                    .map(|s| if case_insensitive { s.to_lowercase() } else { s.to_string() })
                    .collect();
                LabelMatcher::Substring {
                    pieces,
                    case_insensitive,
                }
            }
        }
    }

    pub fn is_match(&self, label: &str) -> bool {
        match self {
            LabelMatcher::Glob(matcher) => matcher.is_match(label),
            LabelMatcher::Substring {
                pieces,
                case_insensitive: true,
            } => contains_in_order(&label.to_lowercase(), pieces),
            LabelMatcher::Substring { pieces, .. } => contains_in_order(label, pieces),
        }
    }
}

fn contains_in_order(label: &str, pieces: &[String]) -> bool {
    let mut rest = label;
    for piece in pieces {
        match rest.find(piece.as_str()) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }
    true
}

/// Brackets and braces are literal in user input; runs of `*` collapse to one
fn escape_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut last_star = false;
    for c in pattern.chars() {
        match c {
            '*' if last_star => continue,
            '[' | ']' | '{' | '}' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
        last_star = c == '*';
    }
    out
}

/// Outcome of one filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Rows whose label matched the pattern
    pub matched: usize,
    pub visible: usize,
    /// Matches left hidden because the settings lock was busy
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct FilterEngine {
    concurrency: usize,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl FilterEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn apply(
        &self,
        list: &mut TitleList,
        query: &FilterQuery,
        settings: &BestEffortLock<Settings>,
    ) -> FilterReport {
        if !query.text.is_empty() {
            info!("filter: {}", query.text);
        }

        for row in list.rows_mut() {
            row.hidden = true;
        }

        let matcher = query.matcher();
        let candidates: Vec<_> = list
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| matcher.is_match(&row.label))
            .map(|(index, row)| (index, Arc::clone(&row.entry)))
            .collect();

        let mut report = FilterReport {
            matched: candidates.len(),
            ..FilterReport::default()
        };

        let decisions: Vec<(usize, Option<bool>)> = stream::iter(candidates)
            .map(|(index, entry)| async move {
                let Some(guard) = settings.try_lock().await else {
                    return (index, None);
                };
                let visible = guard.get_bool(keys::SHOW_ALL_TITLES) || entry.cover_exists();
                drop(guard);
                (index, Some(visible))
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let rows = list.rows_mut();
        for (index, decision) in decisions {
            match decision {
                Some(true) => {
                    rows[index].hidden = false;
                    report.visible += 1;
                }
                Some(false) => {}
                None => report.skipped += 1,
            }
        }

        debug!(
            "Filter {:?}: {} matched, {} visible, {} skipped",
            query.pattern(),
            report.matched,
            report.visible,
            report.skipped
        );
        report
    }
}
