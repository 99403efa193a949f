//! Where a step's data is echoed.
//!
//! A step has one canonical record (its `trajectory` entry, or its assistant
//! message for history-only documents) and a set of cached projections: the
//! global `history` mirror plus the `query` snapshot of every later step.
//! Edits enumerate the projections from [`echo_sites`] instead of visiting
//! each location by hand.

use std::ops::Range;

use serde_json::{Map, Value};

use crate::document::{self, Dialect, HISTORY_KEY, TRAJECTORY_KEY};

/// One array that repeats the flattened step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoSite {
    /// `trajectory[index].query`
    Query { trajectory_index: usize },
    /// The top-level `history` array.
    History,
}

/// Echo sites for a step, in the order they must be visited: later steps'
/// query snapshots in increasing step order, then the global history.
///
/// `later` is the range of `trajectory` indices holding steps that come after
/// the edited one, as laid out at the time the sites are visited.
pub fn echo_sites(dialect: Dialect, later: Range<usize>) -> Vec<EchoSite> {
    let mut sites = Vec::with_capacity(later.len() + 1);
    if dialect == Dialect::TrajectoryWithHistory {
        sites.extend(later.map(|trajectory_index| EchoSite::Query { trajectory_index }));
    }
    sites.push(EchoSite::History);
    sites
}

impl EchoSite {
    /// Borrow the array behind this site, if the document has one there.
    pub fn resolve<'a>(&self, root: &'a mut Map<String, Value>) -> Option<&'a mut Vec<Value>> {
        match *self {
            EchoSite::History => document::array_mut(root, HISTORY_KEY),
            EchoSite::Query { trajectory_index } => document::array_mut(root, TRAJECTORY_KEY)?
                .get_mut(trajectory_index)?
                .get_mut("query")?
                .as_array_mut(),
        }
    }
}
