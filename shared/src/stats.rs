//! Summary counters derived from an incident list.

use serde::{Deserialize, Serialize};

use crate::model::{Incident, IncidentStatus};

/// Always recomputed from a whole list, never patched incrementally.
///
/// `total` counts every incident; `closed` and unrecognised statuses only
/// show up there, so `open + investigating + resolved <= total`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub open: usize,
    pub investigating: usize,
    pub resolved: usize,
}

impl Stats {
    pub fn active(&self) -> usize {
        self.open + self.investigating
    }
}

pub fn aggregate(incidents: &[Incident]) -> Stats {
    incidents
        .iter()
        .fold(Stats::default(), |mut stats, incident| {
            stats.total += 1;
            match incident.status {
                IncidentStatus::Open => stats.open += 1,
                IncidentStatus::Investigating => stats.investigating += 1,
                IncidentStatus::Resolved => stats.resolved += 1,
                IncidentStatus::Closed | IncidentStatus::Unknown => {}
            }
            stats
        })
}
