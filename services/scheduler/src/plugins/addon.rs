//! Add-on prioritizer: scores published by external agents.
//!
//! Looks up the add-on score object named by the coordinate's resource name
//! in each cluster's namespace and reads the entry matching the score name.
//! A missing object scores zero and raises an `AddOnPlacementScoresMissing`
//! warning; an expired one scores zero and raises an
//! `AddOnPlacementScoresExpired` warning. Valid scores that carry a
//! `validUntil` yield a requeue hint at the earliest upcoming expiry so the
//! placement is re-scored when they lapse.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use fleetplace_api::{Cluster, Placement};

use crate::error::SchedulingResult;

use super::{Prioritizer, SchedulerHandle, ScoreResult};

pub const REASON_SCORES_EXPIRED: &str = "AddOnPlacementScoresExpired";
pub const REASON_SCORES_MISSING: &str = "AddOnPlacementScoresMissing";

pub struct AddOnPrioritizer {
    handle: Arc<SchedulerHandle>,
    name: String,
    resource_name: String,
    score_name: String,
}

impl AddOnPrioritizer {
    pub fn new(
        handle: Arc<SchedulerHandle>,
        resource_name: impl Into<String>,
        score_name: impl Into<String>,
    ) -> Self {
        let resource_name = resource_name.into();
        let score_name = score_name.into();
        Self {
            name: format!("AddOn/{resource_name}/{score_name}"),
            handle,
            resource_name,
            score_name,
        }
    }

    /// A `Customize*` prioritizer reads through the same add-on channel,
    /// keyed by the lowercased prioritizer name.
    pub fn customize(handle: Arc<SchedulerHandle>, built_in: &str) -> Self {
        let key = built_in.to_lowercase();
        Self {
            name: built_in.to_string(),
            handle,
            resource_name: key.clone(),
            score_name: key,
        }
    }
}

impl Prioritizer for AddOnPrioritizer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn score(
        &self,
        placement: &Placement,
        clusters: &[Cluster],
    ) -> SchedulingResult<ScoreResult> {
        let now = self.handle.clock.now();
        let mut scores: HashMap<String, i64> = HashMap::new();
        let mut requeue_at: Option<DateTime<Utc>> = None;
        let mut expired = String::new();
        let mut missing = String::new();

        for cluster in clusters {
            scores.insert(cluster.name().to_string(), 0);

            // Add-on scores live in the namespace named after the cluster.
            let Some(addon) = self
                .handle
                .scores
                .get_named(cluster.name(), &self.resource_name)
            else {
                let _ = write!(missing, " {}/{}", cluster.name(), self.resource_name);
                continue;
            };

            if let Some(valid_until) = addon.status.valid_until {
                if valid_until <= now {
                    let _ = write!(expired, " {}/{}", cluster.name(), self.resource_name);
                    continue;
                }
                requeue_at = Some(requeue_at.map_or(valid_until, |r| r.min(valid_until)));
            }

            if let Some(value) = addon.score(&self.score_name) {
                scores.insert(cluster.name().to_string(), value as i64);
            }
        }

        if !missing.is_empty() {
            self.handle.recorder.warning(
                &placement.meta.key(),
                REASON_SCORES_MISSING,
                format!("AddOnPlacementScores{missing} not found"),
            );
        }
        if !expired.is_empty() {
            self.handle.recorder.warning(
                &placement.meta.key(),
                REASON_SCORES_EXPIRED,
                format!("AddOnPlacementScores{expired} expired"),
            );
        }

        Ok(ScoreResult { scores, requeue_at })
    }
}
