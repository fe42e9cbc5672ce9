//! Taint/toleration filter.
//!
//! A cluster passes when every one of its taints is tolerated. Beyond
//! explicit tolerations, `PreferNoSelect` taints are always tolerated, and
//! `NoSelectIfNew` taints are tolerated for clusters the placement has
//! already selected. Time-limited tolerations yield a requeue hint at the
//! earliest upcoming expiry so the placement is re-reconciled the moment a
//! toleration lapses.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use fleetplace_api::{Cluster, Placement, Taint, TaintEffect, Toleration, TolerationOperator};
use fleetplace_store::Clock;

use crate::error::{SchedulingError, SchedulingResult};

use super::{Filter, FilterContext, FilterOutcome};

pub struct TaintTolerationFilter {
    clock: Arc<dyn Clock>,
}

impl TaintTolerationFilter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

fn validate(tolerations: &[Toleration]) -> SchedulingResult<()> {
    for toleration in tolerations {
        if toleration.key.is_empty() && toleration.operator != TolerationOperator::Exists {
            return Err(SchedulingError::Config(
                "toleration with an empty key must use the Exists operator".to_string(),
            ));
        }
        if toleration.operator == TolerationOperator::Exists && !toleration.value.is_empty() {
            return Err(SchedulingError::Config(
                "toleration with the Exists operator must not carry a value".to_string(),
            ));
        }
    }
    Ok(())
}

/// Whether the toleration matches the taint at `now`. For time-limited
/// tolerations the second value carries the expiry instant.
fn tolerates(
    toleration: &Toleration,
    taint: &Taint,
    now: DateTime<Utc>,
) -> (bool, Option<DateTime<Utc>>) {
    if !toleration.key.is_empty() && toleration.key != taint.key {
        return (false, None);
    }
    if toleration.effect.is_some_and(|e| e != taint.effect) {
        return (false, None);
    }
    let operator_holds = match toleration.operator {
        TolerationOperator::Equal => toleration.value == taint.value,
        TolerationOperator::Exists => true,
    };
    if !operator_holds {
        return (false, None);
    }
    match toleration.toleration_seconds {
        None => (true, None),
        Some(seconds) => {
            let expiry = taint.time_added + TimeDelta::seconds(seconds);
            if expiry > now {
                (true, Some(expiry))
            } else {
                (false, None)
            }
        }
    }
}

/// Whether the cluster's taints are all tolerated. Returns the earliest
/// expiry among the time-limited tolerations that carried the verdict.
fn cluster_tolerated(
    cluster: &Cluster,
    tolerations: &[Toleration],
    existing: bool,
    now: DateTime<Utc>,
) -> (bool, Option<DateTime<Utc>>) {
    let mut earliest: Option<DateTime<Utc>> = None;
    for taint in &cluster.spec.taints {
        if taint.effect == TaintEffect::PreferNoSelect {
            continue;
        }
        if taint.effect == TaintEffect::NoSelectIfNew && existing {
            continue;
        }
        let mut taint_tolerated = false;
        for toleration in tolerations {
            let (ok, expiry) = tolerates(toleration, taint, now);
            if ok {
                taint_tolerated = true;
                if let Some(expiry) = expiry {
                    earliest = Some(earliest.map_or(expiry, |e| e.min(expiry)));
                }
                break;
            }
        }
        if !taint_tolerated {
            return (false, None);
        }
    }
    (true, earliest)
}

impl Filter for TaintTolerationFilter {
    fn name(&self) -> &'static str {
        "TaintToleration"
    }

    fn filter(
        &self,
        ctx: &FilterContext,
        placement: &Placement,
        clusters: Vec<Cluster>,
    ) -> SchedulingResult<FilterOutcome> {
        let tolerations = &placement.spec.tolerations;
        validate(tolerations)?;

        let now = self.clock.now();
        let mut filtered = Vec::with_capacity(clusters.len());
        let mut requeue_at: Option<DateTime<Utc>> = None;

        for cluster in clusters {
            let existing = ctx.existing.contains(cluster.name());
            let (tolerated, expiry) = cluster_tolerated(&cluster, tolerations, existing, now);
            if tolerated {
                if let Some(expiry) = expiry {
                    requeue_at = Some(requeue_at.map_or(expiry, |e| e.min(expiry)));
                }
                filtered.push(cluster);
            }
        }

        Ok(FilterOutcome {
            filtered,
            requeue_at,
        })
    }
}
