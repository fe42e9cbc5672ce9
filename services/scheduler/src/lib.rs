//! fleetplace scheduler
//!
//! A multi-tenant placement scheduler for fleets of managed clusters. Given
//! declarative placement requests, it continuously computes and publishes
//! stable, load-balanced sets of target clusters:
//!
//! - the plugin pipeline filters candidates (predicates, taints, spread)
//!   and scores survivors (balance, steady, resources, add-on scores);
//! - the scheduling controller reconciles placement keys from a shared
//!   work queue against locally cached fleet state;
//! - the decision binder publishes ranked selections as sharded decision
//!   pages with minimal writes.

pub mod binder;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod fanout;
pub mod metrics;
pub mod plugins;
pub mod scheduler;

pub use binder::{DecisionBinder, DECISIONS_PER_PAGE};
pub use config::Config;
pub use controller::SchedulingController;
pub use engine::{Engine, Stores};
pub use error::{SchedulingError, SchedulingResult};
pub use events::EventRecorder;
pub use metrics::SchedulerMetrics;
pub use scheduler::{PluginScheduler, ScheduleResult};
