//! Alert engine crate.
//!
//! Compares current and previous forecast snapshots and the latest warning
//! states per region, and emits alert events for the push dispatcher.

pub mod command;
pub mod dispatch;
pub mod engine;
pub mod policy;
pub mod pop_view;
pub mod ports;
pub mod rules;
pub mod types;
pub mod warnings;

pub use command::AlertCommand;
pub use dispatch::{dispatch_all, DispatchSummary, RecordingDispatcher};
pub use engine::AlertRuleEngine;
pub use policy::is_newly_issued_since;
pub use pop_view::{PopView, PopViewAdapter, PopViewPair};
pub use ports::{
    AlertDispatcher, InMemorySnapshotPort, InMemoryWarningPort, SnapshotPort, WarningPort,
};
pub use types::{AlertCriteria, AlertEvent, AlertType, EvaluationResult, RegionFailure};
