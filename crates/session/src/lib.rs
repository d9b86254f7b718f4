#![warn(missing_docs)]
//! Kitting session: the state machine tying placement, anchor quality,
//! hosting, resolving, object editing and fetch guidance together.
//!
//! Driven by [`SessionController::tick`] at a fixed rate; delayed work goes
//! through a [`Scheduler`] instead of timers.

pub mod arena;
mod config;
mod controller;
pub mod edit;
pub mod fetch;
pub mod placement;
mod scheduler;
pub mod ui;

pub use arena::{AnchorRef, ArenaObject, ObjectArena, ObjectRole};
pub use config::SessionConfig;
pub use controller::{ConfigurationAnchor, Guidance, LocalAnchor, SessionController, SessionMode};
pub use edit::{AxisMask, EditMode, RotationAxis};
pub use fetch::{FetchItem, FetchList, FetchOutcome};
pub use scheduler::Scheduler;
pub use ui::{Button, UiSink};
