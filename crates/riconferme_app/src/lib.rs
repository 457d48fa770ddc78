//! Riconferme app: the reconfirmation bot built on the core model and the
//! API engine.
pub mod bot;
pub mod keys;
pub mod page;
pub mod platform;
pub mod provider;
pub mod tasks;

pub use bot::Bot;
pub use tasks::{RunMode, SubtaskName, TaskContext, TaskManager, TaskName, Unit};
