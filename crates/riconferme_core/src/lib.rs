//! Riconferme core: IO-free domain model of the reconfirmation bot.
pub mod admin_list;
pub mod config;
mod error;
pub mod localtime;
pub mod messages;
mod pipeline;
pub mod procedure;
mod status;
pub mod wikitext;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use admin_list::{AdminList, Group, UserInfo};
pub use config::{Config, ConfigError};
pub use error::ContentError;
pub use messages::{Message, MessageError, MessageProvider};
pub use pipeline::{run_pipeline, run_unit, PipelineUnit, UnitKind};
pub use procedure::{Outcome, ProcedureTitle};
pub use status::{TaskResult, TaskStatus};

/// Source of the current instant, injected so runs can be replayed at a
/// fixed time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}
