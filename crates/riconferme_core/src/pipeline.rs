use std::fmt;

use async_trait::async_trait;
use bot_logging::{bot_error, bot_info};

use crate::status::TaskResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Task,
    Subtask,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Task => write!(f, "task"),
            UnitKind::Subtask => write!(f, "subtask"),
        }
    }
}

/// A named step of an ordered run. Tasks and subtasks share this contract.
///
/// `Err` is reserved for failures the run can recover from (API, transport,
/// unexpected content); the runner turns it into an error result. Panics are
/// left to propagate.
#[async_trait]
pub trait PipelineUnit<C: Send>: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> UnitKind;

    async fn run(&self, ctx: &mut C) -> anyhow::Result<TaskResult>;
}

/// Runs `units` in order, stopping after the first unit that leaves the
/// merged result in the error state.
pub async fn run_pipeline<C, U>(units: &[U], ctx: &mut C) -> TaskResult
where
    C: Send,
    U: PipelineUnit<C>,
{
    let mut result = TaskResult::nothing();
    for unit in units {
        result.merge(run_unit(unit, ctx).await);
        if !result.is_ok() {
            bot_error!(
                "Stopping after {} {}: remaining units skipped",
                unit.kind(),
                unit.name()
            );
            break;
        }
    }
    result
}

/// Runs a single unit with entry/exit logging and error conversion.
pub async fn run_unit<C, U>(unit: &U, ctx: &mut C) -> TaskResult
where
    C: Send,
    U: PipelineUnit<C>,
{
    bot_info!("Starting {} {}", unit.kind(), unit.name());
    let result = match unit.run(ctx).await {
        Ok(result) => result,
        Err(err) => {
            bot_error!("{} {} failed: {:?}", unit.kind(), unit.name(), err);
            TaskResult::error(format!("{} {}: {:#}", unit.kind(), unit.name(), err))
        }
    };
    bot_info!(
        "{} {} finished: {}",
        unit.kind(),
        unit.name(),
        result.status()
    );
    result
}
