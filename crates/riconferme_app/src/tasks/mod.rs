//! The concrete units of a run and the manager driving them.
//!
//! Tasks run in the fixed order of [`TaskName::ALL`]; a task with subtasks
//! runs them as a nested pipeline with the same short-circuit rule.

mod archive_pages;
mod close_pages;
mod create_pages;
mod failed_updates;
mod open_updates;
mod simple_updates;
mod start_vote;
mod update_list;
mod user_notice;

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bot_logging::bot_info;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use riconferme_core::localtime::local_date;
use riconferme_core::{
    run_pipeline, Clock, Config, ConfigError, Message, MessageError, MessageProvider,
    Outcome, PipelineUnit, TaskResult, UnitKind, UserInfo,
};
use riconferme_engine::{EditParams, Wiki, WikiGroup};
use thiserror::Error;

use crate::provider::TaskDataProvider;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnknownUnit {
    #[error("unknown task `{0}`")]
    Task(String),
    #[error("unknown subtask `{0}`")]
    Subtask(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    UpdateList,
    StartNew,
    StartVote,
    CloseOld,
}

impl TaskName {
    pub const ALL: [TaskName; 4] = [
        TaskName::UpdateList,
        TaskName::StartNew,
        TaskName::StartVote,
        TaskName::CloseOld,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::UpdateList => "update-list",
            TaskName::StartNew => "start-new",
            TaskName::StartVote => "start-vote",
            TaskName::CloseOld => "close-old",
        }
    }

    pub fn subtasks(self) -> &'static [SubtaskName] {
        match self {
            TaskName::UpdateList | TaskName::StartVote => &[],
            TaskName::StartNew => &[
                SubtaskName::CreatePages,
                SubtaskName::OpenUpdates,
                SubtaskName::UserNotice,
            ],
            TaskName::CloseOld => &[
                SubtaskName::ClosePages,
                SubtaskName::ArchivePages,
                SubtaskName::SimpleUpdates,
                SubtaskName::FailedUpdates,
            ],
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownUnit::Task(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskName {
    CreatePages,
    OpenUpdates,
    UserNotice,
    ClosePages,
    ArchivePages,
    SimpleUpdates,
    FailedUpdates,
}

impl SubtaskName {
    pub const ALL: [SubtaskName; 7] = [
        SubtaskName::CreatePages,
        SubtaskName::OpenUpdates,
        SubtaskName::UserNotice,
        SubtaskName::ClosePages,
        SubtaskName::ArchivePages,
        SubtaskName::SimpleUpdates,
        SubtaskName::FailedUpdates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubtaskName::CreatePages => "create-pages",
            SubtaskName::OpenUpdates => "open-updates",
            SubtaskName::UserNotice => "user-notice",
            SubtaskName::ClosePages => "close-pages",
            SubtaskName::ArchivePages => "archive-pages",
            SubtaskName::SimpleUpdates => "simple-updates",
            SubtaskName::FailedUpdates => "failed-updates",
        }
    }
}

impl fmt::Display for SubtaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubtaskName {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubtaskName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownUnit::Subtask(s.to_string()))
    }
}

/// A task or a subtask, run through the same pipeline contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Task(TaskName),
    Subtask(SubtaskName),
}

#[async_trait]
impl PipelineUnit<TaskContext> for Unit {
    fn name(&self) -> &str {
        match self {
            Unit::Task(task) => task.as_str(),
            Unit::Subtask(subtask) => subtask.as_str(),
        }
    }

    fn kind(&self) -> UnitKind {
        match self {
            Unit::Task(_) => UnitKind::Task,
            Unit::Subtask(_) => UnitKind::Subtask,
        }
    }

    async fn run(&self, ctx: &mut TaskContext) -> Result<TaskResult> {
        match *self {
            Unit::Task(TaskName::UpdateList) => update_list::run(ctx).await,
            Unit::Task(TaskName::StartVote) => start_vote::run(ctx).await,
            Unit::Task(task) => {
                let units: Vec<Unit> = task.subtasks().iter().copied().map(Unit::Subtask).collect();
                Ok(run_pipeline(&units, ctx).await)
            }
            Unit::Subtask(SubtaskName::CreatePages) => create_pages::run(ctx).await,
            Unit::Subtask(SubtaskName::OpenUpdates) => open_updates::run(ctx).await,
            Unit::Subtask(SubtaskName::UserNotice) => user_notice::run(ctx).await,
            Unit::Subtask(SubtaskName::ClosePages) => close_pages::run(ctx).await,
            Unit::Subtask(SubtaskName::ArchivePages) => archive_pages::run(ctx).await,
            Unit::Subtask(SubtaskName::SimpleUpdates) => simple_updates::run(ctx).await,
            Unit::Subtask(SubtaskName::FailedUpdates) => failed_updates::run(ctx).await,
        }
    }
}

/// What a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Tasks(Vec<TaskName>),
    Subtasks(Vec<SubtaskName>),
}

impl RunMode {
    /// Parses the CLI selection; every name is checked before anything runs.
    pub fn from_cli(tasks: &[String], subtasks: &[String]) -> Result<Self, UnknownUnit> {
        if !tasks.is_empty() {
            let tasks = tasks
                .iter()
                .map(|name| name.trim().parse())
                .collect::<Result<Vec<TaskName>, _>>()?;
            return Ok(RunMode::Tasks(tasks));
        }
        if !subtasks.is_empty() {
            let subtasks = subtasks
                .iter()
                .map(|name| name.trim().parse())
                .collect::<Result<Vec<SubtaskName>, _>>()?;
            return Ok(RunMode::Subtasks(subtasks));
        }
        Ok(RunMode::Full)
    }

    pub fn is_full(&self) -> bool {
        matches!(self, RunMode::Full)
    }

    fn units(&self) -> Vec<Unit> {
        match self {
            RunMode::Full => TaskName::ALL.into_iter().map(Unit::Task).collect(),
            RunMode::Tasks(tasks) => tasks.iter().copied().map(Unit::Task).collect(),
            RunMode::Subtasks(subtasks) => subtasks.iter().copied().map(Unit::Subtask).collect(),
        }
    }
}

pub struct TaskManager;

impl TaskManager {
    pub async fn run(mode: &RunMode, ctx: &mut TaskContext) -> TaskResult {
        let units = mode.units();
        bot_info!("Running {} units ({:?})", units.len(), mode);
        run_pipeline(&units, ctx).await
    }
}

/// Everything a unit may touch during one run.
pub struct TaskContext {
    pub wikis: WikiGroup,
    pub provider: TaskDataProvider,
    pub messages: MessageProvider,
    pub config: Config,
    pub clock: Clock,
    pub tz: Tz,
}

impl TaskContext {
    pub fn new(wikis: WikiGroup, config: Config, clock: Clock, tz: Tz) -> Self {
        Self {
            wikis,
            provider: TaskDataProvider::new(),
            messages: MessageProvider::default(),
            config,
            clock,
            tz,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Local date of the wiki.
    pub fn today(&self) -> NaiveDate {
        local_date(self.now(), self.tz)
    }

    pub fn msg(&self, key: &str) -> Result<Message, MessageError> {
        self.messages.get(key)
    }

    /// Owned copy of a config string, so it can outlive a borrow of `ctx`.
    pub fn config_str(&self, key: &str) -> Result<String, ConfigError> {
        self.config.get_str(key).map(str::to_string)
    }

    /// A list entry that may be absent from the configuration.
    pub fn config_list_or_empty(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        match self.config.get_list(key) {
            Err(ConfigError::Missing(_)) => Ok(Vec::new()),
            other => other,
        }
    }
}

/// A procedure being closed in this run, with what the closing subtasks
/// need to know about its user.
#[derive(Debug, Clone)]
struct ClosedProcedure {
    title: String,
    user: String,
    is_vote: bool,
    outcome: Outcome,
    info: UserInfo,
}

async fn closed_procedures(ctx: &mut TaskContext) -> Result<Vec<ClosedProcedure>> {
    let (now, tz) = (ctx.now(), ctx.tz);
    let mut pages = ctx
        .provider
        .pages_to_close(&mut ctx.wikis.main, &ctx.config, tz, now)
        .await?
        .to_vec();
    let mut closed = Vec::with_capacity(pages.len());
    for page in &mut pages {
        let info = ctx
            .provider
            .admin_list(&mut ctx.wikis.main, &ctx.config)
            .await?
            .get(page.user())
            .cloned()
            .ok_or_else(|| anyhow!("{} is not in the admin list", page.user()))?;
        closed.push(ClosedProcedure {
            title: page.title().to_string(),
            user: page.user().to_string(),
            is_vote: page.is_vote(&mut ctx.wikis.main).await?,
            outcome: page.outcome(&mut ctx.wikis.main).await?,
            info,
        });
    }
    ctx.provider.set_pages_to_close(pages);
    Ok(closed)
}

/// Reads `title` from `wiki`, applies `transform` and writes it back with
/// `summary`, unless nothing changed.
async fn rewrite_page<F>(
    wiki: &mut Wiki,
    title: &str,
    summary: String,
    transform: F,
) -> Result<bool>
where
    F: FnOnce(&str) -> Result<String>,
{
    let content = wiki.get_page_content(title).await?;
    let updated = transform(&content)?;
    if updated == content {
        bot_info!("{title} already up to date");
        return Ok(false);
    }
    wiki.edit_page(EditParams::replace(title, updated).summary(summary))
        .await?;
    Ok(true)
}
