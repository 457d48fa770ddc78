use std::sync::Once;

use anyhow::anyhow;
use async_trait::async_trait;
use riconferme_core::{run_pipeline, PipelineUnit, TaskResult, TaskStatus, UnitKind};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bot_logging::initialize_for_tests);
}

#[derive(Default)]
struct Trace {
    ran: Vec<&'static str>,
}

enum Behaviour {
    Nothing,
    Good,
    Error,
    Fail,
}

struct FakeUnit {
    name: &'static str,
    behaviour: Behaviour,
}

fn unit(name: &'static str, behaviour: Behaviour) -> FakeUnit {
    FakeUnit { name, behaviour }
}

#[async_trait]
impl PipelineUnit<Trace> for FakeUnit {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Subtask
    }

    async fn run(&self, ctx: &mut Trace) -> anyhow::Result<TaskResult> {
        ctx.ran.push(self.name);
        match self.behaviour {
            Behaviour::Nothing => Ok(TaskResult::nothing()),
            Behaviour::Good => Ok(TaskResult::good()),
            Behaviour::Error => Ok(TaskResult::error(format!("{} degraded", self.name))),
            Behaviour::Fail => Err(anyhow!("page is protected")),
        }
    }
}

#[tokio::test]
async fn empty_pipeline_reports_nothing() {
    init_logging();
    let mut trace = Trace::default();
    let units: Vec<FakeUnit> = Vec::new();

    let result = run_pipeline(&units, &mut trace).await;

    assert_eq!(result, TaskResult::nothing());
}

#[tokio::test]
async fn all_units_run_in_order_when_ok() {
    init_logging();
    let mut trace = Trace::default();
    let units = vec![
        unit("a", Behaviour::Nothing),
        unit("b", Behaviour::Good),
        unit("c", Behaviour::Nothing),
    ];

    let result = run_pipeline(&units, &mut trace).await;

    assert_eq!(trace.ran, vec!["a", "b", "c"]);
    assert_eq!(result.status(), TaskStatus::Good);
    assert!(result.errors().is_empty());
}

#[tokio::test]
async fn error_result_halts_remaining_units() {
    init_logging();
    let mut trace = Trace::default();
    let units = vec![
        unit("a", Behaviour::Good),
        unit("b", Behaviour::Error),
        unit("c", Behaviour::Good),
        unit("d", Behaviour::Good),
    ];

    let result = run_pipeline(&units, &mut trace).await;

    assert_eq!(trace.ran, vec!["a", "b"]);
    assert_eq!(result.status(), TaskStatus::Error);
    assert_eq!(result.errors(), ["b degraded"]);
}

#[tokio::test]
async fn returned_error_becomes_error_result_and_halts() {
    init_logging();
    let mut trace = Trace::default();
    let units = vec![unit("a", Behaviour::Fail), unit("b", Behaviour::Good)];

    let result = run_pipeline(&units, &mut trace).await;

    assert_eq!(trace.ran, vec!["a"]);
    assert_eq!(result.status(), TaskStatus::Error);
    assert_eq!(result.errors(), ["subtask a: page is protected"]);
}
