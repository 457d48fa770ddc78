use std::fmt;

/// Outcome of one pipeline unit.
///
/// The variants form a small bit lattice (`NOTHING = 0`, `GOOD = 1`,
/// `ERROR = 3`) so that merging two statuses is a bitwise OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Nothing,
    Good,
    Error,
}

impl TaskStatus {
    pub const fn bits(self) -> u8 {
        match self {
            TaskStatus::Nothing => 0,
            TaskStatus::Good => 1,
            TaskStatus::Error => 3,
        }
    }

    // Only 0, 1 and 3 are reachable by OR-ing valid statuses.
    const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => TaskStatus::Nothing,
            1 => TaskStatus::Good,
            _ => TaskStatus::Error,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, TaskStatus::Nothing | TaskStatus::Good)
    }

    pub const fn merge(self, other: TaskStatus) -> TaskStatus {
        TaskStatus::from_bits(self.bits() | other.bits())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Nothing => write!(f, "nothing to do"),
            TaskStatus::Good => write!(f, "ok"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// Status plus the human-readable errors collected while producing it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskResult {
    status: TaskStatus,
    errors: Vec<String>,
}

impl TaskResult {
    pub fn new(status: TaskStatus, errors: Vec<String>) -> Self {
        Self { status, errors }
    }

    pub fn nothing() -> Self {
        Self::new(TaskStatus::Nothing, Vec::new())
    }

    pub fn good() -> Self {
        Self::new(TaskStatus::Good, Vec::new())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TaskStatus::Error, vec![message.into()])
    }

    /// `Good` when `errors` is empty, `Error` otherwise.
    pub fn from_errors(errors: Vec<String>) -> Self {
        let status = if errors.is_empty() {
            TaskStatus::Good
        } else {
            TaskStatus::Error
        };
        Self::new(status, errors)
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn merge(&mut self, other: TaskResult) {
        self.status = self.status.merge(other.status);
        self.errors.extend(other.errors);
    }

    pub fn merged(mut self, other: TaskResult) -> Self {
        self.merge(other);
        self
    }

    /// Multi-line report suitable for the final log line of a run.
    pub fn report(&self) -> String {
        let mut out = format!("Execution result: {}", self.status);
        if !self.errors.is_empty() {
            out.push_str("\nErrors:");
            for err in &self.errors {
                out.push_str("\n - ");
                out.push_str(err);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 3] = [TaskStatus::Nothing, TaskStatus::Good, TaskStatus::Error];

    #[test]
    fn only_error_is_not_ok() {
        assert!(TaskStatus::Nothing.is_ok());
        assert!(TaskStatus::Good.is_ok());
        assert!(!TaskStatus::Error.is_ok());
    }

    #[test]
    fn status_merge_is_commutative_and_associative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.merge(b), b.merge(a));
                for c in ALL {
                    assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
                }
            }
        }
    }

    #[test]
    fn error_absorbs_everything() {
        for s in ALL {
            assert_eq!(TaskStatus::Error.merge(s), TaskStatus::Error);
        }
        assert_eq!(TaskStatus::Nothing.merge(TaskStatus::Good), TaskStatus::Good);
    }

    #[test]
    fn merge_concatenates_errors_in_order() {
        let merged = TaskResult::error("first")
            .merged(TaskResult::good())
            .merged(TaskResult::error("second"));
        assert_eq!(merged.status(), TaskStatus::Error);
        assert_eq!(merged.errors(), ["first", "second"]);
    }

    #[test]
    fn report_lists_errors_one_per_line() {
        let result = TaskResult::from_errors(vec!["a".into(), "b".into()]);
        assert_eq!(result.report(), "Execution result: error\nErrors:\n - a\n - b");
        assert_eq!(TaskResult::nothing().report(), "Execution result: nothing to do");
    }
}
