//! ## loopscope-simulator::validation
//! **Load-time scenario checks**
//!
//! A scenario is dry-run through a fresh executor so that stack and queue
//! checks see exactly what replay would see, including callbacks produced by
//! `tickAsync`. Structural defects (no steps, malformed id, misplaced
//! `complete`) are always errors. Replay-tolerated defects (stack underflow,
//! dequeue from an empty queue, unknown actions, rendering outside the browser)
//! are warnings unless validation is strict.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use loopscope_core::prelude::*;

use crate::error::ScenarioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Zero-based index of the offending step, if the issue is tied to one.
    pub step: Option<usize>,
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn error(step: Option<usize>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            step,
            code,
            message: message.into(),
        }
    }

    fn warning(step: usize, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            step: Some(step),
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.step {
            Some(step) => write!(f, "{severity} at step {step} [{}]: {}", self.code, self.message),
            None => write!(f, "{severity} [{}]: {}", self.code, self.message),
        }
    }
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[a-z0-9]+(-[a-z0-9]+)*$").expect("scenario id pattern is a valid regex")
    })
}

/// Collects every issue found in `scenario` when simulated in `environment`.
pub fn validate(scenario: &Scenario, environment: Environment) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !id_pattern().is_match(&scenario.id) {
        issues.push(ValidationIssue::error(
            None,
            "invalid_id",
            format!("'{}' is not a lowercase, dash-separated id", scenario.id),
        ));
    }

    if scenario.is_empty() {
        issues.push(ValidationIssue::error(None, "empty_scenario", "scenario has no steps"));
        return issues;
    }

    if !scenario.is_terminated() {
        issues.push(ValidationIssue::error(
            Some(scenario.len() - 1),
            "missing_complete",
            "the final step must be `complete`",
        ));
    }

    let environment = scenario.environment.resolve(environment);
    let mut executor = Executor::default();
    let mut state = RuntimeState::new(environment, 1.0);

    for (index, step) in scenario.steps.iter().enumerate() {
        let action = &step.action;
        match action {
            ScenarioAction::Complete if index + 1 < scenario.len() => {
                issues.push(ValidationIssue::error(
                    Some(index),
                    "early_complete",
                    "`complete` must only appear as the final step",
                ));
            }
            ScenarioAction::PopStack if state.sim.call_stack.is_empty() => {
                issues.push(ValidationIssue::warning(
                    index,
                    "stack_underflow",
                    "popStack on an empty call stack",
                ));
            }
            ScenarioAction::DequeueAndRun { queue } if state.sim.queue(*queue).is_empty() => {
                issues.push(ValidationIssue::warning(
                    index,
                    "empty_dequeue",
                    format!("dequeueAndRun({queue:?}) on an empty queue"),
                ));
            }
            ScenarioAction::RunRender if environment != Environment::Browser => {
                issues.push(ValidationIssue::warning(
                    index,
                    "render_outside_browser",
                    format!("runRender in the {environment} environment"),
                ));
            }
            ScenarioAction::Unrecognized => {
                issues.push(ValidationIssue::warning(
                    index,
                    "unknown_action",
                    "unrecognized action is ignored on replay",
                ));
            }
            _ => {}
        }
        state.sim.current_step += 1;
        state = executor.apply(state, action);
    }

    issues
}

/// Validates and returns the warnings that were tolerated. In strict mode
/// warnings are rejected too.
pub fn check(
    scenario: &Scenario,
    environment: Environment,
    strict: bool,
) -> Result<Vec<ValidationIssue>, ScenarioError> {
    let issues = validate(scenario, environment);
    if issues.iter().any(|issue| strict || issue.is_error()) {
        return Err(ScenarioError::Invalid {
            id: scenario.id.clone(),
            issues,
        });
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(id: &str, actions: Vec<ScenarioAction>) -> Scenario {
        Scenario::from_steps(
            id,
            DeclaredEnvironment::Both,
            actions.into_iter().map(ScenarioStep::execute).collect(),
        )
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<&'static str> {
        issues.iter().map(|issue| issue.code).collect()
    }

    #[test]
    fn clean_scenario_has_no_issues() {
        let s = scenario(
            "clean",
            vec![
                ScenarioAction::EnqueueMicrotask {
                    task: TaskTemplate::new(TaskKind::Promise, "then"),
                },
                ScenarioAction::DequeueAndRun {
                    queue: QueueSelector::Microtask,
                },
                ScenarioAction::PopStack,
                ScenarioAction::Complete,
            ],
        );
        assert!(validate(&s, Environment::Browser).is_empty());
        assert!(check(&s, Environment::Browser, true).unwrap().is_empty());
    }

    #[test]
    fn structural_defects_are_errors() {
        let empty = scenario("Bad Id", vec![]);
        assert_eq!(
            codes(&validate(&empty, Environment::Browser)),
            vec!["invalid_id", "empty_scenario"]
        );

        let misplaced = scenario(
            "misplaced",
            vec![ScenarioAction::Complete, ScenarioAction::Log { message: "x".into() }],
        );
        let issues = validate(&misplaced, Environment::Browser);
        assert_eq!(codes(&issues), vec!["missing_complete", "early_complete"]);
        assert!(check(&misplaced, Environment::Browser, false).is_err());
    }

    #[test]
    fn replay_tolerated_defects_are_warnings() {
        let s = scenario(
            "sloppy",
            vec![
                ScenarioAction::PopStack,
                ScenarioAction::DequeueAndRun {
                    queue: QueueSelector::NextTick,
                },
                ScenarioAction::Unrecognized,
                ScenarioAction::Complete,
            ],
        );
        let warnings = check(&s, Environment::Browser, false).unwrap();
        assert_eq!(
            codes(&warnings),
            vec!["stack_underflow", "empty_dequeue", "unknown_action"]
        );
        assert_eq!(warnings[0].step, Some(0));

        let err = check(&s, Environment::Browser, true).unwrap_err();
        assert!(err.to_string().contains("stack_underflow"));
    }

    #[test]
    fn resolved_callbacks_count_as_queued() {
        let s = scenario(
            "resolved",
            vec![
                ScenarioAction::StartAsync {
                    operation: AsyncTemplate {
                        kind: TaskKind::Fetch,
                        label: "fetch".into(),
                        range: SourceRange::line(1),
                        total_steps: 1,
                        remaining_steps: None,
                        callback_task: TaskTemplate::new(TaskKind::Fetch, "fetch callback"),
                        color: None,
                    },
                },
                ScenarioAction::TickAsync,
                ScenarioAction::DequeueAndRun {
                    queue: QueueSelector::Microtask,
                },
                ScenarioAction::PopStack,
                ScenarioAction::Complete,
            ],
        );
        assert!(validate(&s, Environment::Browser).is_empty());
    }

    #[test]
    fn render_on_server_is_flagged() {
        let s = scenario("render", vec![ScenarioAction::RunRender, ScenarioAction::Complete]);
        assert!(validate(&s, Environment::Browser).is_empty());
        assert_eq!(
            codes(&validate(&s, Environment::Server)),
            vec!["render_outside_browser"]
        );
    }
}
