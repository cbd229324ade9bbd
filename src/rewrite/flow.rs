//! Condition/action flow evaluation.
//!
//! A rule's child steps form alternating runs of conditions and actions.
//! The flow combinator decides how a run of conditions gates the run of
//! actions that follows it:
//!
//! - `And` (default): every condition must succeed or the rule stops with
//!   the failing status
//! - `Or`: one succeeding condition unlocks the actions (remaining
//!   conditions in the run are skipped); none succeeding fails the rule
//! - `All`: conditions run for their side effects regardless of outcome and
//!   the actions always run
//!
//! `Finished` is terminal everywhere: it stops the whole rule immediately,
//! signalling "emit the current value as-is".

use crate::rewrite::context::RewriteContext;
use crate::rewrite::step::Step;
use crate::rewrite::RewriteError;
use serde::{Deserialize, Serialize};

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failure,
    /// Terminal: stop processing the entire rule and emit as-is.
    Finished,
}

/// How sibling conditions gate sibling actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepFlow {
    #[default]
    And,
    Or,
    All,
}

/// Evaluate an ordered step list under the given flow.
pub fn evaluate(
    flow: StepFlow,
    steps: &[Step],
    context: &mut RewriteContext<'_>,
) -> Result<StepStatus, RewriteError> {
    match flow {
        StepFlow::And => and_flow(steps, context),
        StepFlow::Or => or_flow(steps, context),
        StepFlow::All => all_flow(steps, context),
    }
}

/// Cursor over a step list that peeks at whether the next step is a
/// condition or an action, so flows can consume alternating runs.
struct StepCursor<'a> {
    steps: &'a [Step],
    position: usize,
}

impl<'a> StepCursor<'a> {
    fn new(steps: &'a [Step]) -> Self {
        StepCursor { steps, position: 0 }
    }

    fn has_next(&self) -> bool {
        self.position < self.steps.len()
    }

    fn has_next_condition(&self) -> bool {
        self.steps
            .get(self.position)
            .map(Step::is_condition)
            .unwrap_or(false)
    }

    fn has_next_action(&self) -> bool {
        self.steps
            .get(self.position)
            .map(|s| !s.is_condition())
            .unwrap_or(false)
    }

    fn next(&mut self) -> &'a Step {
        let step = &self.steps[self.position];
        self.position += 1;
        step
    }
}

fn and_flow(steps: &[Step], context: &mut RewriteContext<'_>) -> Result<StepStatus, RewriteError> {
    let mut cursor = StepCursor::new(steps);
    while cursor.has_next() {
        while cursor.has_next_condition() {
            let status = cursor.next().process(context)?;
            if status != StepStatus::Success {
                return Ok(status);
            }
        }
        let status = run_actions(&mut cursor, context)?;
        if status != StepStatus::Success {
            return Ok(status);
        }
    }
    Ok(StepStatus::Success)
}

fn or_flow(steps: &[Step], context: &mut RewriteContext<'_>) -> Result<StepStatus, RewriteError> {
    let mut cursor = StepCursor::new(steps);
    while cursor.has_next() {
        let mut saw_condition = false;
        let mut group_status = StepStatus::Failure;
        let mut last_status = StepStatus::Failure;
        while cursor.has_next_condition() {
            let step = cursor.next();
            saw_condition = true;
            if group_status == StepStatus::Failure {
                last_status = step.process(context)?;
                match last_status {
                    StepStatus::Success => group_status = StepStatus::Success,
                    StepStatus::Finished => return Ok(StepStatus::Finished),
                    StepStatus::Failure => {}
                }
            }
        }
        if saw_condition && group_status != StepStatus::Success {
            return Ok(last_status);
        }
        let status = run_actions(&mut cursor, context)?;
        if status != StepStatus::Success {
            return Ok(status);
        }
    }
    Ok(StepStatus::Success)
}

fn all_flow(steps: &[Step], context: &mut RewriteContext<'_>) -> Result<StepStatus, RewriteError> {
    let mut cursor = StepCursor::new(steps);
    while cursor.has_next() {
        while cursor.has_next_condition() {
            let status = cursor.next().process(context)?;
            if status == StepStatus::Finished {
                return Ok(StepStatus::Finished);
            }
        }
        let status = run_actions(&mut cursor, context)?;
        if status == StepStatus::Finished {
            return Ok(StepStatus::Finished);
        }
    }
    Ok(StepStatus::Success)
}

/// Run the current action group. A failing action marks the group failed and
/// skips the actions after it, but the group is still consumed as a unit.
fn run_actions(
    cursor: &mut StepCursor<'_>,
    context: &mut RewriteContext<'_>,
) -> Result<StepStatus, RewriteError> {
    let mut group_status = StepStatus::Success;
    while cursor.has_next_action() {
        let step = cursor.next();
        if group_status == StepStatus::Success {
            match step.process(context)? {
                StepStatus::Failure => group_status = StepStatus::Failure,
                StepStatus::Finished => return Ok(StepStatus::Finished),
                StepStatus::Success => {}
            }
        }
    }
    Ok(group_status)
}
