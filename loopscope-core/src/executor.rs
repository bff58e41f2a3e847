//! ## loopscope-core::executor
//! **Action Executor**
//!
//! Applies exactly one primitive scheduling action to a `RuntimeState` and
//! returns the resulting state. Every primitive except `complete` records one
//! event log entry when it changes something; `tickAsync` records one entry per
//! resolved operation. Empty-stack pops, empty-queue dequeues and unrecognized
//! actions return the input state unchanged.
//!
//! Cross-queue priority is not decided here: queues drain in exactly the order
//! the scenario issues `dequeueAndRun`.

use im::Vector;
use tracing::{debug, trace, warn};

use crate::events::{EventAction, EventLogEntry, EventTarget};
use crate::ids::{EntityId, IdGenerator, IdPrefix};
use crate::kinds::{palette, Environment, Phase, QueueSelector, Status};
use crate::scenario::ScenarioAction;
use crate::state::{
    progress_percent, AsyncOperation, AsyncTemplate, FrameTemplate, RenderStage, RenderStep,
    RuntimeState, SourceRange, StackFrame, TaskTemplate,
};
use crate::time::VirtualClock;

/// Fields of an event log entry that vary per primitive.
struct Record {
    action: EventAction,
    target: EventTarget,
    task_id: Option<EntityId>,
    task_label: Option<String>,
    message: Option<String>,
}

impl Record {
    fn subject(action: EventAction, target: EventTarget, id: &EntityId, label: &str) -> Self {
        Self {
            action,
            target,
            task_id: Some(id.clone()),
            task_label: Some(label.to_string()),
            message: None,
        }
    }

    fn message(action: EventAction, target: EventTarget, message: impl Into<String>) -> Self {
        Self {
            action,
            target,
            task_id: None,
            task_label: None,
            message: Some(message.into()),
        }
    }
}

/// Executes primitives against a state. Owns the identity counter and the
/// logical clock of one engine instance; holds no reference to any state
/// between calls.
#[derive(Debug)]
pub struct Executor {
    ids: IdGenerator,
    clock: VirtualClock,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(VirtualClock::default())
    }
}

impl Executor {
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            ids: IdGenerator::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn ids_issued(&self) -> u64 {
        self.ids.issued()
    }

    /// Restarts identity generation and the logical clock.
    pub fn reset(&mut self) {
        self.ids.reset();
        self.clock.reset();
    }

    pub fn apply(&mut self, state: RuntimeState, action: &ScenarioAction) -> RuntimeState {
        trace!(action = action.name(), step = state.sim.current_step, "apply");
        match action {
            ScenarioAction::PushStack { frame } => self.push_stack(state, frame),
            ScenarioAction::PopStack => self.pop_stack(state),
            ScenarioAction::Log { message } => self.log(state, message),
            ScenarioAction::EnqueueMicrotask { task } => {
                self.enqueue(state, QueueSelector::Microtask, task)
            }
            ScenarioAction::EnqueueMacrotask { task } => {
                self.enqueue(state, QueueSelector::Macrotask, task)
            }
            ScenarioAction::EnqueueNextTick { task } => {
                self.enqueue(state, QueueSelector::NextTick, task)
            }
            ScenarioAction::StartAsync { operation } => self.start_async(state, operation),
            ScenarioAction::TickAsync => self.tick_async(state),
            ScenarioAction::SetPhase { phase } => self.set_phase(state, *phase),
            ScenarioAction::DequeueAndRun { queue } => self.dequeue_and_run(state, *queue),
            ScenarioAction::RunRender => self.run_render(state),
            ScenarioAction::Complete => complete(state),
            ScenarioAction::Unrecognized => {
                warn!(step = state.sim.current_step, "ignoring unrecognized action");
                state
            }
        }
    }

    fn record(&self, state: &mut RuntimeState, record: Record) {
        let entry = EventLogEntry {
            step: state.sim.current_step,
            timestamp: self.clock.advance(1),
            action: record.action,
            target: record.target,
            task_id: record.task_id,
            task_label: record.task_label,
            message: record.message,
        };
        debug!(%entry, "recorded");
        state.event_log.push_back(entry);
    }

    fn push_stack(&mut self, mut state: RuntimeState, template: &FrameTemplate) -> RuntimeState {
        let frame = StackFrame {
            id: self.ids.next(IdPrefix::Frame),
            label: template.label.clone(),
            range: template.range,
            color: template
                .color
                .clone()
                .unwrap_or_else(|| palette::CALL_STACK.to_string()),
        };
        state.sim.highlighted = Some(frame.range);
        let record = Record::subject(
            EventAction::Push,
            EventTarget::CallStack,
            &frame.id,
            &frame.label,
        );
        state.sim.call_stack.push_back(frame);
        self.record(&mut state, record);
        state
    }

    fn pop_stack(&mut self, mut state: RuntimeState) -> RuntimeState {
        let Some(popped) = state.sim.call_stack.pop_back() else {
            debug!(step = state.sim.current_step, "pop on empty call stack ignored");
            return state;
        };
        state.sim.highlighted = state
            .sim
            .call_stack
            .back()
            .map(|top| SourceRange::line(top.range.start));
        self.record(
            &mut state,
            Record::subject(
                EventAction::Pop,
                EventTarget::CallStack,
                &popped.id,
                &popped.label,
            ),
        );
        state
    }

    fn log(&mut self, mut state: RuntimeState, message: &str) -> RuntimeState {
        state.sim.console_output.push_back(message.to_string());
        self.record(
            &mut state,
            Record::message(EventAction::Log, EventTarget::Console, message),
        );
        state
    }

    fn enqueue(
        &mut self,
        mut state: RuntimeState,
        queue: QueueSelector,
        template: &TaskTemplate,
    ) -> RuntimeState {
        let (prefix, default_color) = match queue {
            QueueSelector::Microtask => (IdPrefix::Microtask, template.kind.canonical_color()),
            QueueSelector::Macrotask => (IdPrefix::Macrotask, template.kind.canonical_color()),
            QueueSelector::NextTick => (IdPrefix::NextTick, palette::PRIORITY),
        };
        let task = template.instantiate(
            self.ids.next(prefix),
            state.sim.current_step,
            default_color,
        );
        let record = Record::subject(EventAction::Enqueue, queue.into(), &task.id, &task.label);
        state.sim.queue_mut(queue).push_back(task);
        self.record(&mut state, record);
        state
    }

    fn start_async(&mut self, mut state: RuntimeState, template: &AsyncTemplate) -> RuntimeState {
        let operation = AsyncOperation {
            id: self.ids.next(IdPrefix::Async),
            kind: template.kind,
            label: template.label.clone(),
            range: template.range,
            progress: 0.0,
            total_steps: template.total_steps,
            remaining_steps: template.remaining_steps.unwrap_or(template.total_steps),
            callback_task: template.callback_task.clone(),
            color: template
                .color
                .clone()
                .unwrap_or_else(|| template.kind.canonical_color().to_string()),
        };
        let record = Record::subject(
            EventAction::Start,
            EventTarget::PendingOperations,
            &operation.id,
            &operation.label,
        );
        state.sim.pending_operations.push_back(operation);
        self.record(&mut state, record);
        state
    }

    fn tick_async(&mut self, mut state: RuntimeState) -> RuntimeState {
        let pending = std::mem::take(&mut state.sim.pending_operations);
        let mut still_pending = Vector::new();

        for mut operation in pending {
            let remaining = operation.remaining_steps.saturating_sub(1);
            if remaining > 0 {
                operation.remaining_steps = remaining;
                operation.progress = progress_percent(operation.total_steps, remaining);
                still_pending.push_back(operation);
                continue;
            }

            let queue = if operation.kind.resolves_to_microtask() {
                QueueSelector::Microtask
            } else {
                QueueSelector::Macrotask
            };
            let callback = &operation.callback_task;
            let task = callback.instantiate(
                self.ids.next(IdPrefix::Callback),
                state.sim.current_step,
                callback.kind.canonical_color(),
            );
            debug!(operation = %operation.id, task = %task.id, ?queue, "operation resolved");
            state.sim.queue_mut(queue).push_back(task);
            self.record(
                &mut state,
                Record::subject(
                    EventAction::Complete,
                    EventTarget::PendingOperations,
                    &operation.id,
                    &operation.label,
                ),
            );
        }

        state.sim.pending_operations = still_pending;
        state
    }

    fn set_phase(&mut self, mut state: RuntimeState, phase: Phase) -> RuntimeState {
        state.sim.phase = phase;
        self.record(
            &mut state,
            Record::message(EventAction::Phase, EventTarget::EventLoop, phase.as_str()),
        );
        state
    }

    fn dequeue_and_run(&mut self, mut state: RuntimeState, queue: QueueSelector) -> RuntimeState {
        let Some(task) = state.sim.queue_mut(queue).pop_front() else {
            debug!(?queue, step = state.sim.current_step, "dequeue on empty queue ignored");
            return state;
        };
        let frame = StackFrame {
            id: self.ids.next(IdPrefix::Frame),
            label: task.label.clone(),
            range: task.range,
            color: task.color.clone(),
        };
        state.sim.highlighted = Some(task.range);
        state.sim.call_stack.push_back(frame);
        self.record(
            &mut state,
            Record::subject(EventAction::Dequeue, queue.into(), &task.id, &task.label),
        );
        state
    }

    fn run_render(&mut self, mut state: RuntimeState) -> RuntimeState {
        state.sim.phase = Phase::Render;
        if state.sim.environment == Environment::Browser && state.sim.render_steps.is_empty() {
            for stage in RenderStage::PIPELINE {
                let step = RenderStep {
                    id: self.ids.next(IdPrefix::Render),
                    stage,
                    label: stage.label().to_string(),
                };
                state.sim.render_steps.push_back(step);
            }
        }
        self.record(
            &mut state,
            Record::message(EventAction::Start, EventTarget::Render, "Render cycle"),
        );
        state
    }
}

fn complete(mut state: RuntimeState) -> RuntimeState {
    state.sim.status = Status::Completed;
    state.sim.phase = Phase::Idle;
    state.sim.highlighted = None;
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::TaskKind;

    fn fresh() -> (Executor, RuntimeState) {
        (
            Executor::default(),
            RuntimeState::new(Environment::Browser, 1.0),
        )
    }

    fn push(label: &str, start: u32, end: u32) -> ScenarioAction {
        ScenarioAction::PushStack {
            frame: FrameTemplate::new(label, SourceRange::new(start, end)),
        }
    }

    fn micro(label: &str) -> ScenarioAction {
        ScenarioAction::EnqueueMicrotask {
            task: TaskTemplate::new(TaskKind::Promise, label),
        }
    }

    fn timer(kind: TaskKind, label: &str, total: u32) -> ScenarioAction {
        ScenarioAction::StartAsync {
            operation: AsyncTemplate {
                kind,
                label: label.to_string(),
                range: SourceRange::line(1),
                total_steps: total,
                remaining_steps: None,
                callback_task: TaskTemplate::new(kind, format!("{label} callback")),
                color: None,
            },
        }
    }

    #[test]
    fn push_and_pop_move_highlight() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &push("main()", 1, 10));
        let state = exec.apply(state, &push("inner()", 4, 6));
        assert_eq!(state.sim.highlighted, Some(SourceRange::new(4, 6)));

        let state = exec.apply(state, &ScenarioAction::PopStack);
        assert_eq!(state.sim.highlighted, Some(SourceRange::line(1)));
        let state = exec.apply(state, &ScenarioAction::PopStack);
        assert_eq!(state.sim.highlighted, None);
        assert!(state.sim.call_stack.is_empty());
        assert_eq!(state.event_log.len(), 4);
    }

    #[test]
    fn reset_restarts_identity_numbering() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &push("main()", 1, 1));
        let state = exec.apply(state, &micro("then"));
        assert_eq!(exec.ids_issued(), 2);
        let first = state.sim.microtask_queue[0].id.clone();

        exec.reset();
        assert_eq!(exec.ids_issued(), 0);
        let (_, fresh_state) = fresh();
        let again = exec.apply(fresh_state, &push("main()", 1, 1));
        let again = exec.apply(again, &micro("then"));
        assert_eq!(again.sim.microtask_queue[0].id, first);
    }

    #[test]
    fn pop_on_empty_stack_is_silent() {
        let (mut exec, state) = fresh();
        let before = state.clone();
        let after = exec.apply(state, &ScenarioAction::PopStack);
        assert_eq!(after, before);
    }

    #[test]
    fn enqueue_assigns_identity_step_and_default_colour() {
        let (mut exec, mut state) = fresh();
        state.sim.current_step = 7;
        let state = exec.apply(state, &micro("then"));
        let state = exec.apply(
            state,
            &ScenarioAction::EnqueueNextTick {
                task: TaskTemplate::new(TaskKind::NextTick, "tick"),
            },
        );
        let task = &state.sim.microtask_queue[0];
        assert_eq!(task.id.as_str(), "microtask-1");
        assert_eq!(task.created_at_step, 7);
        assert_eq!(task.color, palette::MICROTASK);
        assert_eq!(state.sim.priority_queue[0].color, palette::PRIORITY);
        assert_eq!(state.event_log[1].target, EventTarget::PriorityQueue);
    }

    #[test]
    fn dequeue_converts_head_task_into_frame() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &micro("first"));
        let state = exec.apply(state, &micro("second"));
        let state = exec.apply(
            state,
            &ScenarioAction::DequeueAndRun {
                queue: QueueSelector::Microtask,
            },
        );
        assert_eq!(state.sim.microtask_queue.len(), 1);
        assert_eq!(state.sim.microtask_queue[0].label, "second");
        let frame = state.sim.call_stack.back().unwrap();
        assert_eq!(frame.label, "first");
        assert_eq!(frame.id.as_str(), "frame-3");
        let entry = state.event_log.back().unwrap();
        assert_eq!(entry.action, EventAction::Dequeue);
        assert_eq!(entry.task_id.as_ref().unwrap().as_str(), "microtask-1");
    }

    #[test]
    fn dequeue_from_empty_queue_leaves_state_untouched() {
        let (mut exec, state) = fresh();
        let before = state.clone();
        let after = exec.apply(
            state,
            &ScenarioAction::DequeueAndRun {
                queue: QueueSelector::Macrotask,
            },
        );
        assert_eq!(after, before);
    }

    #[test]
    fn tick_resolves_promise_kinds_to_microtasks() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &timer(TaskKind::Fetch, "fetch", 2));
        let state = exec.apply(state, &timer(TaskKind::SetTimeout, "timer", 1));

        let state = exec.apply(state, &ScenarioAction::TickAsync);
        assert_eq!(state.sim.macrotask_queue.len(), 1);
        assert_eq!(state.sim.macrotask_queue[0].label, "timer callback");
        assert_eq!(state.sim.pending_operations.len(), 1);
        assert_eq!(state.sim.pending_operations[0].progress, 50.0);
        assert!(state.sim.microtask_queue.is_empty());

        let state = exec.apply(state, &ScenarioAction::TickAsync);
        assert!(state.sim.pending_operations.is_empty());
        assert_eq!(state.sim.microtask_queue.len(), 1);
        assert_eq!(state.sim.microtask_queue[0].id.as_str(), "callback-4");
        assert_eq!(state.sim.macrotask_queue.len(), 1);
    }

    #[test]
    fn tick_with_nothing_resolving_does_not_log() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &timer(TaskKind::Io, "read", 3));
        let logged = state.event_log.len();
        let state = exec.apply(state, &ScenarioAction::TickAsync);
        assert_eq!(state.event_log.len(), logged);
        assert_eq!(state.sim.pending_operations[0].remaining_steps, 2);
    }

    #[test]
    fn set_phase_logs_and_complete_does_not() {
        let (mut exec, state) = fresh();
        let state = exec.apply(
            state,
            &ScenarioAction::SetPhase {
                phase: Phase::Microtasks,
            },
        );
        assert_eq!(state.sim.phase, Phase::Microtasks);
        assert_eq!(state.event_log.len(), 1);

        let state = exec.apply(state, &ScenarioAction::Complete);
        assert_eq!(state.sim.status, Status::Completed);
        assert_eq!(state.sim.phase, Phase::Idle);
        assert_eq!(state.event_log.len(), 1);
    }

    #[test]
    fn render_seeds_pipeline_once_in_browser_only() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &ScenarioAction::RunRender);
        let state = exec.apply(state, &ScenarioAction::RunRender);
        assert_eq!(state.sim.phase, Phase::Render);
        assert_eq!(state.sim.render_steps.len(), 4);
        assert_eq!(state.event_log.len(), 2);

        let server = RuntimeState::new(Environment::Server, 1.0);
        let server = exec.apply(server, &ScenarioAction::RunRender);
        assert!(server.sim.render_steps.is_empty());
        assert_eq!(server.sim.phase, Phase::Render);
    }

    #[test]
    fn unrecognized_action_is_a_no_op() {
        let (mut exec, state) = fresh();
        let before = state.clone();
        assert_eq!(exec.apply(state, &ScenarioAction::Unrecognized), before);
    }

    #[test]
    fn timestamps_are_logical_and_monotonic() {
        let (mut exec, state) = fresh();
        let state = exec.apply(state, &ScenarioAction::Log { message: "a".into() });
        let state = exec.apply(state, &ScenarioAction::Log { message: "b".into() });
        let stamps: Vec<u64> = state.event_log.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![1, 2]);
        assert_eq!(
            state.sim.console_output.iter().cloned().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn queues_drain_in_insertion_order(labels in prop::collection::vec("[a-z]{1,8}", 1..24)) {
                let mut exec = Executor::default();
                let mut state = RuntimeState::new(Environment::Server, 1.0);
                for label in &labels {
                    state = exec.apply(state, &ScenarioAction::EnqueueMacrotask {
                        task: TaskTemplate::new(TaskKind::SetImmediate, label.clone()),
                    });
                }
                let mut drained = Vec::new();
                for _ in &labels {
                    state = exec.apply(state, &ScenarioAction::DequeueAndRun { queue: QueueSelector::Macrotask });
                    drained.push(state.sim.call_stack.back().unwrap().label.clone());
                    state = exec.apply(state, &ScenarioAction::PopStack);
                }
                prop_assert_eq!(drained, labels);
                prop_assert!(state.sim.call_stack.is_empty());
            }

            #[test]
            fn interleaved_queues_each_stay_fifo(
                ops in prop::collection::vec((0usize..3, any::<bool>()), 1..64)
            ) {
                const QUEUES: [QueueSelector; 3] =
                    [QueueSelector::Microtask, QueueSelector::Macrotask, QueueSelector::NextTick];
                let mut exec = Executor::default();
                let mut state = RuntimeState::new(Environment::Server, 1.0);
                let mut enqueued: [Vec<String>; 3] = Default::default();
                let mut drained: [Vec<String>; 3] = Default::default();

                for (i, (which, is_enqueue)) in ops.into_iter().enumerate() {
                    let queue = QUEUES[which];
                    if is_enqueue {
                        let label = format!("t{i}");
                        let task = TaskTemplate::new(TaskKind::Promise, label.clone());
                        let action = match queue {
                            QueueSelector::Microtask => ScenarioAction::EnqueueMicrotask { task },
                            QueueSelector::Macrotask => ScenarioAction::EnqueueMacrotask { task },
                            QueueSelector::NextTick => ScenarioAction::EnqueueNextTick { task },
                        };
                        state = exec.apply(state, &action);
                        enqueued[which].push(label);
                    } else {
                        let depth = state.sim.stack_depth();
                        state = exec.apply(state, &ScenarioAction::DequeueAndRun { queue });
                        if state.sim.stack_depth() > depth {
                            drained[which].push(state.sim.call_stack.back().unwrap().label.clone());
                            state = exec.apply(state, &ScenarioAction::PopStack);
                        }
                    }
                }

                for which in 0..3 {
                    let remaining: Vec<String> =
                        state.sim.queue(QUEUES[which]).iter().map(|t| t.label.clone()).collect();
                    prop_assert_eq!(&enqueued[which][..drained[which].len()], &drained[which][..]);
                    prop_assert_eq!(&enqueued[which][drained[which].len()..], &remaining[..]);
                }
            }

            #[test]
            fn stack_pops_most_recent_push(depth in 1usize..32) {
                let mut exec = Executor::default();
                let mut state = RuntimeState::new(Environment::Browser, 1.0);
                for i in 0..depth {
                    state = exec.apply(state, &push(&format!("f{i}"), i as u32, i as u32));
                }
                for i in (0..depth).rev() {
                    let top = state.sim.call_stack.back().unwrap().label.clone();
                    prop_assert_eq!(top, format!("f{i}"));
                    state = exec.apply(state, &ScenarioAction::PopStack);
                }
                prop_assert_eq!(state.sim.stack_depth(), 0);
            }
        }
    }
}
