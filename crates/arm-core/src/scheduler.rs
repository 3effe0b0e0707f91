use std::time::Instant;

use arm_script::Value;
use indexmap::IndexMap;

use crate::constants::CoreConstants;
use crate::context::{RunContext, RunHandles};
use crate::events::FinishReason;
use crate::interpreter::{ListOutcome, run_command_list};
use crate::namespace::Namespace;
use crate::program::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished(FinishReason),
}

/// Drives a program tick by tick: samples every event and runs the lists of
/// the active ones, in program order.
pub struct Scheduler {
    program: Program,
    namespace: Namespace,
    handles: RunHandles,
    ticks: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new(program: Program, handles: RunHandles, variables: IndexMap<String, Value>) -> Self {
        let mut namespace =
            Namespace::new(handles.env.clone(), handles.stop.clone(), &handles.config);
        for (name, value) in variables {
            if let Err(err) = namespace.set(&name, value) {
                handles.logger.warn(
                    CoreConstants::SYSTEM_ACTIVITY,
                    format!("Ignoring initial variable '{name}': {err}"),
                );
            }
        }

        Self {
            program,
            namespace,
            handles,
            ticks: 0,
        }
    }

    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick. On the first tick one-shot events go before the rest.
    pub fn tick(&mut self) -> TickOutcome {
        if self.handles.cancelled() {
            return TickOutcome::Finished(self.stop_reason());
        }

        let order = self.tick_order();
        self.ticks += 1;

        for index in order {
            if self.handles.cancelled() {
                return TickOutcome::Finished(self.stop_reason());
            }

            let event = &mut self.program.events_mut()[index];
            if !event.is_active(&self.handles) {
                continue;
            }

            self.handles.state.set_event(index);
            let mut ctx = RunContext {
                namespace: &mut self.namespace,
                handles: &self.handles,
            };
            let outcome = run_command_list(event.commands(), &mut ctx);
            self.handles.state.reset();

            match outcome {
                ListOutcome::Completed | ListOutcome::ExitEvent => {}
                ListOutcome::ExitProgram => return TickOutcome::Finished(FinishReason::Exited),
                ListOutcome::Cancelled => return TickOutcome::Finished(self.stop_reason()),
                ListOutcome::Faulted => return TickOutcome::Finished(FinishReason::Faulted),
            }
        }

        if self.program.is_exhausted() {
            return TickOutcome::Finished(FinishReason::Completed);
        }
        TickOutcome::Continue
    }

    /// Ticks at the configured rate until the program ends or is cancelled.
    pub fn run(&mut self) -> FinishReason {
        let period = self.handles.config.tick_period();
        let poll = self.handles.config.poll_interval();

        loop {
            let started = Instant::now();
            if let TickOutcome::Finished(reason) = self.tick() {
                return reason;
            }

            let elapsed = started.elapsed();
            if elapsed < period && !self.handles.stop.sleep_interruptible(period - elapsed, poll)
            {
                return self.stop_reason();
            }
        }
    }

    /// A stop caused by a fault in a nested run still counts as a fault here.
    fn stop_reason(&self) -> FinishReason {
        if self.handles.faulted() {
            FinishReason::Faulted
        } else {
            FinishReason::Cancelled
        }
    }

    fn tick_order(&self) -> Vec<usize> {
        let events = self.program.events();
        if self.ticks > 0 {
            return (0..events.len()).collect();
        }
        let (mut order, rest): (Vec<usize>, Vec<usize>) =
            (0..events.len()).partition(|&index| events[index].kind().is_one_shot());
        order.extend(rest);
        order
    }
}
