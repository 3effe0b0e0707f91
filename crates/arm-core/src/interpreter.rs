use crate::context::RunContext;
use crate::error::Fault;
use crate::program::Command;

/// What a command tells the interpreter after running.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Carry on. `false` means the command failed or its test was negative.
    Continue(bool),
    /// Stop the current event's list for this tick.
    ExitEvent,
    /// Stop the whole run.
    ExitProgram,
    /// A runtime error. It is recorded and the whole run is cancelled.
    Fault(Fault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    Completed,
    ExitEvent,
    ExitProgram,
    Cancelled,
    Faulted,
}

/// Runs one event's command list from the top.
///
/// A failed command followed by a `StartBlock` skips that block; an `Else`
/// right after the block then runs its own block. A block that ran to its
/// `EndBlock` skips the `Else` branch after it. A failure anywhere else inside
/// a block abandons the rest of that block the same way, so its `Else` runs.
pub fn run_command_list(commands: &[Command], ctx: &mut RunContext<'_>) -> ListOutcome {
    let mut index = 0;

    while index < commands.len() {
        if ctx.cancelled() {
            return ListOutcome::Cancelled;
        }
        ctx.handles.state.set_command(index);

        let command = &commands[index];
        let succeeded = match command.run(ctx) {
            Signal::Continue(succeeded) => succeeded,
            Signal::ExitEvent => return ListOutcome::ExitEvent,
            Signal::ExitProgram => return ListOutcome::ExitProgram,
            Signal::Fault(fault) => {
                ctx.handles.record_fault(&fault, command.type_name());
                return ListOutcome::Faulted;
            }
        };
        log::trace!("{} #{index} -> {succeeded}", command.type_name());

        index = next_index(commands, index, succeeded);
    }

    ListOutcome::Completed
}

/// Index of the command to run after `index`. Always greater than `index`
/// and never past `commands.len()`.
#[must_use]
pub fn next_index(commands: &[Command], index: usize, succeeded: bool) -> usize {
    let len = commands.len();
    let command = &commands[index];
    let after = |end: Option<usize>| end.map_or(len, |end| end + 1);

    if command.is_block_end() {
        if commands.get(index + 1).is_some_and(Command::is_else) {
            return after(find_matching_end(commands, index + 2));
        }
        return index + 1;
    }

    if succeeded || command.is_else() {
        return index + 1;
    }

    if commands.get(index + 1).is_some_and(Command::is_block_start) {
        return after(find_matching_end(commands, index + 1));
    }

    if command.indent() > 0 {
        return after(enclosing_end(commands, index));
    }

    index + 1
}

/// The `EndBlock` matching the `StartBlock` at `start`.
#[must_use]
pub fn find_matching_end(commands: &[Command], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, command) in commands.iter().enumerate().skip(start) {
        if command.is_block_start() {
            depth += 1;
        } else if command.is_block_end() {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}

/// The `EndBlock` closing the innermost block that contains `index`.
#[must_use]
pub fn enclosing_end(commands: &[Command], index: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (position, command) in commands.iter().enumerate().skip(index + 1) {
        if command.is_block_start() {
            depth += 1;
        } else if command.is_block_end() {
            if depth == 0 {
                return Some(position);
            }
            depth -= 1;
        }
    }
    None
}
