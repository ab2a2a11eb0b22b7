use std::process::Command;

use crate::core::catalog::{Action, Catalog};
use crate::core::error::{DorisError, ResolvedCommand, Result};
use crate::core::prompt::Prompter;
use crate::output::Printer;

/// Whether a resolved command actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Ran(i32),
    Declined,
}

/// Turns a resolved command into a shell invocation. Actions flagged with a
/// warning require explicit confirmation first; anything but yes declines.
pub struct Executor<'a> {
    catalog: &'a Catalog,
    printer: Printer,
}

impl<'a> Executor<'a> {
    pub fn new(catalog: &'a Catalog, printer: Printer) -> Executor<'a> {
        Executor { catalog, printer }
    }

    pub fn execute(
        &self,
        command: &ResolvedCommand,
        prompter: &mut dyn Prompter,
    ) -> Result<ExecutionOutcome> {
        let action = self.catalog.get(&command.action).ok_or_else(|| {
            DorisError::resolution(format!("action '{}' is not in the catalog", command.action))
        })?;

        if action.warning && !self.confirm(&command.action, action, prompter)? {
            return Ok(ExecutionOutcome::Declined);
        }

        let line = build_command_line(&command.action, action, &command.args);
        let expanded = shellexpand::tilde(&line).into_owned();
        self.printer.info(&format!("running: {}", expanded));

        let status = Command::new("sh").arg("-c").arg(&expanded).status()?;
        Ok(ExecutionOutcome::Ran(status.code().unwrap_or(-1)))
    }

    fn confirm(
        &self,
        action_id: &str,
        action: &Action,
        prompter: &mut dyn Prompter,
    ) -> Result<bool> {
        self.printer
            .warning(&format!("'{}': {}", action_id, action.description));
        let answer = prompter.read_line("Run it anyway? [y/N] ")?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// The command line is the action name followed by one formatted argument per
/// declared slot. Each value is quoted with its format prefix outside the
/// quotes; unset optional slots become empty quoted strings so positions stay
/// stable.
pub(crate) fn build_command_line(
    action_id: &str,
    action: &Action,
    args: &[Option<String>],
) -> String {
    let mut line = action_id.to_string();
    for (spec, value) in action.args.iter().zip(args) {
        let value = value.as_deref().unwrap_or("");
        line.push(' ');
        line.push_str(&spec.format);
        line.push('"');
        line.push_str(value);
        line.push('"');
    }
    line
}
