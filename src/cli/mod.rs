//! Interactive and scripted shell over [`crate::LedgerEngine`].

mod commands;
pub mod errors;
pub mod output;
mod registry;
mod shell;
mod shell_context;

pub use errors::{CliError, CommandError};
pub use shell::{run_cli, SCRIPT_ENV};
pub use shell_context::{CliMode, ShellContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;
