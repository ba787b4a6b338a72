use dialoguer::{theme::ColorfulTheme, Confirm};
use strsim::levenshtein;
use tracing::debug;

use crate::{
    config::{ConfigManager, EngineConfig},
    engine::LedgerEngine,
};

use super::{
    commands,
    errors::{CliError, CommandError},
    output,
    registry::CommandRegistry,
    LoopControl,
};

const DEFAULT_USER: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub engine: LedgerEngine,
    pub config: EngineConfig,
    pub theme: ColorfulTheme,
    pub user_id: String,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let config = ConfigManager::new()?.load()?;
        let engine = LedgerEngine::from_config(&config)?;
        debug!(ledger = %config.ledger_path().display(), "shell opened ledger");

        let mut registry = CommandRegistry::new();
        commands::register_all(&mut registry);

        Ok(Self {
            mode,
            registry,
            engine,
            config,
            theme: ColorfulTheme::default(),
            user_id: DEFAULT_USER.to_string(),
            last_command: None,
            running: true,
        })
    }

    pub fn prompt(&self) -> String {
        format!("ledger({})> ", self.user_id)
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.words()
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        if let Some(handler) = self.registry.handler(command) {
            match handler(self, args) {
                Ok(()) => Ok(LoopControl::Continue),
                Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
                Err(err) => Err(err),
            }
        } else {
            self.suggest_command(raw);
            Ok(LoopControl::Continue)
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));

        let needle = input.to_ascii_lowercase();
        let best = self
            .registry
            .words()
            .into_iter()
            .map(|name| (levenshtein(name, &needle), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 2 {
                output::info(format!("Suggestion: `{}`?", name));
            }
        }
    }

    /// Script mode never prompts and treats every confirmation as accepted.
    pub(crate) fn confirm(&self, prompt: &str) -> Result<bool, CommandError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(CommandError::from)
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            other => output::error(other),
        }
    }
}
