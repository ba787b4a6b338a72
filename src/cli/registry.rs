use std::collections::HashMap;

use super::{shell_context::ShellContext, CommandResult};

pub type CommandHandler = fn(&mut ShellContext, &[&str]) -> CommandResult;

/// Headings `help` lists commands under, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandGroup {
    Session,
    Journal,
    Reports,
    Maintenance,
}

impl CommandGroup {
    pub const ALL: [CommandGroup; 4] = [
        CommandGroup::Session,
        CommandGroup::Journal,
        CommandGroup::Reports,
        CommandGroup::Maintenance,
    ];

    pub fn title(self) -> &'static str {
        match self {
            CommandGroup::Session => "Session",
            CommandGroup::Journal => "Journal",
            CommandGroup::Reports => "Reports",
            CommandGroup::Maintenance => "Maintenance",
        }
    }
}

pub struct CommandEntry {
    pub name: &'static str,
    pub group: CommandGroup,
    pub description: &'static str,
    pub usage: &'static str,
    pub aliases: &'static [&'static str],
    pub handler: CommandHandler,
}

impl CommandEntry {
    pub const fn new(
        name: &'static str,
        group: CommandGroup,
        description: &'static str,
        usage: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            group,
            description,
            usage,
            aliases: &[],
            handler,
        }
    }

    pub fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

/// Shell commands keyed by name. Lookups are case-insensitive and accept aliases.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandEntry>,
    aliases: HashMap<&'static str, &'static str>,
    order: Vec<&'static str>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entry`; a later entry with the same name replaces the earlier one in place.
    pub fn register(&mut self, entry: CommandEntry) {
        let name = entry.name;
        for &alias in entry.aliases {
            self.aliases.insert(alias, name);
        }
        if self.commands.insert(name, entry).is_none() {
            self.order.push(name);
        }
    }

    pub fn resolve(&self, word: &str) -> Option<&CommandEntry> {
        let word = word.trim().to_ascii_lowercase();
        let name = self
            .aliases
            .get(word.as_str())
            .copied()
            .unwrap_or(word.as_str());
        self.commands.get(name)
    }

    /// Commands under `group`, in registration order.
    pub fn in_group(&self, group: CommandGroup) -> Vec<&CommandEntry> {
        self.order
            .iter()
            .filter_map(|name| self.commands.get(name))
            .filter(|entry| entry.group == group)
            .collect()
    }

    /// Every word the shell accepts: command names first, then aliases.
    pub fn words(&self) -> Vec<&'static str> {
        let mut words = self.order.clone();
        for name in &self.order {
            if let Some(entry) = self.commands.get(name) {
                words.extend(entry.aliases.iter().copied());
            }
        }
        words
    }

    pub fn handler(&self, word: &str) -> Option<CommandHandler> {
        self.resolve(word).map(|entry| entry.handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut ShellContext, _: &[&str]) -> CommandResult {
        Ok(())
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(CommandEntry::new("tb", CommandGroup::Reports, "Trial balance", "tb", noop));
        registry.register(
            CommandEntry::new("exit", CommandGroup::Session, "Leave", "exit", noop)
                .with_aliases(&["quit", "q"]),
        );
        registry.register(CommandEntry::new("bs", CommandGroup::Reports, "Balance sheet", "bs", noop));
        registry
    }

    #[test]
    fn resolves_aliases_and_case() {
        let registry = registry();
        assert_eq!(registry.resolve("QUIT").map(|entry| entry.name), Some("exit"));
        assert_eq!(registry.resolve(" Tb ").map(|entry| entry.name), Some("tb"));
        assert!(registry.resolve("quitt").is_none());
        assert!(registry.handler("q").is_some());
    }

    #[test]
    fn groups_keep_registration_order() {
        let registry = registry();
        let reports: Vec<_> = registry
            .in_group(CommandGroup::Reports)
            .iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(reports, vec!["tb", "bs"]);
        assert!(registry.in_group(CommandGroup::Maintenance).is_empty());
    }

    #[test]
    fn words_list_names_before_aliases() {
        assert_eq!(registry().words(), vec!["tb", "exit", "bs", "quit", "q"]);
    }
}
