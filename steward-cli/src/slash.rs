//! Slash command registry for REPL command discovery.
//!
//! Provides structured metadata for all `/command` slash commands, enabling
//! categorized help, alias resolution, and fuzzy matching.

use steward_core::router::{ToolCandidate, ToolMatcher};

/// Categories for grouping commands in `/help` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    Session,
    Agent,
    System,
}

impl CommandCategory {
    pub fn label(&self) -> &'static str {
        match self {
            CommandCategory::Session => "Session",
            CommandCategory::Agent => "Agent",
            CommandCategory::System => "System",
        }
    }

    pub fn all() -> &'static [CommandCategory] {
        &[
            CommandCategory::Session,
            CommandCategory::Agent,
            CommandCategory::System,
        ]
    }
}

/// Metadata describing a slash command.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    /// Primary name including the slash, e.g., "/help".
    pub name: &'static str,
    /// Alternative aliases, e.g., &["/exit", "/q"] for /quit.
    pub aliases: &'static [&'static str],
    /// One-line description shown in /help.
    pub description: &'static str,
    /// Usage pattern, e.g., "/config [section]".
    pub usage: &'static str,
    /// Category for grouping in /help.
    pub category: CommandCategory,
}

/// Registry holding all slash commands with their metadata.
pub struct CommandRegistry {
    commands: Vec<CommandInfo>,
}

impl CommandRegistry {
    /// Create a registry pre-populated with all default commands.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            commands: Vec::new(),
        };
        registry.register_defaults();
        registry
    }

    fn register(&mut self, info: CommandInfo) {
        self.commands.push(info);
    }

    fn register_defaults(&mut self) {
        self.register(CommandInfo {
            name: "/quit",
            aliases: &["/exit", "/q"],
            description: "Exit Steward",
            usage: "/quit",
            category: CommandCategory::Session,
        });
        self.register(CommandInfo {
            name: "/clear",
            aliases: &[],
            description: "Clear the screen",
            usage: "/clear",
            category: CommandCategory::Session,
        });
        self.register(CommandInfo {
            name: "/help",
            aliases: &["/h", "/?"],
            description: "Show available commands",
            usage: "/help",
            category: CommandCategory::Session,
        });
        self.register(CommandInfo {
            name: "/tools",
            aliases: &[],
            description: "List registered tools with their risk tiers",
            usage: "/tools",
            category: CommandCategory::Agent,
        });
        self.register(CommandInfo {
            name: "/plan",
            aliases: &[],
            description: "Show engine scheduling settings",
            usage: "/plan",
            category: CommandCategory::Agent,
        });
        self.register(CommandInfo {
            name: "/config",
            aliases: &[],
            description: "Show the active configuration",
            usage: "/config",
            category: CommandCategory::System,
        });
    }

    /// Resolve a command name or alias to its canonical name.
    pub fn resolve(&self, input: &str) -> Option<&CommandInfo> {
        let token = input.split_whitespace().next()?;
        self.commands
            .iter()
            .find(|c| c.name == token || c.aliases.contains(&token))
    }

    /// Fuzzy-resolve a misspelled command through the keyword matcher.
    pub fn resolve_fuzzy(&self, input: &str) -> Option<&CommandInfo> {
        let candidates: Vec<ToolCandidate> = self
            .commands
            .iter()
            .map(|c| ToolCandidate {
                name: c.name.to_string(),
                keywords: std::iter::once(c.name.trim_start_matches('/'))
                    .chain(c.aliases.iter().map(|a| a.trim_start_matches('/')))
                    .map(String::from)
                    .collect(),
                examples: vec![
                    c.name.trim_start_matches('/').to_string(),
                    c.description.to_string(),
                ],
            })
            .collect();
        let matcher = ToolMatcher::new(candidates, 0.75);
        let (best, _score) = matcher.best_match(input.trim_start_matches('/'))?;
        let name = best.name.clone();
        self.commands.iter().find(|c| c.name == name)
    }

    /// Format the categorized help text.
    pub fn help_text(&self) -> String {
        let mut out = String::from("Available commands:\n");
        for category in CommandCategory::all() {
            let group: Vec<&CommandInfo> = self
                .commands
                .iter()
                .filter(|c| c.category == *category)
                .collect();
            if group.is_empty() {
                continue;
            }
            out.push_str(&format!("\n  {}\n", category.label()));
            for info in group {
                let aliases = if info.aliases.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", info.aliases.join(", "))
                };
                out.push_str(&format!(
                    "    {:<12}{} — {}\n",
                    info.usage, aliases, info.description
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name() {
        let registry = CommandRegistry::with_defaults();
        assert_eq!(registry.resolve("/help").unwrap().name, "/help");
        assert_eq!(registry.resolve("/quit now").unwrap().name, "/quit");
    }

    #[test]
    fn test_resolve_by_alias() {
        let registry = CommandRegistry::with_defaults();
        assert_eq!(registry.resolve("/exit").unwrap().name, "/quit");
        assert_eq!(registry.resolve("/?").unwrap().name, "/help");
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = CommandRegistry::with_defaults();
        assert!(registry.resolve("/frobnicate").is_none());
    }

    #[test]
    fn test_fuzzy_resolution() {
        let registry = CommandRegistry::with_defaults();
        // Exact keyword hit scores well above the threshold.
        assert_eq!(registry.resolve_fuzzy("/quit").unwrap().name, "/quit");
        // Nonsense stays unresolved.
        assert!(registry.resolve_fuzzy("/xyzzy").is_none());
    }

    #[test]
    fn test_help_text_lists_all_categories() {
        let registry = CommandRegistry::with_defaults();
        let help = registry.help_text();
        assert!(help.contains("Session"));
        assert!(help.contains("Agent"));
        assert!(help.contains("/tools"));
        assert!(help.contains("/quit"));
    }
}
