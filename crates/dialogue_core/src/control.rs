use std::collections::HashMap;

use thiserror::Error;

/// Commands the decision loop (or its host) applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Scan,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedControl {
    Help,
    Command(ControlCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}. usage: {usage}")]
pub struct ControlParseError {
    pub reason: String,
    pub usage: String,
}

/// What one control line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Answered without touching the loop: help, errors, blank lines.
    Reply(Vec<String>),
    Command(ControlCommand),
}

type ParseFn = dyn Fn(&[String]) -> Result<ParsedControl, ControlParseError> + Send + Sync;

pub struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub struct ControlCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl Default for ControlCommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ControlCommandRegistry {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert("help", "List commands", "", parse_help_command);
        registry.insert("start", "Start auto-advance polling", "", |args| {
            simple_command(args, "start", ControlCommand::Start)
        });
        registry.insert("stop", "Stop auto-advance polling", "", |args| {
            simple_command(args, "stop", ControlCommand::Stop)
        });
        registry.insert("scan", "Scan once and report every character", "", |args| {
            simple_command(args, "scan", ControlCommand::Scan)
        });
        registry.insert("status", "Show polling state and counters", "", |args| {
            simple_command(args, "status", ControlCommand::Status)
        });
        registry.insert("quit", "Quit fast_dialog", "", |args| {
            simple_command(args, "quit", ControlCommand::Quit)
        });
        registry
    }

    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ParsedControl, ControlParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        if self
            .lookup_by_lower_name
            .contains_key(&name.to_ascii_lowercase())
        {
            return Err(format!("duplicate command registration: {name}"));
        }
        self.insert(name, help, arg_schema, parse);
        Ok(())
    }

    fn insert<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) where
        F: Fn(&[String]) -> Result<ParsedControl, ControlParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name.insert(lower, self.specs.len() - 1);
    }

    pub fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let index = self
            .lookup_by_lower_name
            .get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index)
    }

    /// Help lines in registration order.
    pub fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }
}

/// Turns raw control lines into commands.
#[derive(Default)]
pub struct ControlProcessor {
    registry: ControlCommandRegistry,
}

impl ControlProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry_mut(&mut self) -> &mut ControlCommandRegistry {
        &mut self.registry
    }

    pub fn process_line(&self, raw_line: &str) -> ControlOutcome {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return ControlOutcome::Reply(Vec::new());
        }

        let tokens = match tokenize_line(trimmed) {
            Ok(tokens) => tokens,
            Err(reason) => {
                return ControlOutcome::Reply(vec![format!("error: {reason}. usage: help")]);
            }
        };
        let Some((command_name, args)) = tokens.split_first() else {
            return ControlOutcome::Reply(Vec::new());
        };
        let Some(spec) = self.registry.lookup(command_name) else {
            return ControlOutcome::Reply(vec![format!(
                "error: unknown command '{command_name}'. try: help"
            )]);
        };

        match (spec.parse)(args) {
            Ok(ParsedControl::Help) => ControlOutcome::Reply(self.registry.help_lines()),
            Ok(ParsedControl::Command(command)) => ControlOutcome::Command(command),
            Err(error) => ControlOutcome::Reply(vec![format!("error: {error}")]),
        }
    }
}

pub fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut token_started = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                token_started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if token_started {
                    tokens.push(std::mem::take(&mut current));
                    token_started = false;
                }
            }
            _ => {
                current.push(ch);
                token_started = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if token_started {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<ParsedControl, ControlParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedControl::Help)
}

fn simple_command(
    args: &[String],
    usage: &str,
    command: ControlCommand,
) -> Result<ParsedControl, ControlParseError> {
    require_no_args(args, usage)?;
    Ok(ParsedControl::Command(command))
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), ControlParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ControlParseError {
            reason: "unexpected extra arguments".to_string(),
            usage: usage.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(outcome: ControlOutcome) -> Vec<String> {
        match outcome {
            ControlOutcome::Reply(lines) => lines,
            ControlOutcome::Command(command) => panic!("expected reply, got {command:?}"),
        }
    }

    #[test]
    fn help_lists_commands_in_registration_order() {
        let lines = reply(ControlProcessor::new().process_line("help"));
        assert_eq!(
            lines,
            vec![
                "help - List commands",
                "start - Start auto-advance polling",
                "stop - Stop auto-advance polling",
                "scan - Scan once and report every character",
                "status - Show polling state and counters",
                "quit - Quit fast_dialog",
            ]
        );
    }

    #[test]
    fn commands_are_case_insensitive() {
        let processor = ControlProcessor::new();
        assert_eq!(
            processor.process_line("  START "),
            ControlOutcome::Command(ControlCommand::Start)
        );
        assert_eq!(
            processor.process_line("Status"),
            ControlOutcome::Command(ControlCommand::Status)
        );
    }

    #[test]
    fn unknown_command_reports_clear_error() {
        assert_eq!(
            reply(ControlProcessor::new().process_line("nope")),
            vec!["error: unknown command 'nope'. try: help"]
        );
    }

    #[test]
    fn extra_args_report_usage_hint() {
        assert_eq!(
            reply(ControlProcessor::new().process_line("stop now")),
            vec!["error: unexpected extra arguments. usage: stop"]
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert!(reply(ControlProcessor::new().process_line("   ")).is_empty());
    }

    #[test]
    fn unterminated_quote_is_reported() {
        assert_eq!(
            reply(ControlProcessor::new().process_line("scan \"oops")),
            vec!["error: unterminated quoted string. usage: help"]
        );
    }

    #[test]
    fn tokenizer_keeps_quoted_spaces_and_empty_quotes() {
        assert_eq!(
            tokenize_line("say \"hello there\" \"\"").expect("tokens"),
            vec!["say", "hello there", ""]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut processor = ControlProcessor::new();
        let result = processor
            .registry_mut()
            .register("SCAN", "again", "", |_| Ok(ParsedControl::Help));
        assert_eq!(
            result,
            Err("duplicate command registration: SCAN".to_string())
        );
    }

    #[test]
    fn registered_command_is_reachable() {
        let mut processor = ControlProcessor::new();
        processor
            .registry_mut()
            .register("go", "Alias for start", "", |args| {
                simple_command(args, "go", ControlCommand::Start)
            })
            .expect("register");
        assert_eq!(
            processor.process_line("go"),
            ControlOutcome::Command(ControlCommand::Start)
        );
    }
}
