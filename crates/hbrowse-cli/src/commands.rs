//! Special backslash commands for the REPL.
//!
//! Provides commands like `\dt`, `\d`, `\connect`, `\q`, etc.

use anyhow::{anyhow, Context, Result};

use hbrowse_client::CompiledScan;

use crate::formatter::{self, OutputFormat};
use crate::repl::Repl;
use crate::statement;

/// Result of executing a command.
pub enum CommandResult {
    /// Continue the REPL.
    Continue,
    /// Exit the REPL.
    Exit,
    /// Output a message.
    Output(String),
    /// Toggle timing mode.
    ToggleTiming,
    /// Set output format.
    SetFormat(OutputFormat),
    /// Set default page size.
    SetPageSize(u64),
}

/// A parsed command.
pub enum Command {
    /// Quit the REPL.
    Quit,
    /// Show help.
    Help,
    /// Show version.
    Version,
    /// Clear screen.
    Clear,
    /// List configured and open connections.
    Connections,
    /// Open a named connection, or an inline setting.
    Connect(Option<String>),
    /// Save an inline setting to the configuration file.
    Save(Option<String>),
    /// Close a named connection.
    Disconnect(Option<String>),
    /// Switch the current connection.
    Use(Option<String>),
    /// List tables.
    ListTables,
    /// Describe a table.
    Describe(Option<String>),
    /// Set output format.
    Format(String),
    /// Toggle timing.
    Timing,
    /// Show or set page size.
    Page(Option<String>),
    /// Show the compiled scan of a statement.
    Explain(String),
    /// Execute a file.
    Include(String),
    /// Unknown command.
    Unknown(String),
}

impl Command {
    /// Parses a command string.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let cmd = input.strip_prefix('\\').unwrap_or(input);

        let mut parts = cmd.splitn(2, char::is_whitespace);
        let cmd_name = parts.next().unwrap_or_default().to_lowercase();
        let args = parts
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        match cmd_name.as_str() {
            "q" | "quit" | "exit" => Command::Quit,
            "?" | "h" | "help" => Command::Help,
            "v" | "version" => Command::Version,
            "clear" | "cls" => Command::Clear,
            "connections" | "conninfo" => Command::Connections,
            "connect" | "c" => Command::Connect(args),
            "save" => Command::Save(args),
            "disconnect" => Command::Disconnect(args),
            "use" => Command::Use(args),
            "dt" | "tables" => Command::ListTables,
            "d" => Command::Describe(args),
            "f" | "format" => Command::Format(args.unwrap_or_else(|| "table".to_string())),
            "t" | "timing" => Command::Timing,
            "page" => Command::Page(args),
            "explain" => Command::Explain(args.unwrap_or_default()),
            "i" | "include" => Command::Include(args.unwrap_or_default()),
            _ => Command::Unknown(cmd_name),
        }
    }

    /// Executes the command.
    pub fn execute(&self, repl: &mut Repl) -> Result<CommandResult> {
        match self {
            Command::Quit => Ok(CommandResult::Exit),

            Command::Help => Ok(CommandResult::Output(Self::help_text())),

            Command::Version => Ok(CommandResult::Output(format!(
                "hbrowse CLI v{}",
                env!("CARGO_PKG_VERSION")
            ))),

            Command::Clear => {
                print!("\x1B[2J\x1B[1;1H");
                Ok(CommandResult::Continue)
            }

            Command::Connections => Ok(CommandResult::Output(Self::connections(repl))),

            Command::Connect(Some(args)) if statement::is_inline_setting(args) => {
                let setting = statement::parse_setting(args)?;
                Ok(CommandResult::Output(repl.connect_setting(&setting)?))
            }
            Command::Connect(name) => {
                let name = name
                    .as_deref()
                    .or_else(|| repl.config().startup_connection().map(|s| s.name.as_str()))
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("Usage: \\connect NAME"))?;
                Ok(CommandResult::Output(repl.connect(&name)?))
            }

            Command::Save(None) => Ok(CommandResult::Output(format!(
                "Usage: \\save {}",
                statement::SETTING_USAGE
            ))),
            Command::Save(Some(args)) => {
                let setting = statement::parse_setting(args)?;
                let message = format!("Saved {setting}");
                let path = repl.save_setting(setting)?;
                Ok(CommandResult::Output(format!("{message} to {}.", path.display())))
            }

            Command::Disconnect(name) => {
                let name = match name.as_deref().or(repl.current_connection()) {
                    Some(name) => name.to_string(),
                    None => return Ok(CommandResult::Output("Not connected.".to_string())),
                };
                let message = if repl.disconnect(&name) {
                    format!("Disconnected from '{name}'.")
                } else {
                    format!("No open connection named '{name}'.")
                };
                Ok(CommandResult::Output(message))
            }

            Command::Use(Some(name)) => {
                repl.use_connection(name)?;
                Ok(CommandResult::Output(format!("Using connection '{name}'.")))
            }
            Command::Use(None) => Ok(CommandResult::Output(
                match repl.current_connection() {
                    Some(name) => format!("Current connection: '{name}'."),
                    None => "Not connected.".to_string(),
                },
            )),

            Command::ListTables => {
                let name = repl.require_connection()?;
                let schemas = repl.browser().schemas(&name).unwrap_or_default();
                if schemas.is_empty() {
                    return Ok(CommandResult::Output("No tables found.".to_string()));
                }
                Ok(CommandResult::Output(formatter::format_schemas(
                    &schemas,
                    repl.format(),
                )))
            }

            Command::Describe(None) => Ok(CommandResult::Output(
                "Use \\dt to list tables, \\d TABLE to show its families.".to_string(),
            )),
            Command::Describe(Some(table)) => {
                let name = repl.require_connection()?;
                let schema = repl
                    .browser()
                    .catalog()
                    .table(&name, table)
                    .ok_or_else(|| anyhow!("Table '{table}' not found on '{name}'."))?;
                Ok(CommandResult::Output(formatter::format_families(
                    &schema,
                    repl.format(),
                )))
            }

            Command::Format(format) => match OutputFormat::parse(format) {
                Some(fmt) => Ok(CommandResult::SetFormat(fmt)),
                None => Ok(CommandResult::Output(format!(
                    "Unknown format '{format}'. Available: table, json, csv, raw"
                ))),
            },

            Command::Timing => Ok(CommandResult::ToggleTiming),

            Command::Page(None) => Ok(CommandResult::Output(format!(
                "Page size is {}.",
                repl.page_size()
            ))),
            Command::Page(Some(value)) => {
                let size = value
                    .parse::<u64>()
                    .with_context(|| format!("invalid page size '{value}'"))?;
                Ok(CommandResult::SetPageSize(size))
            }

            Command::Explain(text) => {
                if text.is_empty() {
                    return Ok(CommandResult::Output("Usage: \\explain scan TABLE ...".to_string()));
                }
                let query = statement::parse_scan(text, repl.page_size())?;
                let scan = repl.browser().explain(&query)?;
                Ok(CommandResult::Output(Self::explain_text(&query.table_name, &scan)))
            }

            Command::Include(path) => {
                if path.is_empty() {
                    return Ok(CommandResult::Output("Usage: \\i <filename>".to_string()));
                }
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read {path}"))?;
                for line in statement::split_statements(&content) {
                    repl.execute_and_print(&line)?;
                }
                Ok(CommandResult::Continue)
            }

            Command::Unknown(cmd) => Ok(CommandResult::Output(format!(
                "Unknown command '\\{cmd}'. Type \\? for help."
            ))),
        }
    }

    fn explain_text(table: &str, scan: &CompiledScan) -> String {
        let mut lines = vec![format!("{table}: {scan}")];
        if let Some(prefix) = scan.filter().prefix() {
            lines.push(format!("  prefix:     {prefix}"));
        }
        if let Some(limit) = scan.filter().page_limit() {
            lines.push(format!("  page limit: {limit} rows per region"));
        }
        lines.join("\n")
    }

    fn connections(repl: &Repl) -> String {
        let open = repl.browser().connection_names();
        let mut lines = Vec::new();
        for setting in &repl.config().connections {
            let current = repl.current_connection() == Some(setting.name.as_str());
            let state = if open.contains(&setting.name) { "open" } else { "closed" };
            lines.push(format!(
                "{} {setting} [{state}]",
                if current { "*" } else { " " }
            ));
        }
        if lines.is_empty() {
            return "No connections configured.".to_string();
        }
        lines.join("\n")
    }

    /// Returns help text.
    fn help_text() -> String {
        r#"hbrowse CLI Commands
====================

General:
  \q, \quit            Exit the CLI
  \?, \help            Show this help
  \v, \version         Show version information
  \clear, \cls         Clear screen

Connection:
  \connections         List configured connections
  \connect NAME        Open a connection and load its tables
  \connect NAME quorum=HOSTS [master=HOST:PORT] [port=N]
                       Open an unsaved connection
  \save NAME quorum=HOSTS [master=HOST:PORT] [port=N]
                       Save a connection to the config file
  \disconnect [NAME]   Close a connection
  \use NAME            Switch the current connection

Schema:
  \dt, \tables         List tables and their families
  \d TABLE             Show the families of a table

Display:
  \t, \timing          Toggle timing display
  \f FORMAT            Set output format (table, json, csv, raw)
  \page [N]            Show or set the default page size

Queries:
  scan TABLE [prefix=P] [start=S] [stop=S] [limit=N] [families=a,b]
  \explain SCAN        Show the server-side scan for a statement

Files:
  \i FILE              Execute statements from file
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quit() {
        assert!(matches!(Command::parse("\\q"), Command::Quit));
        assert!(matches!(Command::parse("\\quit"), Command::Quit));
        assert!(matches!(Command::parse("\\exit"), Command::Quit));
    }

    #[test]
    fn test_parse_help() {
        assert!(matches!(Command::parse("\\?"), Command::Help));
        assert!(matches!(Command::parse("\\help"), Command::Help));
    }

    #[test]
    fn test_parse_connect() {
        match Command::parse("\\connect prod") {
            Command::Connect(Some(name)) => assert_eq!(name, "prod"),
            _ => panic!("Expected Connect"),
        }
        assert!(matches!(Command::parse("\\connect   "), Command::Connect(None)));
    }

    #[test]
    fn test_parse_save() {
        match Command::parse("\\save prod quorum=zk1,zk2 port=2182") {
            Command::Save(Some(args)) => assert_eq!(args, "prod quorum=zk1,zk2 port=2182"),
            _ => panic!("Expected Save"),
        }
        assert!(matches!(Command::parse("\\save"), Command::Save(None)));
    }

    #[test]
    fn test_explain_text_shows_prefix_and_page() {
        let query = hbrowse_client::Query::new("users").prefix("user:").page_size(2);
        let scan = hbrowse_client::QueryCompiler::new().compile(&query);
        let text = Command::explain_text("users", &scan);

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("users: Scan("));
        assert_eq!(lines[1], "  prefix:     user:");
        assert_eq!(lines[2], "  page limit: 2 rows per region");

        let scan = hbrowse_client::QueryCompiler::new().compile(&hbrowse_client::Query::new("t"));
        assert_eq!(Command::explain_text("t", &scan).lines().count(), 2);
    }

    #[test]
    fn test_parse_describe() {
        match Command::parse("\\d users") {
            Command::Describe(Some(name)) => assert_eq!(name, "users"),
            _ => panic!("Expected Describe"),
        }
    }

    #[test]
    fn test_parse_explain_keeps_statement() {
        match Command::parse("\\explain scan users prefix='a b'") {
            Command::Explain(text) => assert_eq!(text, "scan users prefix='a b'"),
            _ => panic!("Expected Explain"),
        }
    }

    #[test]
    fn test_parse_page() {
        match Command::parse("\\page 25") {
            Command::Page(Some(n)) => assert_eq!(n, "25"),
            _ => panic!("Expected Page"),
        }
    }

    #[test]
    fn test_parse_unknown() {
        match Command::parse("\\xyz") {
            Command::Unknown(cmd) => assert_eq!(cmd, "xyz"),
            _ => panic!("Expected Unknown"),
        }
    }
}
