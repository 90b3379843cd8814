//! Interactive REPL (Read-Eval-Print-Loop) for hbrowse.
//!
//! Provides an interactive scan shell with command history, line editing,
//! and completion over commands and discovered table names.

use std::borrow::Cow;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{CompletionType, Config, EditMode, Editor, Helper};
use tracing::{debug, error, info, warn};

use hbrowse_client::{BrowseError, Browser, ConnectionSetting, ScanResult};

use crate::commands::{Command, CommandResult};
use crate::config::CliConfig;
use crate::formatter::{self, OutputFormat};
use crate::statement;

/// Words offered by completion besides table names.
const KEYWORDS: &[&str] = &[
    "scan", "prefix=", "start=", "stop=", "limit=", "families=", "\\q", "\\?", "\\v",
    "\\clear", "\\connections", "\\connect", "\\disconnect", "\\use", "\\dt", "\\d", "\\f",
    "\\t", "\\page", "\\explain", "\\i", "\\save", "quorum=", "master=", "port=",
];

/// REPL helper for rustyline.
struct ReplHelper {
    /// Table names of the current connection.
    tables: Vec<String>,
}

impl ReplHelper {
    fn new() -> Self {
        Self { tables: Vec::new() }
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line[start..pos];

        let matches: Vec<Pair> = KEYWORDS
            .iter()
            .copied()
            .chain(self.tables.iter().map(String::as_str))
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| Pair {
                display: candidate.to_string(),
                replacement: candidate.to_string(),
            })
            .collect();

        Ok((start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if statement::has_open_quote(ctx.input()) {
            return Ok(ValidationResult::Incomplete);
        }
        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for ReplHelper {}

/// Interactive REPL for hbrowse.
pub struct Repl {
    /// CLI configuration.
    config: CliConfig,
    /// The browser.
    browser: Browser,
    /// Connection scans run against.
    current: Option<String>,
    /// The rustyline editor.
    editor: Editor<ReplHelper, DefaultHistory>,
    /// Output format.
    format: OutputFormat,
    /// Default page size.
    page_size: u64,
    /// History file path.
    history_file: Option<PathBuf>,
    /// File that `\save` writes settings to.
    config_path: Option<PathBuf>,
    /// Timing mode enabled.
    timing: bool,
}

impl Repl {
    /// Creates a new REPL instance.
    pub fn new(config: CliConfig, browser: Browser, format: OutputFormat) -> Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .max_history_size(config.history_size)?
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ReplHelper::new()));

        let history_file = config.history_file.clone().or_else(get_history_file);
        if let Some(ref path) = history_file {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    debug!("Failed to load history: {}", e);
                }
            }
        }

        Ok(Self {
            page_size: config.page_size,
            timing: config.timing,
            config,
            browser,
            current: None,
            editor,
            format,
            history_file,
            config_path: CliConfig::save_path(),
        })
    }

    /// Sets the file that saved settings are written to.
    pub fn set_config_path(&mut self, path: impl Into<PathBuf>) {
        self.config_path = Some(path.into());
    }

    /// Prints the welcome banner.
    pub fn print_banner(&self) {
        println!("hbrowse CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Type \\? for help, \\q to quit.\n");
    }

    /// Opens the startup connection, if one is configured.
    pub fn connect_default(&mut self, name: Option<&str>) -> Result<()> {
        let name = match name {
            Some(name) => name.to_string(),
            None => match self.config.startup_connection() {
                Some(setting) => setting.name.clone(),
                None => {
                    warn!("no startup connection configured");
                    return Ok(());
                }
            },
        };
        let message = self.connect(&name)?;
        println!("{message}");
        Ok(())
    }

    /// Opens a configured connection, loads its tables and makes it current.
    pub fn connect(&mut self, name: &str) -> Result<String> {
        let setting = self
            .config
            .connection(name)
            .cloned()
            .ok_or_else(|| anyhow!("no connection named '{name}' in the configuration"))?;
        self.connect_setting(&setting)
    }

    /// Opens a connection for a setting, configured or not.
    pub fn connect_setting(&mut self, setting: &ConnectionSetting) -> Result<String> {
        let name = setting.name.as_str();
        let message = match self.browser.connect(setting) {
            Ok(_) => {
                let tables = self.browser.catalog().table_names(name).len();
                format!("Connected to {setting} ({tables} tables)")
            }
            Err(err @ BrowseError::Schema { .. }) => {
                format!("Connected to {setting}, but listing tables failed: {err}")
            }
            Err(err) => return Err(err.into()),
        };

        self.current = Some(name.to_string());
        self.refresh_completion();
        Ok(message)
    }

    /// Saves a setting to the configuration file and makes it available to
    /// `\connect`. A setting with the same name is replaced.
    pub fn save_setting(&mut self, setting: ConnectionSetting) -> Result<PathBuf> {
        setting.validate()?;
        let path = self
            .config_path
            .clone()
            .ok_or_else(|| anyhow!("no configuration file location available"))?;

        CliConfig::save_connection(&path, setting.clone())?;
        info!(connection = %setting.name, path = %path.display(), "setting saved");
        self.config.upsert_connection(setting);
        Ok(path)
    }

    /// Closes a connection. Returns false if it was not open.
    pub fn disconnect(&mut self, name: &str) -> bool {
        let closed = self.browser.disconnect(name);
        if self.current.as_deref() == Some(name) {
            self.current = None;
            self.refresh_completion();
        }
        closed
    }

    /// Makes an open connection current.
    pub fn use_connection(&mut self, name: &str) -> Result<()> {
        self.browser.handle(name)?;
        self.current = Some(name.to_string());
        self.refresh_completion();
        Ok(())
    }

    fn refresh_completion(&mut self) {
        let tables = match &self.current {
            Some(name) => self.browser.catalog().table_names(name),
            None => Vec::new(),
        };
        if let Some(helper) = self.editor.helper_mut() {
            helper.tables = tables;
        }
    }

    /// Runs the main REPL loop.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let prompt = self.get_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if let Err(e) = self.editor.add_history_entry(line) {
                        debug!("Failed to add history entry: {}", e);
                    }

                    match self.process_line(line) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("Error: {:#}", e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("\\q");
                    break;
                }
                Err(e) => {
                    error!("Readline error: {}", e);
                    break;
                }
            }
        }

        self.save_history();
        println!("Goodbye!");
        Ok(())
    }

    fn get_prompt(&self) -> String {
        match &self.current {
            Some(name) => format!("hbrowse:{name}> "),
            None => "hbrowse> ".to_string(),
        }
    }

    /// Processes a single line of input. Returns true to exit.
    ///
    /// A backslash command takes the whole line; anything else may hold
    /// several `;`-separated statements.
    fn process_line(&mut self, line: &str) -> Result<bool> {
        if line.starts_with('\\') {
            return self.process_command(line);
        }
        for statement in statement::split_statements(line) {
            if statement.starts_with('\\') {
                if self.process_command(&statement)? {
                    return Ok(true);
                }
            } else {
                self.execute_and_print(&statement)?;
            }
        }
        Ok(false)
    }

    fn process_command(&mut self, line: &str) -> Result<bool> {
        let cmd = Command::parse(line);

        match cmd.execute(self)? {
            CommandResult::Continue => Ok(false),
            CommandResult::Exit => Ok(true),
            CommandResult::Output(msg) => {
                println!("{}", msg);
                Ok(false)
            }
            CommandResult::ToggleTiming => {
                self.timing = !self.timing;
                if self.timing {
                    println!("Timing is on.");
                } else {
                    println!("Timing is off.");
                }
                Ok(false)
            }
            CommandResult::SetFormat(format) => {
                self.format = format;
                println!("Output format set to {}.", format.name());
                Ok(false)
            }
            CommandResult::SetPageSize(size) => {
                self.page_size = size;
                println!("Page size set to {}.", size);
                Ok(false)
            }
        }
    }

    /// Executes a statement or backslash command and prints the result.
    pub fn execute_and_print(&mut self, line: &str) -> Result<()> {
        if line.starts_with('\\') {
            self.process_command(line)?;
            return Ok(());
        }

        let name = self.require_connection()?;
        let query = statement::parse_scan(line, self.page_size)?;
        debug!(connection = %name, table = %query.table_name, "running scan");

        let result = self
            .browser
            .run_query(&name, &query)
            .with_context(|| format!("scan on '{name}'"))?;
        self.print_result(&result);
        Ok(())
    }

    fn print_result(&self, result: &ScanResult) {
        if result.is_empty() {
            println!("(0 rows)");
        } else {
            println!("{}", formatter::format_result(result, self.format));
            println!(
                "({} row{})",
                result.row_count(),
                if result.row_count() == 1 { "" } else { "s" }
            );
        }

        if self.timing {
            println!("Time: {:.3}ms", result.elapsed.as_secs_f64() * 1000.0);
        }
    }

    fn save_history(&mut self) {
        if let Some(ref path) = self.history_file {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    debug!("Failed to create history directory: {}", e);
                    return;
                }
            }
            if let Err(e) = self.editor.save_history(path) {
                debug!("Failed to save history: {}", e);
            }
        }
    }

    /// Returns the current connection name, or an error if there is none.
    pub fn require_connection(&self) -> Result<String> {
        match &self.current {
            Some(name) => Ok(name.clone()),
            None => bail!("Not connected. Use \\connect NAME."),
        }
    }

    /// Returns the current connection name.
    pub fn current_connection(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns the CLI configuration.
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Returns the browser.
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Returns the current output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Returns the default page size.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

/// Gets the history file path.
fn get_history_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("hbrowse").join("history"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use hbrowse_client::{ConnectionSetting, MemoryStore};

    fn repl() -> Repl {
        let store = MemoryStore::new();
        store.create_table("users", &["info"]);
        store.put("users", "user:1", "info", "name", "ada").unwrap();

        let config = CliConfig::builder()
            .connection(ConnectionSetting::new("local").quorum("localhost"))
            .build();
        Repl::new(config, Browser::new(Arc::new(store)), OutputFormat::Raw).unwrap()
    }

    #[test]
    fn test_get_history_file() {
        let path = get_history_file();
        assert!(path.is_some());
        assert!(path.unwrap().ends_with("history"));
    }

    #[test]
    fn test_connect_sets_current_and_completion() {
        let mut repl = repl();
        let message = repl.connect("local").unwrap();

        assert!(message.contains("1 tables"));
        assert_eq!(repl.current_connection(), Some("local"));
        assert_eq!(repl.get_prompt(), "hbrowse:local> ");
        assert_eq!(repl.editor.helper().unwrap().tables, vec!["users"]);
    }

    #[test]
    fn test_connect_unknown_setting() {
        let mut repl = repl();
        assert!(repl.connect("nope").is_err());
        assert!(repl.current_connection().is_none());
    }

    #[test]
    fn test_scan_requires_connection() {
        let mut repl = repl();
        assert!(repl.execute_and_print("scan users").is_err());

        repl.connect("local").unwrap();
        assert!(repl.execute_and_print("scan users prefix=user:").is_ok());
        assert!(repl.execute_and_print("scan missing").is_err());
    }

    #[test]
    fn test_disconnect_clears_current() {
        let mut repl = repl();
        repl.connect("local").unwrap();

        assert!(repl.disconnect("local"));
        assert!(repl.current_connection().is_none());
        assert!(repl.use_connection("local").is_err());
    }

    #[test]
    fn test_line_with_several_statements() {
        let mut repl = repl();
        repl.connect("local").unwrap();

        assert!(!repl
            .process_line("scan users; scan users prefix='user:'")
            .unwrap());
        assert!(repl.process_line("scan users; scan missing").is_err());
        assert!(repl.process_line("scan users; \\q").unwrap());
    }

    #[test]
    fn test_save_setting_persists_and_connects() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let mut repl = repl();
        repl.set_config_path(&path);

        let saved = repl
            .save_setting(ConnectionSetting::new("dev").quorum("zk1"))
            .unwrap();
        assert_eq!(saved, path);
        assert_eq!(repl.config().connections.len(), 2);

        let stored = CliConfig::from_file(&path).unwrap();
        assert_eq!(stored.connections, vec![ConnectionSetting::new("dev").quorum("zk1")]);

        repl.connect("dev").unwrap();
        assert_eq!(repl.current_connection(), Some("dev"));
    }

    #[test]
    fn test_save_setting_rejects_invalid() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let mut repl = repl();
        repl.set_config_path(&path);

        assert!(repl.save_setting(ConnectionSetting::new("dev")).is_err());
        assert!(!path.exists());
        assert!(repl.config().connection("dev").is_none());
    }

    #[test]
    fn test_connect_inline_setting() {
        let mut repl = repl();
        let message = repl
            .connect_setting(&ConnectionSetting::new("adhoc").quorum("zk9"))
            .unwrap();

        assert!(message.contains("adhoc"));
        assert_eq!(repl.current_connection(), Some("adhoc"));
        assert!(repl.config().connection("adhoc").is_none());
    }

    #[test]
    fn test_save_and_connect_commands() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("hbrowse").join("config.toml");
        let mut repl = repl();
        repl.set_config_path(&path);

        assert!(!repl
            .process_command("\\save prod quorum=zk1,zk2 master=hm:16000")
            .unwrap());
        let stored = CliConfig::from_file(&path).unwrap();
        let prod = stored.connection("prod").unwrap();
        assert_eq!(prod.quorum_hosts, vec!["zk1", "zk2"]);
        assert_eq!(prod.client_port, "2181");

        assert!(repl.process_command("\\save prod").is_err());
        assert!(!repl.process_command("\\connect prod").unwrap());
        assert_eq!(repl.current_connection(), Some("prod"));

        assert!(!repl.process_command("\\connect scratch quorum=zk3").unwrap());
        assert_eq!(repl.current_connection(), Some("scratch"));
        assert!(CliConfig::from_file(&path).unwrap().connection("scratch").is_none());
    }

    #[test]
    fn test_commands_update_state() {
        let mut repl = repl();
        assert!(!repl.process_command("\\page 3").unwrap());
        assert_eq!(repl.page_size(), 3);
        repl.process_command("\\f json").unwrap();
        assert_eq!(repl.format(), OutputFormat::Json);
        assert!(repl.process_command("\\q").unwrap());
    }
}
