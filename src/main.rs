mod core;
mod output;
mod repl;

use std::fs;
use std::path::Path;

use crate::core::catalog::Catalog;
use crate::core::config::{data_dir, Config};
use crate::core::error::{DorisError, Resolution, Result};
use crate::core::executor::{ExecutionOutcome, Executor};
use crate::core::history::HistoryManager;
use crate::core::index::KeywordIndex;
use crate::core::matcher::LevenshteinMatcher;
use crate::core::prompt::Prompter;
use crate::core::resolver::ResolutionEngine;
use crate::core::store::ModelStore;
use crate::output::Printer;
use crate::repl::Repl;

/// Built-in catalog used until the user drops their own into ~/.doris.
const DEFAULT_CATALOG: &str = include_str!("../commands.json");

fn main() {
    let printer = Printer::new();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let code = if args.is_empty() {
        match interactive_mode(printer) {
            Ok(code) => code,
            Err(e) => {
                printer.error(&e.to_string());
                1
            }
        }
    } else {
        // Everything on the command line is one query.
        match one_shot(&args.join(" "), printer) {
            Ok(code) => code,
            Err(e) => {
                printer.error(&e.to_string());
                1
            }
        }
    };
    std::process::exit(code);
}

struct Session {
    config: Config,
    catalog: Catalog,
    index: KeywordIndex,
    store: ModelStore,
    history: HistoryManager,
    printer: Printer,
}

impl Session {
    fn start(printer: Printer) -> Result<Session> {
        let dir = data_dir();
        fs::create_dir_all(&dir)?;

        let config = match Config::load(&dir.join("config.json")) {
            Ok(config) => config,
            Err(e) => {
                printer.warning(&format!("ignoring config: {}", e));
                Config::default()
            }
        };

        let catalog = load_catalog(&dir)?;
        let index = KeywordIndex::build(&catalog);
        let (store, warning) = ModelStore::open(dir.join("brain.json"), &catalog, &index);
        if let Some(warning) = warning {
            printer.warning(&warning);
        }

        let mut history = HistoryManager::new(dir.join("history.json"), config.history_limit);
        if let Err(e) = history.load() {
            printer.warning(&format!("ignoring history: {}", e));
        }

        Ok(Session {
            config,
            catalog,
            index,
            store,
            history,
            printer,
        })
    }

    /// Resolves one query and, when resolution completes, runs the command
    /// and records it. A skip resolves to no work at all.
    fn handle_query(&mut self, query: &str, prompter: &mut dyn Prompter) -> Result<Option<i32>> {
        let started = std::time::Instant::now();
        let engine = ResolutionEngine::new(
            &self.catalog,
            &self.index,
            &LevenshteinMatcher,
            &self.store,
            &self.config,
            self.printer,
        )?;

        let command = match engine.resolve(query, prompter)? {
            Resolution::Resolved(command) => command,
            Resolution::Skipped => return Ok(None),
        };

        if command.action == "exit" {
            return Ok(Some(0));
        }

        let executor = Executor::new(&self.catalog, self.printer);
        let outcome = match executor.execute(&command, prompter) {
            Ok(ExecutionOutcome::Ran(code)) => {
                if code == 0 {
                    self.printer.success("done");
                } else {
                    self.printer.warning(&format!("exited with status {}", code));
                }
                format!("ran({})", code)
            }
            Ok(ExecutionOutcome::Declined) => "declined".to_string(),
            Err(e) => {
                self.printer.error(&e.to_string());
                format!("failed: {}", e)
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        self.history.record(query, &command, &outcome, duration_ms);
        if let Err(e) = self.history.save() {
            self.printer.warning(&format!("history not saved: {}", e));
        }
        Ok(None)
    }

    fn print_help(&self) {
        self.printer.header("Available commands");
        for (id, action) in self.catalog.actions() {
            let mut keywords = action.keywords.join(", ");
            if action.warning {
                keywords.push_str("  (asks first)");
            }
            self.printer.print_key_value(id, &action.description, 2);
            self.printer.print_key_value("keywords", &keywords, 6);
        }
        println!();
        println!("Type a request in plain words, or 'exit' to leave.");
    }
}

fn interactive_mode(printer: Printer) -> Result<i32> {
    ctrlc::set_handler(|| {
        // Ctrl-C lands in rustyline as an interrupted read.
    })
    .map_err(|e| DorisError::Input(format!("setting Ctrl-C handler: {}", e)))?;

    let mut session = Session::start(printer)?;
    let mut repl = Repl::new(&data_dir())?;

    printer.header("doris");
    println!("Say what you want to run. 'help' lists commands, 'exit' leaves.");

    let mut exit_code = 0;
    loop {
        let query = match repl.read_query("doris> ") {
            Ok(Some(query)) => query,
            Ok(None) => continue,
            Err(DorisError::Input(_)) => break,
            Err(e) => return Err(e),
        };

        match query.as_str() {
            "help" => {
                session.print_help();
                continue;
            }
            "exit" | "quit" => break,
            _ => {}
        }

        match session.handle_query(&query, &mut repl) {
            Ok(Some(code)) => {
                exit_code = code;
                break;
            }
            Ok(None) => {}
            Err(DorisError::Syntax(message)) => {
                printer.error(&format!("syntax error: {}", message));
            }
            Err(e) => {
                printer.error(&e.to_string());
            }
        }
    }

    if let Err(e) = repl.save_history() {
        printer.warning(&e.to_string());
    }
    Ok(exit_code)
}

/// Non-interactive resolution of a single query; disambiguation prompts read
/// from stdin directly.
fn one_shot(query: &str, printer: Printer) -> Result<i32> {
    let mut session = Session::start(printer)?;
    let mut prompter = StdinPrompter;
    match session.handle_query(query, &mut prompter)? {
        Some(code) => Ok(code),
        None => Ok(0),
    }
}

struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        use std::io::{BufRead, Write};
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

fn load_catalog(dir: &Path) -> Result<Catalog> {
    let user_catalog = dir.join("commands.json");
    if user_catalog.exists() {
        let content = fs::read_to_string(&user_catalog)?;
        return Catalog::from_json(&content);
    }
    Catalog::from_json(DEFAULT_CATALOG)
}
