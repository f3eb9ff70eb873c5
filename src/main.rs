use std::env;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing_subscriber::EnvFilter;

use spec_compiler::config::SchemaConfig;
use spec_compiler::schema::{Schema, SchemaProvider};

const DEFAULT_SCHEMA: &str = "schema.json";

struct Repl {
    schema: Schema,
    /// 临时表达式所用的根表
    table: Option<String>,
}

enum Command<'a> {
    Help,
    Quit,
    Table(Option<&'a str>),
    Specs,
    Spec(&'a str),
    Check,
    Expression(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Some(Command::Expression(line));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (rest, None),
        };
        Some(match (name, arg) {
            ("help" | "h", _) => Command::Help,
            ("quit" | "q", _) => Command::Quit,
            ("table" | "t", arg) => Command::Table(arg),
            ("specs", _) => Command::Specs,
            ("spec", Some(name)) => Command::Spec(name),
            ("check", _) => Command::Check,
            _ => Command::Help,
        })
    }
}

impl Repl {
    /// 用户要求退出时返回false
    fn handle(&mut self, command: Command<'_>) -> bool {
        match command {
            Command::Help => print_help(),
            Command::Quit => return false,
            Command::Table(None) => match &self.table {
                Some(table) => println!("root table: {}", table),
                None => println!("no root table; use :table <name>"),
            },
            Command::Table(Some(name)) => {
                if self.schema.table(name).is_some() {
                    self.table = Some(name.to_string());
                    println!("root table: {}", name);
                } else {
                    println!("✗ table not found: {}", name);
                }
            }
            Command::Specs => {
                for spec in self.schema.specs() {
                    println!("  {} on {}: {}", spec.name, spec.table, spec.source);
                }
            }
            Command::Spec(name) => match self.schema.spec(name) {
                Some(spec) => match spec.check(&self.schema).and_then(|_| spec.to_sql(&self.schema)) {
                    Ok(sql) => println!("{}", sql),
                    Err(e) => println!("✗ {}", e),
                },
                None => println!("✗ spec not found: {}", name),
            },
            Command::Check => match self.schema.check() {
                Ok(()) => println!("✓ {} specs checked", self.schema.specs().len()),
                Err(e) => println!("✗ {}", e),
            },
            Command::Expression(source) => match &self.table {
                Some(table) => match self.schema.compile_expression(table, source) {
                    Ok(sql) => println!("{}", sql),
                    Err(e) => println!("✗ {}", e),
                },
                None => println!("no root table; use :table <name>"),
            },
        }
        true
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :table [name]   show or set the root table");
    println!("  :specs          list registered specs");
    println!("  :spec <name>    check and compile a spec");
    println!("  :check          check every spec");
    println!("  :help           show this help");
    println!("  :quit           exit");
    println!("Anything else is compiled as an expression over the root table.");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
    let schema = SchemaConfig::from_json_file(&path)
        .with_context(|| format!("loading {}", path))?
        .into_schema()
        .with_context(|| format!("building schema from {}", path))?;

    println!(
        "spec-repl: {} tables, {} specs from {}",
        schema.tables().len(),
        schema.specs().len(),
        path
    );
    println!("Type :help for help, :quit to exit\n");

    let table = schema.tables().first().map(|t| t.name.clone());
    let mut repl = Repl { schema, table };

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), DefaultHistory> =
        Editor::with_config(config).context("creating line editor")?;

    loop {
        let prompt = match &repl.table {
            Some(table) => format!("{}> ", table),
            None => "> ".to_string(),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if !repl.handle(command) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => println!("Use :quit or Ctrl-D to exit"),
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("reading input"),
        }
    }

    Ok(())
}
