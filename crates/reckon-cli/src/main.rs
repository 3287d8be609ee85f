//! Reckon CLI - compile and evaluate formulas

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reckon::prelude::*;
use reckon::TokenKind;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "reckon")]
#[command(author, version, about = "Reactive formula compiler and evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a formula and print its postfix program
    Compile {
        /// Formula text
        formula: String,

        /// Print each token with its kind
        #[arg(short, long)]
        kinds: bool,
    },

    /// Assign formulas in order and print the resulting values
    #[command(alias = "run")]
    Eval {
        /// Assignments of the form NAME=FORMULA
        assignments: Vec<String>,

        /// Read further assignments from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Only print these variables (default: all)
        #[arg(short, long)]
        show: Vec<String>,

        /// Recompute on worker threads instead of inline
        #[arg(short, long)]
        threaded: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { formula, kinds } => compile_formula(&formula, kinds),
        Commands::Eval {
            assignments,
            file,
            show,
            threaded,
        } => {
            let clean = eval(&assignments, file.as_deref(), &show, threaded)?;
            if !clean {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn compile_formula(formula: &str, kinds: bool) -> Result<()> {
    let registry = Registry::standard().context("Failed to build the standard registry")?;
    let program = reckon::compile(formula, &registry)
        .with_context(|| format!("Failed to compile '{}'", formula))?;

    let Some(program) = program else {
        eprintln!("Warning: formula is empty");
        return Ok(());
    };

    let line = if kinds {
        program
            .tokens()
            .iter()
            .map(|token| format!("{}:{}", token.text, kind_label(token.kind)))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        program.to_string()
    };
    writeln!(io::stdout(), "{}", line).context("Failed to write to stdout")?;
    Ok(())
}

fn kind_label(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Binary => "binary",
        TokenKind::Unary => "unary",
        TokenKind::Func(reckon::FuncKind::Named) => "func",
        TokenKind::Func(reckon::FuncKind::Implicit) => "implicit",
        TokenKind::Other => "other",
    }
}

/// Split `NAME=FORMULA`; the formula may itself contain `=`
fn parse_assignment(text: &str) -> Result<(&str, &str)> {
    match text.split_once('=') {
        Some((name, formula)) if !name.trim().is_empty() => Ok((name.trim(), formula.trim())),
        _ => bail!("Expected NAME=FORMULA, got '{}'", text),
    }
}

fn read_assignments(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Returns false when any variable logged an error
fn eval(
    assignments: &[String],
    file: Option<&Path>,
    show: &[String],
    threaded: bool,
) -> Result<bool> {
    let dispatch = if threaded {
        Dispatch::Spawn
    } else {
        Dispatch::Immediate
    };
    let manager = FormulaManager::standard_with(ManagerOptions::default().with_dispatch(dispatch))
        .context("Failed to build the standard registry")?;

    let mut lines = assignments.to_vec();
    if let Some(path) = file {
        lines.extend(read_assignments(path)?);
    }

    for line in &lines {
        let (name, formula) = parse_assignment(line)?;
        if let Err(e) = manager.assign_formula(name, formula) {
            // The failure is also in the variable's error log.
            eprintln!("Warning: {}", e);
        }
    }
    manager.wait_for_all();

    let names = if show.is_empty() {
        manager.names()
    } else {
        show.to_vec()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in &names {
        let value = manager
            .get_thing(name)
            .with_context(|| format!("No variable named '{}'", name))?;
        let shown = match value {
            Some(value) => value.to_string(),
            None => "<none>".to_string(),
        };
        writeln!(out, "{} = {}", name, shown).context("Failed to write to stdout")?;
    }
    out.flush().context("Failed to write to stdout")?;

    let mut clean = true;
    for name in manager.names() {
        if let Some(errors) = manager.get_errors(&name) {
            clean = false;
            for error in errors {
                eprintln!("{}: {}", name, error);
            }
        }
    }
    Ok(clean)
}
