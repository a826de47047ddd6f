use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{config::Config as EditorConfig, Editor, Helper};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

mod lang;
mod repl;

use lang::modules::ModuleIndex;
use lang::runtime::{EvalResult, Runtime};
use repl::{fixup_input, ReplHelper};

const HISTORY_FILE: &str = ".curry_history";
const PROMPT: &str = "(curry) ";

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Show debug output
    #[arg(short, long)]
    debug: bool,

    /// Don't print result values
    #[arg(short, long)]
    quiet: bool,

    /// Directory of packages to make importable
    #[arg(long)]
    stdlib: Option<PathBuf>,

    /// Module name the `--stdlib` packages are imported under
    #[arg(long, default_value = "std")]
    stdlib_module: String,

    /// Script to run. Starts a REPL if omitted
    file: Option<PathBuf>,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn init_modules(opts: &Opt) -> Result<ModuleIndex> {
    let mut modules = ModuleIndex::new();
    if let Some(dir) = &opts.stdlib {
        modules.index_dir(dir, &opts.stdlib_module)?;
        let count = modules
            .module(&opts.stdlib_module)
            .map_or(0, |m| m.packages.len());
        info!(
            "indexed {} package(s) from {} as module {}",
            count,
            dir.display(),
            opts.stdlib_module
        );
    }

    Ok(modules)
}

fn init_editor() -> Result<Editor<ReplHelper, DefaultHistory>> {
    let config = EditorConfig::builder().auto_add_history(true).build();
    let mut editor = Editor::with_config(config).context("Failed to init editor")?;
    editor.set_helper(Some(ReplHelper::new()));

    Ok(editor)
}

fn init_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) {
    let _ = editor.load_history(HISTORY_FILE);
}

fn save_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) -> Result<()> {
    match editor.save_history(HISTORY_FILE) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to save history: {}", e),
    }
}

fn welcome() {
    println!("curry v{}", env!("CARGO_PKG_VERSION"));
    println!("End a line with '\\' to continue it. Press Ctrl-D to quit");
    println!();
}

fn run_file(path: &Path, modules: ModuleIndex, quiet: bool) -> Result<()> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut stdout = io::stdout();
    let mut runtime = Runtime::new(&mut stdout, !quiet, modules);
    match runtime.eval(&src) {
        EvalResult::Ok(_) => Ok(()),
        EvalResult::Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_repl(modules: ModuleIndex, quiet: bool) -> Result<()> {
    let mut editor = init_editor()?;
    init_history(&mut editor);
    welcome();

    let mut stdout = io::stdout();
    let mut runtime = Runtime::new(&mut stdout, !quiet, modules);

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                info!("read: {}", &line);

                if let EvalResult::Err(e) = runtime.eval(&fixup_input(&line)) {
                    eprintln!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("Press Ctrl-D to quit");
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                println!("quit");
                break;
            }
        }
    }

    save_history(&mut editor)
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;
    let modules = init_modules(&opts)?;

    match &opts.file {
        Some(path) => run_file(path, modules, opts.quiet),
        None => run_repl(modules, opts.quiet),
    }
}
