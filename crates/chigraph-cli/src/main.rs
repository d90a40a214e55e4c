//! The `chi` binary.
//!
//! Thin wrapper over the library crates: `compile` emits a module's IR,
//! `run` compiles and interprets a main module, `interpret` does the same
//! for an arbitrary function. Every subcommand accepts `-C <dir>` to change
//! directory first. Exit code 0 on success, 1 on any error.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use chigraph_codegen::{compile_module, CompileSettings};
use chigraph_core::{mangle_function_name, Context};
use chigraph_ir::interpret_main;

/// Chigraph module compiler and tools.
#[derive(Parser)]
#[command(name = "chi", about = "Chigraph module compiler and tools")]
struct Cli {
    /// Change to this directory before doing anything else.
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a module in the workspace and print (or write) its IR.
    Compile {
        /// Full module name, e.g. `github.com/user/mod`.
        module: String,

        /// Write the IR here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the module cache.
        #[arg(long)]
        no_cache: bool,

        /// Emit only this module's definitions plus extern declarations,
        /// instead of a fully linked module.
        #[arg(long)]
        no_link: bool,
    },

    /// Compile a main module and run it through the interpreter.
    Run {
        /// Full module name of the main module.
        module: String,
    },

    /// Compile a module and interpret one of its functions as an entry
    /// point.
    Interpret {
        /// Full module name.
        module: String,

        /// Function to run.
        #[arg(short, long, default_value = "main")]
        function: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Some(dir) = &cli.directory {
        if let Err(err) = std::env::set_current_dir(dir) {
            eprintln!("chi: cannot change to '{}': {}", dir.display(), err);
            process::exit(1);
        }
    }

    let exit_code = match cli.command {
        Commands::Compile {
            module,
            output,
            no_cache,
            no_link,
        } => run_compile(&module, output, no_cache, no_link),
        Commands::Run { module } => run_interpret(&module, "main"),
        Commands::Interpret { module, function } => run_interpret(&module, &function),
    };
    process::exit(exit_code);
}

/// Loads a module from the current workspace into a fresh context.
fn load(module: &str) -> Result<Context, i32> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut ctx = Context::new(Some(&cwd));

    let res = ctx.load_module(module);
    if !res.success() {
        eprintln!("{}", res.dump());
        return Err(1);
    }
    Ok(ctx)
}

fn run_compile(module: &str, output: Option<PathBuf>, no_cache: bool, no_link: bool) -> i32 {
    let mut ctx = match load(module) {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    let settings = CompileSettings {
        use_cache: !no_cache,
        link_dependencies: !no_link,
    };
    let (res, compiled) = compile_module(&mut ctx, module, &settings);
    if !res.success() {
        eprintln!("{}", res.dump());
        return 1;
    }
    let Some(compiled) = compiled else {
        eprintln!("chi: no module produced");
        return 1;
    };

    match output {
        Some(path) => {
            if let Err(err) = std::fs::write(&path, compiled.to_string()) {
                eprintln!("chi: cannot write '{}': {}", path.display(), err);
                return 1;
            }
        }
        None => print!("{}", compiled),
    }
    0
}

fn run_interpret(module: &str, function: &str) -> i32 {
    let mut ctx = match load(module) {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    let (res, compiled) = compile_module(&mut ctx, module, &CompileSettings::default());
    if !res.success() {
        eprintln!("{}", res.dump());
        return 1;
    }
    let Some(compiled) = compiled else {
        eprintln!("chi: no module produced");
        return 1;
    };

    let mangled = mangle_function_name(module, function);
    match interpret_main(&compiled, &mangled) {
        Ok((exit_code, output)) => {
            for line in output {
                println!("{}", line);
            }
            exit_code
        }
        Err(err) => {
            eprintln!("chi: {}", err);
            1
        }
    }
}
