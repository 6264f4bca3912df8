//! armlite - assemble, inspect and run armlite programs

use anyhow::{bail, Context, Result};
use armlite::config::{ArmliteConfig, CONFIG_FILE_NAME};
use armlite::interp::Interpreter;
use armlite::ir::{Assembler, Disassembler, Program};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(name = "armlite")]
#[command(version)]
#[command(about = "Small register machine with an ARM-flavoured assembly", long_about = None)]
struct Cli {
    /// Config file (default: nearest armlite.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and execute a program
    Run {
        /// Input assembly file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the machine state when the run ends
        #[arg(long)]
        dump: bool,

        /// Print a coverage report when the run ends
        #[arg(long)]
        coverage: bool,

        /// Show execution statistics
        #[arg(long)]
        stats: bool,

        /// Memory size in bytes
        #[arg(long, value_name = "BYTES")]
        memory: Option<usize>,
    },

    /// Assemble a program and report on its labels
    Check {
        /// Input assembly file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the canonical listing of a program
    Disasm {
        /// Input assembly file
        #[arg(short, long)]
        input: PathBuf,

        /// Prefix each instruction with its position
        #[arg(long)]
        offsets: bool,
    },

    /// Show the effective configuration
    Config {
        /// Only print where the config was found
        #[arg(long)]
        path: bool,

        /// Write a default armlite.toml in the current directory
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.parse()?)
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ArmliteConfig::load(path)?,
        None => ArmliteConfig::load_from_cwd()?,
    };

    match cli.command {
        Commands::Run {
            input,
            dump,
            coverage,
            stats,
            memory,
        } => cmd_run(&config, &input, dump, coverage, stats, memory),
        Commands::Check { input } => cmd_check(&config, &input).map(|_| ExitCode::SUCCESS),
        Commands::Disasm { input, offsets } => {
            cmd_disasm(&config, &input, offsets).map(|_| ExitCode::SUCCESS)
        }
        Commands::Config { path, init } => cmd_config(&config, path, init).map(|_| ExitCode::SUCCESS),
    }
}

fn load_program(config: &ArmliteConfig, input: &Path) -> Result<Program> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    Assembler::new()
        .with_label_buckets(config.machine.label_buckets)
        .assemble(&source)
        .with_context(|| format!("Assembly of {} failed", input.display()))
}

fn cmd_run(
    config: &ArmliteConfig,
    input: &Path,
    dump: bool,
    coverage: bool,
    show_stats: bool,
    memory: Option<usize>,
) -> Result<ExitCode> {
    let program = load_program(config, input)?;
    let memory_size = memory.unwrap_or(config.machine.memory_size);
    let dump = dump || config.run.dump_state;
    let coverage = coverage || config.run.coverage;

    let mut interp = Interpreter::new(memory_size);
    if coverage {
        interp = interp.with_coverage();
    }

    let start = Instant::now();
    let result = interp.execute(&program);
    let elapsed = start.elapsed();

    let code = match result {
        Ok(halt) => {
            info!(?halt, "Program halted");
            ExitCode::SUCCESS
        }
        Err(err) => {
            match program.line_of(err.pc()) {
                Some(line) => eprintln!("error: {} (line {})", err, line),
                None => eprintln!("error: {}", err),
            }
            ExitCode::FAILURE
        }
    };

    if dump {
        print!("{}", interp.dump_state());
    }

    if let Some(cov) = interp.coverage() {
        eprintln!("\n{}", cov.report());
    }

    if show_stats {
        eprintln!("\nStatistics:");
        eprintln!("  Instructions: {}", interp.instruction_count());
        eprintln!("  Max call depth: {}", interp.max_call_depth());
        eprintln!("  Time: {:?}", elapsed);
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            eprintln!(
                "  IPS: {:.2}M",
                interp.instruction_count() as f64 / secs / 1_000_000.0
            );
        }
    }

    Ok(code)
}

fn cmd_check(config: &ArmliteConfig, input: &Path) -> Result<()> {
    let program = load_program(config, input)?;
    let labels = program.labels();

    println!("Instructions: {}", program.len());
    println!("Labels: {}", labels.len());

    let longest = (0..labels.bucket_count())
        .map(|bucket| labels.chain_len(bucket))
        .max()
        .unwrap_or(0);
    println!(
        "Buckets: {} (longest chain {})",
        labels.bucket_count(),
        longest
    );

    let missing = program.undefined_labels();
    if missing.is_empty() {
        println!("All branch and call targets defined");
        return Ok(());
    }
    for label in &missing {
        let line = program
            .instructions()
            .iter()
            .position(|instr| instr.target_label() == Some(*label))
            .and_then(|pc| program.line_of(pc));
        match line {
            Some(line) => println!("undefined label: {} (first used on line {})", label, line),
            None => println!("undefined label: {}", label),
        }
    }
    bail!("{} undefined label(s)", missing.len())
}

fn cmd_disasm(config: &ArmliteConfig, input: &Path, offsets: bool) -> Result<()> {
    let program = load_program(config, input)?;
    let disasm = Disassembler::new().with_offsets(offsets);
    print!("{}", disasm.disassemble(&program));
    Ok(())
}

fn cmd_config(config: &ArmliteConfig, path: bool, init: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;

    if init {
        let target = cwd.join(CONFIG_FILE_NAME);
        if target.exists() {
            bail!("{} already exists", target.display());
        }
        ArmliteConfig::default().save(&target)?;
        println!("Wrote {}", target.display());
        return Ok(());
    }

    if path {
        match ArmliteConfig::find(&cwd) {
            Some(found) => println!("{}", found.display()),
            None => println!("(none, using defaults)"),
        }
        return Ok(());
    }

    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
