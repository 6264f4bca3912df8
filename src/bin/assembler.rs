//! Standalone assembler for armlite
//!
//! Checks text assembly and prints its canonical listing.

use anyhow::{Context, Result};
use armlite::ir::{Assembler, Disassembler};
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

#[derive(Parser)]
#[command(name = "armlite-asm")]
#[command(about = "armlite assembler")]
struct Args {
    /// Input file (use - for stdin)
    #[arg(default_value = "-")]
    input: String,

    /// Prefix each instruction with its position
    #[arg(long)]
    offsets: bool,

    /// Label table bucket count
    #[arg(long, default_value_t = armlite::ir::DEFAULT_BUCKETS)]
    buckets: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let source = if args.input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(&args.input).context("Failed to read input")?
    };

    let program = Assembler::new()
        .with_label_buckets(args.buckets)
        .assemble(&source)
        .context("Assembly failed")?;

    let disasm = Disassembler::new().with_offsets(args.offsets);
    print!("{}", disasm.disassemble(&program));

    eprintln!(
        "Assembled {} instructions, {} labels",
        program.len(),
        program.labels().len()
    );
    let missing = program.undefined_labels();
    if !missing.is_empty() {
        eprintln!("Undefined labels: {}", missing.join(", "));
    }

    Ok(())
}
