//! VM Manager - Main Entry Point
//!
//! Usage: vm-manager [OPTIONS] <INIT_FILE> <INPUT_FILE> [OUTPUT_FILE]
//!
//! The init file defines the segment and page tables, the input file holds
//! `TA`/`RP`/`NL` commands. Results go to the output file, or stdout.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use vm_manager::error::{Result, VmError};
use vm_manager::io::{read_commands, InitData};
use vm_manager::{logging, VmManager};

/// Translates virtual addresses through a segment table and demand-paged
/// page tables backed by a simulated paging disk
#[derive(Parser, Debug)]
#[command(name = "vm-manager")]
#[command(version)]
struct Cli {
    /// Initialization file with ST/PT definitions
    init_file: PathBuf,

    /// Command file (TA <va>, RP <pa>, NL)
    input_file: PathBuf,

    /// Output file for results; stdout when omitted
    output_file: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.quiet));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let init_data = InitData::from_file(&cli.init_file)?;
    info!(
        "{}: {} segments, {} page entries, {}",
        cli.init_file.display(),
        init_data.st_entries.len(),
        init_data.pt_entries.len(),
        if init_data.needs_demand_paging() {
            "demand paging"
        } else {
            "fully resident"
        }
    );
    for entry in &init_data.st_entries {
        if entry.locator >= 0 {
            info!(
                "  segment {}: size={}, PT in frame {}",
                entry.segment, entry.size, entry.locator
            );
        } else {
            info!(
                "  segment {}: size={}, PT in disk block {}",
                entry.segment,
                entry.size,
                entry.locator.unsigned_abs()
            );
        }
    }

    let mut vm = VmManager::new();
    init_data.apply(&mut vm);

    let commands = read_commands(&cli.input_file)?;
    info!("{}: {} commands", cli.input_file.display(), commands.len());

    match &cli.output_file {
        Some(path) => {
            let file = File::create(path).map_err(VmError::Io)?;
            vm.execute(&commands, &mut BufWriter::new(file))?;
            info!("results written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            vm.execute(&commands, &mut out)?;
            out.flush()?;
        }
    }

    let stats = vm.stats();
    info!(
        "{} successful / {} failed translations",
        stats.successes(),
        stats.failures
    );
    Ok(())
}
