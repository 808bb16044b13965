//! Load a topology and its trajectories, and summarize what was ingested.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use grotraj::{Dynamics, FrameSelection, LoadOptions, Range};

fn frame_selection_parser(selection: &str) -> Result<FrameSelection, std::num::ParseIntError> {
    Ok(FrameSelection::Range(selection.parse::<Range>()?))
}

/// Ingest a gro topology together with xtc trajectories.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Topology path (gro).
    topology: PathBuf,

    /// Trajectory paths (xtc), loaded in order.
    trajectories: Vec<PathBuf>,

    /// Frame selection in the format `start:stop:step`, applied to each trajectory. Each of these
    /// values is optional.
    ///
    /// - `:100` will select the first 100 frames.
    ///
    /// - `3:14` will select the 4th up to and including the 14th frames, 11 frames in total.
    ///
    /// - `:100:2` will select every second frame from the first 100 frames, 50 in total.
    #[arg(short, long, value_parser=frame_selection_parser)]
    frame_selection: Option<FrameSelection>,

    /// Stop once this many snapshots are held, including the one from the topology.
    #[arg(short = 'n', long)]
    max_snapshots: Option<usize>,

    /// Log more. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            frames: self.frame_selection.clone().unwrap_or_default(),
            max_snapshots: self.max_snapshots,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // `RUST_LOG` takes precedence over the verbosity flags.
    env_logger::Builder::new()
        .filter_level(args.level_filter())
        .parse_default_env()
        .init();

    let mut dynamics = match Dynamics::open(&args.topology) {
        Ok(dynamics) => dynamics,
        Err(err) => {
            log::error!("could not read topology {:?}: {err}", args.topology);
            return ExitCode::FAILURE;
        }
    };

    let molecule = dynamics.molecule();
    println!("topology:\t{}", args.topology.display());
    println!("atoms:\t{}", dynamics.total_atoms());
    println!("molecule atoms:\t{}", molecule.atom_count());
    for (residue_id, drug) in dynamics.drugs() {
        println!("drug {residue_id} atoms:\t{}", drug.atom_count());
    }

    let reports = dynamics.load_trajectories(&args.trajectories, &args.load_options());
    let mut failed = false;
    for report in &reports {
        match &report.error {
            None => println!("{}:\t{} frames", report.path.display(), report.frames),
            Some(err) => {
                failed = true;
                println!(
                    "{}:\t{} frames (stopped: {err})",
                    report.path.display(),
                    report.frames
                );
            }
        }
    }
    println!("snapshots:\t{}", dynamics.snapshot_count());

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
