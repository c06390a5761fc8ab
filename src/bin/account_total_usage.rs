use clap::Parser;
use slurm_account_usage::{cli, logging::setup_logging, render, reset_sigpipe, Result};

/// Print the CPUs and GPUs in use under each of your Slurm account groups.
#[derive(Parser, Clone, Debug)]
struct ClArgs {
    #[clap(flatten)]
    options: cli::Options,
}

fn main() -> Result<()> {
    reset_sigpipe();
    let args = ClArgs::parse();
    setup_logging(args.options.verbose);

    let run = cli::run(&args.options)?;
    for report in &run.reports {
        print!("{}", render::render_total_summary(report));
    }
    if run.reports.iter().any(|r| !r.is_empty()) {
        print!("{}", render::total_summary_hint());
    }
    Ok(())
}
