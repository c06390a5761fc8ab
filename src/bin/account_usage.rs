use clap::Parser;
use slurm_account_usage::{cli, logging::setup_logging, render, reset_sigpipe, Result};
use std::io::IsTerminal;

/// Print the CPUs and GPUs each user is using or waiting for under your Slurm account groups.
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
    let styled = std::io::stdout().is_terminal();
    for report in &run.reports {
        print!("{}", render::render_report(report, styled));
    }
    print!(
        "{}",
        render::disclaimer(
            run.settings.ignore_partitions.as_slice(),
            run.settings.ignores_default_partitions()
        )
    );
    Ok(())
}
