use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::VerifyArgs;
use crate::dumps::FrameDumps;
use crate::verify::{self, VerifyReport};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn verify(args: VerifyArgs) -> Result<ExitCode> {
    tracing::info!(
        dir = %args.dir.display(),
        machines = args.machines,
        frame = args.frame,
        format = ?args.format,
        "verifying feedback dumps"
    );
    let dumps = FrameDumps::load(&args.dir, args.machines, args.frame, args.format)
        .with_context(|| format!("failed to load dumps for frame {}", args.frame))?;
    let report = verify::verify(&dumps, args.frame);

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{text}");
    } else {
        print_report(&report);
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(frame = args.frame, "verification failed");
        Ok(ExitCode::FAILURE)
    }
}

fn print_report(report: &VerifyReport) {
    println!("Frame {} ({} machines):", report.frame, report.machines);
    for check in &report.checks {
        let status = if check.passed { "OK" } else { "FAILED" };
        println!("  {:<30} {status}", check.name);
        for failure in &check.failures {
            println!("    {failure}");
        }
    }
}
