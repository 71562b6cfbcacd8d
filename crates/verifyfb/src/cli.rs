use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fbcore::DumpFormat;

#[derive(Parser, Debug)]
#[command(
    name = "verifyfb",
    author,
    version,
    about = "Cross-check merged and per-machine feedback framebuffer dumps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every consistency check for one feedback frame.
    Verify(VerifyArgs),
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Directory holding the `mergeAll_*`, `merge_*` and `mcrt_*` dumps.
    #[arg(long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Number of render machines; ids run from 0 to N-1.
    #[arg(long, value_name = "N", value_parser = parse_machines)]
    pub machines: u32,

    /// Feedback frame id embedded in the file names.
    #[arg(long, value_name = "ID")]
    pub frame: u32,

    /// Dump encoding: `ppm` (8-bit gamma) or `fbd` (full float).
    #[arg(
        long,
        value_name = "FORMAT",
        value_parser = parse_format,
        default_value = "ppm"
    )]
    pub format: DumpFormat,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_format(value: &str) -> Result<DumpFormat, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "ppm" => Ok(DumpFormat::Ppm),
        "fbd" => Ok(DumpFormat::Fbd),
        "" => Err("dump format must not be empty".to_string()),
        other => Err(format!("unknown dump format '{other}'; expected ppm or fbd")),
    }
}

pub fn parse_machines(value: &str) -> Result<u32, String> {
    let count: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid machine count '{value}'"))?;
    if count == 0 {
        return Err("machine count must be at least 1".into());
    }
    Ok(count)
}
