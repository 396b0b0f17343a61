use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use report_cli::{run, Job};
use report_engine::RenderOptions;

#[derive(Parser)]
#[command(about = "Render an XLSX report from a template workbook and JSON data.")]
struct Args {
    /// Template workbook.
    #[arg(long, default_value = "template.xlsx")]
    template: PathBuf,

    /// Where to write the report (`-` for stdout).
    #[arg(long, default_value = "report.xlsx")]
    output: PathBuf,

    /// JSON data: one object for every sheet, or an array with one object per sheet.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Turn on word wrap in every rendered cell.
    #[arg(long)]
    wrap_text: bool,

    /// Log progress (same as `RUST_LOG=debug`).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    run(&Job {
        template: args.template,
        output: args.output,
        data: args.data,
        options: RenderOptions {
            force_wrap_text: args.wrap_text,
        },
    })
}
