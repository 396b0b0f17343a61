//! Library side of the `xlsx-report` binary, kept separate so the flow can be tested.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use report_engine::{RenderOptions, Value, XlsxTemplate};

/// What one `xlsx-report` invocation does.
#[derive(Clone, Debug)]
pub struct Job {
    pub template: PathBuf,
    /// `-` writes the report to stdout.
    pub output: PathBuf,
    /// JSON file with the render data; without one every sheet renders with an empty context.
    pub data: Option<PathBuf>,
    pub options: RenderOptions,
}

pub fn load_data(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Map(Default::default()));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Value::from(json))
}

pub fn run(job: &Job) -> Result<()> {
    let data = load_data(job.data.as_deref())?;
    let mut template = XlsxTemplate::open(&job.template)
        .with_context(|| format!("failed to open template {}", job.template.display()))?;
    template
        .render_with_options(&data, job.options)
        .with_context(|| format!("failed to render {}", job.template.display()))?;

    if job.output.as_os_str() == "-" {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        template.write(&mut lock).context("failed to write report to stdout")?;
        lock.flush()?;
    } else {
        template
            .save(&job.output)
            .with_context(|| format!("failed to save report to {}", job.output.display()))?;
        log::info!("wrote {}", job.output.display());
    }
    Ok(())
}
