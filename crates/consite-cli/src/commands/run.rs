use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use consite_delin::{create_con_sites, load_config, load_scene, write_report, write_sites, PipelineConfig};
use consite_geom::PlanarKernel;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML pipeline configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// JSON scene with evidence, layers and the site template.
    #[arg(long)]
    pub scene: PathBuf,
    /// Output directory for `consites.json` and `run_report.json`.
    #[arg(long)]
    pub out: PathBuf,
    /// Override the number of proto-sites processed in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(concurrency) = args.concurrency {
        config.execution.concurrency = concurrency;
    }
    let scene = load_scene(&args.scene)?;
    let kernel = PlanarKernel::default();
    let output = create_con_sites(&kernel, &scene, &config)?;

    fs::create_dir_all(&args.out)?;
    write_sites(&args.out.join("consites.json"), &output.sites)?;
    write_report(&args.out.join("run_report.json"), &output.report)?;
    let summary = output.report.summary();
    info!(
        out = %args.out.display(),
        proto_sites = summary.proto_sites,
        committed = summary.committed,
        failed = summary.failed,
        elapsed_ms = summary.elapsed_ms,
        "outputs written"
    );
    Ok(())
}
