use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use consite_delin::load_report;

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Run report produced by `consite run`.
    #[arg(long)]
    pub report: PathBuf,
}

pub fn run(args: &SummarizeArgs) -> Result<(), Box<dyn Error>> {
    let report = load_report(&args.report)?;
    let summary = report.summary();
    println!("proto-sites: {}", summary.proto_sites);
    println!("committed:   {}", summary.committed);
    println!("empty:       {}", summary.empty);
    println!("failed:      {}", summary.failed);
    println!("culled PFs:  {}", summary.culled_evidence);
    println!("elapsed:     {} ms", summary.elapsed_ms);
    for failure in &report.failures {
        println!(
            "failure proto_site={} stage={} error={}",
            failure.proto_site, failure.stage, failure.error
        );
    }
    Ok(())
}
