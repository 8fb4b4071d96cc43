use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use consite_core::SiteType;
use consite_delin::PipelineConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Destination path for the generated configuration YAML.
    #[arg(long)]
    pub out: PathBuf,
    /// Generate a hydrography-only (alternate) configuration.
    #[arg(long, default_value_t = false)]
    pub alternate: bool,
}

pub fn run(args: &ConfigArgs) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut config = PipelineConfig::default();
    if args.alternate {
        config.site_type = SiteType::Alternate;
    }
    fs::write(&args.out, config.to_yaml_string()?)?;
    println!("{}", config.config_hash()?);
    Ok(())
}
