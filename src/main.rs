use anyhow::Result;
use clap::Parser;
use log::debug;

use pairset::{Opts, run};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    debug!("{:?}", opts);

    run(&opts)?;
    Ok(())
}
