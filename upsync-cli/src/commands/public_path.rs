//! `upsync public-path`: the URL prefix bundlers should emit.

use anyhow::Result;
use clap::Args;

use super::ConfigArgs;

/// Arguments for `upsync public-path`.
#[derive(Args, Debug)]
pub struct PublicPathArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl PublicPathArgs {
    pub fn run(self) -> Result<()> {
        let (cfg, _) = self.config.resolve()?;
        if !cfg.use_public_path {
            eprintln!("use_public_path is disabled; keep the bundler's own public path");
            return Ok(());
        }
        println!("{}", cfg.public_path());
        Ok(())
    }
}
