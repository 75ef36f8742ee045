use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sens-ping",
    about = "Verify analytic design velocities against finite differences",
    version
)]
pub struct Cli {
    /// RON suite file; the standard suite runs when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output the suite report as JSON
    #[arg(long)]
    pub json: bool,
}
