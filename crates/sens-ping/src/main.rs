//! Sensitivity ping runner

mod cli;
mod suite;

use clap::Parser;
use std::process::ExitCode;

use cli::Cli;

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sens_ping=info,sens_cad=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let suite = match suite::load_suite(cli.config.as_deref()) {
        Ok(suite) => suite,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let kernel = sens_cad::default_kernel();
    tracing::info!("Running {} scenarios on the {} kernel", suite.scenarios.len(), kernel.name());
    let report = sens_cad::run_suite(kernel.as_ref(), &suite.scenarios);

    if cli.json {
        match suite::to_json(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(2);
            }
        }
    } else {
        print!("{}", suite::summary(&report));
    }

    if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
