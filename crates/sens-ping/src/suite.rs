//! Suite loading and report rendering

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sens_cad::{SensError, SuiteConfig, SuiteReport};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },

    #[error("Invalid suite: {0}")]
    Invalid(#[from] SensError),

    #[error("Failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}

/// Load a suite from a RON file, or the standard suite
pub fn load_suite(path: Option<&Path>) -> Result<SuiteConfig, SuiteError> {
    let Some(path) = path else {
        return Ok(SuiteConfig::standard());
    };
    let text = std::fs::read_to_string(path).map_err(|source| SuiteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let suite: SuiteConfig = ron::from_str(&text).map_err(|source| SuiteError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    for scenario in &suite.scenarios {
        scenario.validate()?;
    }
    tracing::info!("Loaded {} scenarios from {}", suite.scenarios.len(), path.display());
    Ok(suite)
}

/// One line per scenario orientation plus a total
pub fn summary(report: &SuiteReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let status = match &outcome.structural {
            Some(e) => format!("ERROR {e}"),
            None if outcome.finding_count() == 0 => "ok".to_string(),
            None => format!("{} findings", outcome.finding_count()),
        };
        let _ = writeln!(
            out,
            "{:<9} {:<8} {:>2} directions  {}",
            outcome.family.to_string(),
            format!("{:?}", outcome.orientation),
            outcome.reports.len(),
            status
        );
    }
    let _ = writeln!(
        out,
        "{} scenarios, {} structural errors, {} findings",
        report.outcomes.len(),
        report.structural_count(),
        report.finding_count()
    );
    out
}

pub fn to_json(report: &SuiteReport) -> Result<String, SuiteError> {
    Ok(serde_json::to_string_pretty(report)?)
}
