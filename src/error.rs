// src/error.rs
// Crate-wide error type. Every stage returns `Result<T>` and propagates with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FairnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("plot error: {0}")]
    Plot(String),
}

impl From<figment::Error> for FairnessError {
    fn from(err: figment::Error) -> Self {
        FairnessError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for FairnessError {
    fn from(err: reqwest::Error) -> Self {
        FairnessError::Llm(format!("request failed: {}", err))
    }
}

impl<E> From<plotters::drawing::DrawingAreaErrorKind<E>> for FairnessError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        FairnessError::Plot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FairnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_prefix() {
        let err = FairnessError::Model("single class".into());
        assert_eq!(err.to_string(), "model error: single class");

        let err = FairnessError::Llm("API error (401): nope".into());
        assert_eq!(err.to_string(), "LLM error: API error (401): nope");
    }

    #[test]
    fn io_errors_convert() {
        fn open_missing() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/definitely/not/here.json")?)
        }
        assert!(matches!(open_missing(), Err(FairnessError::Io(_))));
    }
}
