//! Error taxonomy used throughout the crate.
//!
//! Errors are grouped by the phase in which they are detected:
//! - [ModelError::Configuration] when loading declarations,
//! - [ModelError::ConceptualModel] when resolving and building,
//! - [ModelError::MissingData] when something referenced is absent or has no data yet,
//! - [ModelError::Expression] when parsing and compiling symbolic expressions,
//! - [ModelError::Solver] when a backend fails for a sub-problem.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("conceptual model error: {0}")]
    ConceptualModel(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("expression error: {0}")]
    Expression(String),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {context}")]
    Io {
        context : String,
        #[source]
        source  : std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse category of a [ModelError].
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ErrorKind {
    Configuration,
    ConceptualModel,
    MissingData,
    Expression,
    Solver,
    Storage,
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Configuration(_) | ModelError::Yaml(_) => ErrorKind::Configuration,
            ModelError::ConceptualModel(_) => ErrorKind::ConceptualModel,
            ModelError::MissingData(_) => ErrorKind::MissingData,
            ModelError::Expression(_) => ErrorKind::Expression,
            ModelError::Solver(_) => ErrorKind::Solver,
            ModelError::Storage(_) | ModelError::Io{..} | ModelError::Json(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn config<S : Into<String>>(msg : S) -> ModelError { ModelError::Configuration(msg.into()) }
    pub(crate) fn conceptual<S : Into<String>>(msg : S) -> ModelError { ModelError::ConceptualModel(msg.into()) }
    pub(crate) fn missing<S : Into<String>>(msg : S) -> ModelError { ModelError::MissingData(msg.into()) }
    pub(crate) fn expression<S : Into<String>>(msg : S) -> ModelError { ModelError::Expression(msg.into()) }
}

pub type Result<T> = std::result::Result<T,ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(ModelError::conceptual("x").kind(), ErrorKind::ConceptualModel);
        assert_eq!(ModelError::expression("x").kind(), ErrorKind::Expression);
        let e : ModelError = serde_yaml::from_str::<Vec<u32>>("{").unwrap_err().into();
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(format!("{}",ModelError::missing("table T")).contains("table T"));
    }
}
