#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Generic {0}")]
    Generic(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing analysis for {0}")]
    MissingAnalysis(String),

    #[error("Document failed: {0}")]
    DocumentFailed(String),
}
