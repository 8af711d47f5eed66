/// Unified error type for the fragment editor.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("Label has to be unique: {0}")]
    DuplicateLabel(String),

    #[error("No empty label allowed")]
    EmptyLabel,

    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parametrization failed, code not executable: {0}")]
    Execution(String),

    #[error("No placeholders found")]
    NoPlaceholders,

    #[error("Syntax error in selection: {0}")]
    Syntax(String),

    #[error("List of children for node {0} is incomplete")]
    MissingChildList(String),

    #[error("List of nodes unavailable")]
    MissingNodeList,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FragmentError>;
