use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unreadable token dump: {0}")]
    TokenDump(#[from] serde_json::Error),

    #[error("No se encontró la fila 'Totales' en Créditos Activos.")]
    TotalsNotFound,

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
