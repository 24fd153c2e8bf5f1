use newsroom_core::ContentId;
use newsroom_ledger::LedgerError;
use newsroom_roles::ConfigurationError;
use thiserror::Error;

/// Errors surfaced to engine callers. Policy outcomes (rejection, role
/// failure) are not errors: they end the run in a terminal state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("content item not found: {0}")]
    NotFound(ContentId),
    /// The ledger refused a write or returned an unreadable history. Fatal to the run.
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),
    #[error("content item {0} is already running")]
    AlreadyRunning(ContentId),
    #[error("run task for {content_id} ended abnormally: {detail}")]
    Join { content_id: ContentId, detail: String },
}
