use loadout_core::ObserverId;
use thiserror::Error;

/// Errors raised by the replication layer.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{0} is not connected")]
    UnknownObserver(ObserverId),

    #[error("the authority endpoint has been dropped")]
    AuthorityGone,
}
