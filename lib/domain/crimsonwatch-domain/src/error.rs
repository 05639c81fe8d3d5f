use serde::{Deserialize, Serialize};

/// Error categories surfaced next to a snapshot.
///
/// Only [`ErrorKind::AllSourcesFailed`] ever reaches a consumer; the other
/// kinds are recorded while a cycle degrades and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum ErrorKind {
    #[error("source unreachable")]
    SourceUnreachable,
    #[error("source returned a malformed response")]
    SourceMalformed,
    #[error("no live source returned data")]
    AllSourcesFailed,
    #[error("cycle completed after teardown")]
    TeardownRace,
}
