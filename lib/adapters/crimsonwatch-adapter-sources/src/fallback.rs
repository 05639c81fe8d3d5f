//! Static fallback datasets.
//!
//! Two profiles ship inside the crate. A configured directory may override
//! either with `{dir}/{profile}.json`. Loaded snapshots are always flagged
//! not-live.

use std::path::PathBuf;

use async_trait::async_trait;

use crimsonwatch_domain::{FallbackProfile, SecuritySnapshot};
use crimsonwatch_ports::{FetchRequest, RawPayload, SourceClient, SourceError, SourceKind, SourceResult};

const NORMAL: &str = include_str!("../data/normal.json");
const ATTACK: &str = include_str!("../data/attack.json");

#[derive(Debug, Clone, Default)]
pub struct StaticFallbackClient {
    dir: Option<PathBuf>,
}

impl StaticFallbackClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Parse the dataset bundled for `profile`.
    pub fn bundled(profile: FallbackProfile) -> Result<SecuritySnapshot, SourceError> {
        let raw = match profile {
            FallbackProfile::Normal => NORMAL,
            FallbackProfile::Attack => ATTACK,
        };
        parse(profile, raw)
    }

    pub async fn load(&self, profile: FallbackProfile) -> Result<SecuritySnapshot, SourceError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{profile}.json"));
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => return parse(profile, &raw),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "no override, using bundled dataset");
                }
                Err(err) => {
                    return Err(SourceError::Unreachable {
                        origin: SourceKind::Fallback,
                        reason: format!("{}: {err}", path.display()),
                    });
                }
            }
        }
        Self::bundled(profile)
    }
}

fn parse(profile: FallbackProfile, raw: &str) -> Result<SecuritySnapshot, SourceError> {
    serde_json::from_str::<SecuritySnapshot>(raw)
        .map(|snapshot| snapshot.with_live(false))
        .map_err(|err| SourceError::Malformed {
            origin: SourceKind::Fallback,
            reason: format!("{profile} dataset: {err}"),
        })
}

#[async_trait]
impl SourceClient for StaticFallbackClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Fallback
    }

    async fn fetch(&self, request: &FetchRequest) -> SourceResult {
        let Some(profile) = request.fallback_profile else {
            return Err(SourceError::Disabled {
                origin: SourceKind::Fallback,
            });
        };
        let snapshot = self.load(profile).await?;
        Ok(RawPayload::Fallback(Box::new(snapshot)))
    }
}
