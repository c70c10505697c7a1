//! Rerank drivers: reorder candidate texts by relevance to a query.

mod local;
mod nvidia;

pub use local::LocalRerankDriver;
pub use nvidia::{NvidiaRerankDriver, Truncate};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::DriverError;
use crate::artifacts::TextArtifact;

#[async_trait]
pub trait RerankDriver: Send + Sync {
    /// Returns the artifacts most relevant to `query`, best first. An empty
    /// input returns an empty output without calling the provider.
    async fn run(
        &self,
        query: &str,
        artifacts: Vec<TextArtifact>,
    ) -> Result<Vec<TextArtifact>, DriverError>;
}

/// One entry of a provider's ranking answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ranking {
    pub index: i64,
    #[serde(alias = "relevance_score")]
    pub logit: f64,
    #[serde(default)]
    pub usage: Option<Value>,
}

/// Picks `artifacts` in the order of `rankings`, annotating each with its
/// `logit` and, when present, `usage`.
pub fn apply_rankings(
    driver: &'static str,
    artifacts: &[TextArtifact],
    rankings: Vec<Ranking>,
) -> Result<Vec<TextArtifact>, DriverError> {
    rankings
        .into_iter()
        .map(|ranking| {
            let artifact = usize::try_from(ranking.index)
                .ok()
                .and_then(|i| artifacts.get(i))
                .ok_or_else(|| {
                    DriverError::protocol(
                        driver,
                        "run",
                        format!(
                            "ranking index {} outside of [0, {})",
                            ranking.index,
                            artifacts.len()
                        ),
                    )
                })?;
            let mut artifact = artifact.clone().annotated("logit", json!(ranking.logit));
            if let Some(usage) = ranking.usage {
                artifact = artifact.annotated("usage", usage);
            }
            Ok(artifact)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_rankings_rejects_out_of_range() {
        let artifacts = vec![TextArtifact::new("a")];
        for index in [1, -1] {
            let rankings = vec![Ranking {
                index,
                logit: 0.0,
                usage: None,
            }];
            assert!(matches!(
                apply_rankings("D", &artifacts, rankings),
                Err(DriverError::Protocol { driver: "D", operation: "run", .. })
            ));
        }
    }
}
