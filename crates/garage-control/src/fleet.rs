//! Bulk start and stop across many nodes of a cluster.
//!
//! Node lists are tokens: a literal id, or an inclusive numeric range
//! `start-end`. Operations fan out concurrently and report the first
//! failure only after every node has settled; siblings are never cancelled.

use std::sync::Arc;

use futures::future::join_all;
use garage_core::NodeId;

use crate::cluster::Cluster;
use crate::error::{ControlError, Result};
use crate::types::ActionOptions;

/// Most ids a single bulk request may expand to.
pub const MAX_EXPANDED_IDS: u64 = 10_000;

/// Expand id tokens into ids.
///
/// A token `a-b` whose bounds are both unsigned integers expands to every
/// id in `[a, b]` in ascending order, and to nothing when `a > b`. Any
/// other token is passed through unchanged.
///
/// ```
/// use garage_control::fleet::expand_ids;
///
/// assert_eq!(expand_ids(&["3-5", "7"]), ["3", "4", "5", "7"]);
/// assert!(expand_ids(&["10-8"]).is_empty());
/// ```
#[must_use]
pub fn expand_ids<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    let mut ids = Vec::new();
    for token in tokens {
        let token = token.as_ref();
        match parse_range(token) {
            Some((start, end)) => ids.extend((start..=end).map(|n| n.to_string())),
            None => ids.push(token.to_string()),
        }
    }
    ids
}

fn parse_range(token: &str) -> Option<(u64, u64)> {
    let (start, end) = token.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

/// Number of ids `tokens` expand to, computed without expanding them.
fn expanded_len<S: AsRef<str>>(tokens: &[S]) -> u64 {
    tokens
        .iter()
        .map(|token| match parse_range(token.as_ref()) {
            Some((start, end)) if start <= end => (end - start).saturating_add(1),
            Some(_) => 0,
            None => 1,
        })
        .fold(0, u64::saturating_add)
}

/// Expand tokens and validate every resulting id.
///
/// # Errors
///
/// Returns `ControlError::TooManyNodes` if the tokens expand to more than
/// [`MAX_EXPANDED_IDS`] ids, otherwise `ControlError::InvalidId` for the
/// first id that fails validation.
pub fn resolve_ids<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<NodeId>> {
    let requested = expanded_len(tokens);
    if requested > MAX_EXPANDED_IDS {
        return Err(ControlError::TooManyNodes {
            requested,
            max: MAX_EXPANDED_IDS,
        });
    }
    expand_ids(tokens)
        .into_iter()
        .map(|id| NodeId::new(id).map_err(Into::into))
        .collect()
}

/// Start every listed node concurrently.
///
/// # Errors
///
/// Returns `InvalidId` before starting anything if a token is malformed,
/// otherwise the first node failure once every start has settled.
pub async fn start_nodes<S: AsRef<str>>(
    cluster: &Arc<Cluster>,
    tokens: &[S],
    opts: ActionOptions,
) -> Result<()> {
    let ids = resolve_ids(tokens)?;
    tracing::info!(cluster = %cluster.name(), nodes = ids.len(), "Starting nodes");

    let results = join_all(ids.iter().map(|id| cluster.adapter().start_node(id, opts))).await;
    first_error(cluster, "start", &ids, results)
}

/// Stop the listed nodes concurrently, or every node of the cluster when no
/// list is given.
///
/// # Errors
///
/// Returns `InvalidId` before stopping anything if a token is malformed,
/// otherwise the first node failure once every stop has settled.
pub async fn stop_nodes<S: AsRef<str>>(
    cluster: &Arc<Cluster>,
    tokens: Option<&[S]>,
    opts: ActionOptions,
) -> Result<()> {
    let ids = match tokens {
        Some(tokens) => resolve_ids(tokens)?,
        None => cluster.adapter().node_ids(),
    };
    tracing::info!(cluster = %cluster.name(), nodes = ids.len(), "Stopping nodes");

    let results = join_all(ids.iter().map(|id| cluster.adapter().stop_node(id, opts))).await;
    first_error(cluster, "stop", &ids, results)
}

fn first_error(
    cluster: &Cluster,
    verb: &str,
    ids: &[NodeId],
    results: Vec<Result<()>>,
) -> Result<()> {
    let mut first = None;
    for (id, result) in ids.iter().zip(results) {
        if let Err(e) = result {
            tracing::warn!(cluster = %cluster.name(), node = %id, error = %e, "Failed to {verb} node");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{recording_registry, KIND};
    use crate::config::BackendConfig;
    use crate::interior::Capabilities;
    use crate::lifecycle::Action;
    use crate::types::NodeState;
    use garage_core::ClusterName;

    #[test]
    fn expands_ranges_and_literals() {
        assert_eq!(expand_ids(&["3-5", "7"]), ["3", "4", "5", "7"]);
        assert_eq!(expand_ids(&["1", "2-3"]), ["1", "2", "3"]);
        assert_eq!(expand_ids(&["4-4"]), ["4"]);
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(expand_ids(&["10-8"]).is_empty());
        assert_eq!(expand_ids(&["10-8", "x"]), ["x"]);
    }

    #[test]
    fn non_numeric_tokens_pass_through() {
        assert_eq!(
            expand_ids(&["web-a", "db", "-3", "2-"]),
            ["web-a", "db", "-3", "2-"]
        );
    }

    #[test]
    fn resolve_caps_expansion() {
        assert_eq!(resolve_ids(&["1-10000"]).unwrap().len(), 10_000);
        assert!(matches!(
            resolve_ids(&["1-10000", "x"]),
            Err(ControlError::TooManyNodes { requested: 10_001, .. })
        ));
        assert!(matches!(
            resolve_ids(&["0-18446744073709551615", "0-18446744073709551615"]),
            Err(ControlError::TooManyNodes {
                requested: u64::MAX,
                ..
            })
        ));
    }

    #[test]
    fn resolve_rejects_invalid_ids() {
        assert!(matches!(
            resolve_ids(&["1", "a/b"]),
            Err(ControlError::InvalidId(_))
        ));
        assert_eq!(resolve_ids(&["1-2"]).unwrap().len(), 2);
    }

    fn cluster(capabilities: Capabilities) -> Arc<Cluster> {
        let (registry, _) = recording_registry(capabilities, true);
        let config = BackendConfig::new(ClusterName::new("lab").unwrap(), KIND);
        Arc::new(Cluster::new(config, Arc::new(registry)))
    }

    #[tokio::test]
    async fn start_then_stop_everything() {
        let cluster = cluster(Capabilities::ALL);
        start_nodes(&cluster, &["1-3"], ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(cluster.nodes().len(), 3);
        for node in cluster.nodes() {
            assert_eq!(node.info().state, NodeState::Running);
        }

        stop_nodes::<&str>(&cluster, None, ActionOptions::default())
            .await
            .unwrap();
        for node in cluster.nodes() {
            assert_ne!(node.info().state, NodeState::Running);
        }
    }

    #[tokio::test]
    async fn stop_targets_only_listed_nodes() {
        let cluster = cluster(Capabilities::ALL);
        start_nodes(&cluster, &["1", "2"], ActionOptions::default())
            .await
            .unwrap();
        stop_nodes(&cluster, Some(&["2"][..]), ActionOptions::default())
            .await
            .unwrap();

        let one = cluster.node(NodeId::new("1").unwrap());
        assert_eq!(one.info().state, NodeState::Running);
    }

    #[tokio::test]
    async fn failures_are_aggregated_after_all_settle() {
        let cluster = cluster(Capabilities::ALL.without(Action::Start));
        let err = start_nodes(&cluster, &["1", "2"], ActionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidOperation { .. }));
        // Both nodes were attempted.
        assert_eq!(cluster.nodes().len(), 2);
    }
}
