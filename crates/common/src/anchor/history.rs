use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AnchorError, AnchorRegistry};
use crate::linked_data::{cid_string, Cid};

/// One anchoring of a CID under a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEvent {
    pub key: String,
    #[serde(with = "cid_string")]
    pub cid: Cid,
    pub anchored_at: DateTime<Utc>,
    /// Id of the chain block holding the anchor, chain registries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
}

/// Inclusive time window over anchor events. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl HistoryRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *at >= start) && self.end.map_or(true, |end| *at <= end)
    }
}

/// Summary of a key's anchor history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_events: usize,
    pub distinct_cids: usize,
    pub first_anchored: Option<DateTime<Utc>>,
    pub last_anchored: Option<DateTime<Utc>>,
}

/// Anchor events for one key, newest first, with summary statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorHistory {
    pub key: String,
    pub events: Vec<AnchorEvent>,
    pub statistics: HistoryStats,
}

impl AnchorHistory {
    /// `events` must already be ordered newest first
    pub fn new(key: impl Into<String>, events: Vec<AnchorEvent>) -> Self {
        let distinct: HashSet<&Cid> = events.iter().map(|event| &event.cid).collect();
        let statistics = HistoryStats {
            total_events: events.len(),
            distinct_cids: distinct.len(),
            first_anchored: events.last().map(|event| event.anchored_at),
            last_anchored: events.first().map(|event| event.anchored_at),
        };
        Self {
            key: key.into(),
            events,
            statistics,
        }
    }
}

/// Load the history of `key` from `registry`, restricted to `range`
pub async fn anchor_history<A>(
    registry: &A,
    key: &str,
    range: &HistoryRange,
) -> Result<AnchorHistory, AnchorError>
where
    A: AnchorRegistry + ?Sized,
{
    let events = registry.history(key, range).await?;
    Ok(AnchorHistory::new(key, events))
}

/// Whether a CID is what a key currently resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorVerification {
    pub key: String,
    #[serde(with = "cid_string")]
    pub cid: Cid,
    /// `cid` is the key's current anchor
    pub current: bool,
    /// What the key resolves to, `None` when nothing is anchored under it
    #[serde(default, with = "cid_string::option")]
    pub current_cid: Option<Cid>,
}

/// Check `cid` against the current anchor of `key`
///
/// A key with nothing anchored is a negative result, not an error. Registry
///  and integrity failures are passed through.
pub async fn verify_anchor<A>(registry: &A, key: &str, cid: &Cid) -> Result<AnchorVerification, AnchorError>
where
    A: AnchorRegistry + ?Sized,
{
    let current_cid = match registry.lookup(key).await {
        Ok(current) => Some(current),
        Err(AnchorError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };
    Ok(AnchorVerification {
        key: key.to_string(),
        cid: *cid,
        current: current_cid.as_ref() == Some(cid),
        current_cid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::MemoryAnchorRegistry;
    use crate::linked_data::content_cid;
    use chrono::TimeZone;

    fn event(cid: &[u8], at: i64) -> AnchorEvent {
        AnchorEvent {
            key: "k".into(),
            cid: content_cid(cid),
            anchored_at: Utc.timestamp_opt(at, 0).unwrap(),
            block: None,
            block_hash: None,
        }
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        let range = HistoryRange {
            start: Some(at(10)),
            end: Some(at(20)),
        };
        assert!(range.contains(&at(10)));
        assert!(range.contains(&at(20)));
        assert!(!range.contains(&at(9)));
        assert!(!range.contains(&at(21)));
        assert!(HistoryRange::all().contains(&at(0)));
    }

    #[test]
    fn test_history_statistics() {
        let history = AnchorHistory::new("k", vec![event(b"b", 30), event(b"a", 20), event(b"a", 10)]);
        assert_eq!(history.statistics.total_events, 3);
        assert_eq!(history.statistics.distinct_cids, 2);
        assert_eq!(history.statistics.first_anchored, Some(Utc.timestamp_opt(10, 0).unwrap()));
        assert_eq!(history.statistics.last_anchored, Some(Utc.timestamp_opt(30, 0).unwrap()));

        let empty = AnchorHistory::new("k", vec![]);
        assert_eq!(empty.statistics.total_events, 0);
        assert_eq!(empty.statistics.last_anchored, None);
    }

    #[tokio::test]
    async fn test_verify_current_and_superseded() {
        let registry = MemoryAnchorRegistry::new();
        let old = content_cid(b"old");
        let new = content_cid(b"new");
        registry.store("k", &old).await.unwrap();
        registry.store("k", &new).await.unwrap();

        let current = verify_anchor(&registry, "k", &new).await.unwrap();
        assert!(current.current);

        let superseded = verify_anchor(&registry, "k", &old).await.unwrap();
        assert!(!superseded.current);
        assert_eq!(superseded.current_cid, Some(new));
    }

    #[tokio::test]
    async fn test_verify_unknown_key() {
        let registry = MemoryAnchorRegistry::new();
        let verification = verify_anchor(&registry, "nobody", &content_cid(b"x"))
            .await
            .unwrap();
        assert!(!verification.current);
        assert_eq!(verification.current_cid, None);
    }
}
