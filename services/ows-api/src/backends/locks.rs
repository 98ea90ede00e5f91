//! WFS LockFeature: a lock table over the feature store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use ows_common::{ExceptionCode, HandlerError, OwsError, OwsResult, ProtocolVersion};
use ows_protocol::request::LockFeature;
use ows_protocol::response::LockFeatureResult;
use ows_protocol::{CanonicalRequest, CanonicalResponse, Handler, RequestPayload};
use tracing::{debug, info};
use uuid::Uuid;

use super::features::FeatureStore;
use super::unexpected;

/// Longest lock a client may ask for: one week.
const MAX_EXPIRY_SECONDS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone)]
struct Lock {
    features: BTreeSet<String>,
    expires_at: DateTime<Utc>,
}

/// Feature locks with expiry. Shared by every request thread.
pub struct LockManager {
    store: Arc<FeatureStore>,
    default_expiry_seconds: u64,
    locks: Mutex<HashMap<String, Lock>>,
}

impl LockManager {
    pub fn new(store: Arc<FeatureStore>, default_expiry_seconds: u64) -> Self {
        Self {
            store,
            default_expiry_seconds,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock(&self, request: &LockFeature, version: ProtocolVersion) -> OwsResult<LockFeatureResult> {
        self.lock_at(request, version, Utc::now())
    }

    fn lock_at(&self, request: &LockFeature, version: ProtocolVersion, now: DateTime<Utc>) -> OwsResult<LockFeatureResult> {
        let requested = if request.queries.is_empty() {
            Vec::new()
        } else {
            self.store.select_ids(&request.queries, version)?
        };
        let seconds = request
            .expiry_in_seconds
            .unwrap_or(self.default_expiry_seconds)
            .min(MAX_EXPIRY_SECONDS);
        let expires_at = now + Duration::seconds(seconds as i64);

        let mut locks = self
            .locks
            .lock()
            .map_err(|_| OwsError::Internal("lock table poisoned".to_string()))?;
        locks.retain(|_, lock| lock.expires_at > now);

        let lock_id = match &request.existing_lock_id {
            Some(id) if !locks.contains_key(id) => {
                return Err(OwsError::invalid_value(
                    lock_id_param(version),
                    format!("Lock {} does not exist or has expired", id),
                ))
            }
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };

        let (locked, not_locked): (Vec<String>, Vec<String>) = requested.into_iter().partition(|id| {
            !locks
                .iter()
                .any(|(other, lock)| *other != lock_id && lock.features.contains(id))
        });

        if request.lock_all && !not_locked.is_empty() {
            return Err(HandlerError::new(format!(
                "Features already locked: {}",
                not_locked.join(", ")
            ))
            .with_code(ExceptionCode::Custom("CannotLockAllFeatures".to_string()))
            .into());
        }

        let entry = locks.entry(lock_id.clone()).or_insert_with(|| Lock {
            features: BTreeSet::new(),
            expires_at,
        });
        entry.expires_at = expires_at;
        entry.features.extend(locked.iter().cloned());

        if request.existing_lock_id.is_some() {
            debug!(lock_id = %lock_id, added = locked.len(), "Lock renewed");
        } else {
            info!(lock_id = %lock_id, locked = locked.len(), not_locked = not_locked.len(), "Lock acquired");
        }

        // A renewal reports every feature the lock holds.
        let locked = if request.existing_lock_id.is_some() {
            entry.features.iter().cloned().collect()
        } else {
            locked
        };
        Ok(LockFeatureResult {
            lock_id,
            locked,
            not_locked,
        })
    }

    /// Number of live locks.
    pub fn active(&self) -> usize {
        let now = Utc::now();
        self.locks
            .lock()
            .map(|locks| locks.values().filter(|l| l.expires_at > now).count())
            .unwrap_or(0)
    }
}

fn lock_id_param(version: ProtocolVersion) -> &'static str {
    if version.major >= 2 {
        "LOCKID"
    } else {
        "lockId"
    }
}

impl Handler for LockManager {
    fn handle(&self, request: CanonicalRequest) -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::LockFeature(lock) => Ok(CanonicalResponse::LockFeature(self.lock(lock, request.version)?)),
            _ => Err(unexpected(&request)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::features::tests::roads_config;
    use ows_protocol::request::{QName, Query, QuerySelection};

    fn manager() -> LockManager {
        LockManager::new(Arc::new(FeatureStore::from_config(&roads_config())), 300)
    }

    fn lock_ids(ids: &[&str], lock_all: bool) -> LockFeature {
        LockFeature {
            queries: vec![Query::new(
                vec![QName::new(Some("app"), "Road", None)],
                QuerySelection::FeatureIds(ids.iter().map(|s| s.to_string()).collect()),
            )],
            lock_all,
            existing_lock_id: None,
            expiry_in_seconds: None,
        }
    }

    fn v2() -> ProtocolVersion {
        ProtocolVersion::new(2, 0, 0)
    }

    #[test]
    fn test_lock_some_skips_locked_features() {
        let manager = manager();
        let first = manager.lock(&lock_ids(&["r1"], true), v2()).unwrap();
        assert_eq!(first.locked, vec!["r1"]);

        let second = manager.lock(&lock_ids(&["r1", "r2"], false), v2()).unwrap();
        assert_ne!(second.lock_id, first.lock_id);
        assert_eq!(second.locked, vec!["r2"]);
        assert_eq!(second.not_locked, vec!["r1"]);
        assert_eq!(manager.active(), 2);
    }

    #[test]
    fn test_lock_all_fails_when_any_is_locked() {
        let manager = manager();
        manager.lock(&lock_ids(&["r1"], true), v2()).unwrap();

        let err = manager.lock(&lock_ids(&["r1", "r2"], true), v2()).unwrap_err();
        let OwsError::Handler(err) = err else {
            panic!("expected handler error");
        };
        assert_eq!(err.code, Some(ExceptionCode::Custom("CannotLockAllFeatures".into())));
        assert_eq!(manager.active(), 1);
    }

    #[test]
    fn test_expired_locks_are_released() {
        let manager = manager();
        let mut request = lock_ids(&["r1"], true);
        request.expiry_in_seconds = Some(60);
        let now = Utc::now();
        manager.lock_at(&request, v2(), now).unwrap();

        let later = now + Duration::seconds(61);
        let again = manager.lock_at(&lock_ids(&["r1"], true), v2(), later).unwrap();
        assert_eq!(again.locked, vec!["r1"]);
    }

    #[test]
    fn test_renewal_by_lock_id() {
        let manager = manager();
        let first = manager.lock(&lock_ids(&["r1"], true), v2()).unwrap();

        let renewal = LockFeature {
            queries: Vec::new(),
            lock_all: false,
            existing_lock_id: Some(first.lock_id.clone()),
            expiry_in_seconds: Some(600),
        };
        let renewed = manager.lock(&renewal, v2()).unwrap();
        assert_eq!(renewed.lock_id, first.lock_id);
        assert_eq!(renewed.locked, vec!["r1"]);
    }

    #[test]
    fn test_unknown_lock_id() {
        let renewal = LockFeature {
            queries: Vec::new(),
            lock_all: false,
            existing_lock_id: Some("nope".into()),
            expiry_in_seconds: None,
        };
        let err = manager().lock(&renewal, v2()).unwrap_err();
        assert!(matches!(err, OwsError::InvalidParameterValue { ref param, .. } if param == "LOCKID"));
    }
}
