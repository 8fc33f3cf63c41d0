use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Everything needed to answer the interaction that started a round of
/// bus traffic, once the backend's reply comes in.
#[derive(Debug, Clone)]
pub struct InteractionContext {
    pub correlation_id: String,
    pub interaction_id: String,
    pub interaction_token: String,
    pub user_id: String,
    pub guild_id: String,
    pub channel_id: String,
    /// Retry-button custom id carrying the submitted dialog inputs, for
    /// interactions that came out of a modal.
    pub retry_payload: Option<String>,
    pub created_at: Instant,
}

/// Default lifetime of a cached interaction; Discord tokens expire at
/// fifteen minutes so holding them longer is pointless.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_CAPACITY: usize = 1024;

/// TTL-bounded, capacity-bounded map from correlation id to interaction
/// context. Least-recently-used entries go first when full.
#[derive(Debug)]
pub struct InteractionCache {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, InteractionContext>,
    // Front = most recently used.
    order: VecDeque<String>,
}

impl Default for InteractionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl InteractionCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn put(&self, ctx: InteractionContext) {
        let mut inner = self.inner.lock().expect("interaction cache poisoned");
        let key = ctx.correlation_id.clone();
        Self::purge_expired(&mut inner, self.ttl);
        if inner.entries.insert(key.clone(), ctx).is_some() {
            inner.order.retain(|k| k != &key);
        } else if inner.entries.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_back() {
                inner.entries.remove(&evicted);
            }
        }
        inner.order.push_front(key);
    }

    /// Looks up a context and refreshes its recency. Expired entries read
    /// as missing.
    pub fn get(&self, correlation_id: &str) -> Option<InteractionContext> {
        let mut inner = self.inner.lock().expect("interaction cache poisoned");
        Self::purge_expired(&mut inner, self.ttl);
        let ctx = inner.entries.get(correlation_id).cloned()?;
        inner.order.retain(|k| k != correlation_id);
        inner.order.push_front(correlation_id.to_string());
        Some(ctx)
    }

    /// Removes and returns a context, for callers consuming it exactly once.
    pub fn remove(&self, correlation_id: &str) -> Option<InteractionContext> {
        let mut inner = self.inner.lock().expect("interaction cache poisoned");
        let ctx = inner.entries.remove(correlation_id);
        if ctx.is_some() {
            inner.order.retain(|k| k != correlation_id);
        }
        ctx
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("interaction cache poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(inner: &mut Inner, ttl: Duration) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, ctx)| now.duration_since(ctx.created_at) > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            inner.entries.remove(&key);
            inner.order.retain(|k| k != &key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(correlation_id: &str) -> InteractionContext {
        ctx_created_at(correlation_id, Instant::now())
    }

    fn ctx_created_at(correlation_id: &str, created_at: Instant) -> InteractionContext {
        InteractionContext {
            correlation_id: correlation_id.to_string(),
            interaction_id: format!("I-{correlation_id}"),
            interaction_token: format!("T-{correlation_id}"),
            user_id: "U1".into(),
            guild_id: "G1".into(),
            channel_id: "C1".into(),
            retry_payload: None,
            created_at,
        }
    }

    #[test]
    fn put_get_remove_round_trip() {
        let cache = InteractionCache::default();
        cache.put(ctx("corr-1"));
        let found = cache.get("corr-1").unwrap();
        assert_eq!(found.interaction_token, "T-corr-1");
        assert!(cache.remove("corr-1").is_some());
        assert!(cache.get("corr-1").is_none());
    }

    #[test]
    fn expired_entries_read_as_missing() {
        let cache = InteractionCache::new(Duration::from_secs(60), 8);
        let stale = Instant::now() - Duration::from_secs(120);
        cache.put(ctx_created_at("old", stale));
        cache.put(ctx("fresh"));
        assert!(cache.get("old").is_none());
        assert!(cache.get("fresh").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let cache = InteractionCache::new(Duration::from_secs(60), 2);
        cache.put(ctx("a"));
        cache.put(ctx("b"));
        // Touch "a" so "b" is the LRU entry.
        assert!(cache.get("a").is_some());
        cache.put(ctx("c"));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinserting_same_key_keeps_single_entry() {
        let cache = InteractionCache::new(Duration::from_secs(60), 4);
        cache.put(ctx("dup"));
        cache.put(ctx("dup"));
        assert_eq!(cache.len(), 1);
    }
}
