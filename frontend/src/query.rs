//! Cached product-list queries keyed by (filter, page).
//!
//! Fetching happens outside the coordinator: `observe`/`ensure_fresh`/`refetch`
//! hand out a [`FetchTicket`], the caller awaits the catalog, then hands the
//! outcome back through [`ListQueryCoordinator::resolve`]. Each ticket carries
//! the generation it was issued for, so a response that has been superseded or
//! invalidated in the meantime is dropped instead of overwriting newer state.

use std::collections::HashMap;
use std::fmt;

use chrono::{TimeDelta, Utc};

use crate::error::CatalogError;
use crate::models::{CacheEntry, Filter, ListPage, PageRequest};

/// Every list query key starts with this, so invalidating it drops all lists.
pub const PRODUCTS_PREFIX: &str = "products";

/// Cached keys kept per coordinator. The oldest inactive ones go first.
pub const MAX_CACHED_KEYS: usize = 32;

/// Deterministic string form of a list query.
///
/// Fields are written in a fixed order and absent fields are skipped, so two
/// equal (filter, page) pairs always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_list(filter: &Filter, page: u32) -> Self {
        let mut parts = Vec::with_capacity(5);
        if let Some(category_id) = filter.category_id {
            parts.push(format!("categoryId={category_id}"));
        }
        parts.push(format!("page={page}"));
        if let Some(price_max) = filter.price_max {
            parts.push(format!("price_max={price_max}"));
        }
        if let Some(price_min) = filter.price_min {
            parts.push(format!("price_min={price_min}"));
        }
        if let Some(title) = &filter.title {
            parts.push(format!("title={}", urlencoding::encode(title)));
        }
        CacheKey(format!("{PRODUCTS_PREFIX}?{}", parts.join("&")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryKey {
    pub filter: Filter,
    pub page: u32,
}

impl QueryKey {
    pub fn new(filter: Filter, page: u32) -> Self {
        QueryKey {
            filter,
            page: page.max(1),
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_list(&self.filter, self.page)
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::for_page(self.page)
    }
}

/// Permission to run one fetch for one key at one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    query: QueryKey,
    cache_key: CacheKey,
    generation: u64,
}

impl FetchTicket {
    pub fn query(&self) -> &QueryKey {
        &self.query
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    Idle,
    Loading,
    Ready(CacheEntry),
    Failed(CatalogError),
}

impl QueryState {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            QueryState::Ready(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CatalogError> {
        match self {
            QueryState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

static IDLE: QueryState = QueryState::Idle;

/// What happened to a resolved fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Stored, and the key is the one currently shown.
    Applied,
    /// Stored under a key that is no longer active.
    Cached,
    /// Superseded or invalidated; the outcome was dropped.
    Discarded,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    state: QueryState,
}

#[derive(Debug)]
struct ActiveKey {
    query: QueryKey,
    cache_key: CacheKey,
}

#[derive(Debug)]
pub struct ListQueryCoordinator {
    active: Option<ActiveKey>,
    slots: HashMap<CacheKey, Slot>,
    next_generation: u64,
    stale_after: Option<TimeDelta>,
    max_keys: usize,
}

impl Default for ListQueryCoordinator {
    fn default() -> Self {
        ListQueryCoordinator {
            active: None,
            slots: HashMap::new(),
            next_generation: 0,
            stale_after: None,
            max_keys: MAX_CACHED_KEYS,
        }
    }
}

impl ListQueryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ready entries older than `stale_after` are fetched again on the next read.
    pub fn with_stale_after(stale_after: Option<TimeDelta>) -> Self {
        ListQueryCoordinator {
            stale_after,
            ..Self::default()
        }
    }

    /// Makes `key` the active query. Returns a ticket when it has to be fetched.
    pub fn observe(&mut self, key: QueryKey) -> Option<FetchTicket> {
        let cache_key = key.cache_key();
        let changed = self
            .active
            .as_ref()
            .is_none_or(|active| active.cache_key != cache_key);
        self.active = Some(ActiveKey {
            query: key,
            cache_key,
        });
        self.fetch_if_needed(changed)
    }

    /// Ticket for the active key if it has no usable entry (e.g. after invalidation).
    pub fn ensure_fresh(&mut self) -> Option<FetchTicket> {
        self.fetch_if_needed(false)
    }

    /// Forces a new fetch of the active key, superseding any fetch in flight.
    pub fn refetch(&mut self) -> Option<FetchTicket> {
        let active = self.active.as_ref()?;
        let (query, cache_key) = (active.query.clone(), active.cache_key.clone());
        Some(self.issue(query, cache_key))
    }

    /// Ticket for the active key when its last fetch failed. Failures are
    /// never retried on their own; this is the explicit way back.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        if self.current().error().is_some() {
            self.refetch()
        } else {
            None
        }
    }

    fn fetch_if_needed(&mut self, key_changed: bool) -> Option<FetchTicket> {
        let active = self.active.as_ref()?;
        let needs_fetch = match self.slots.get(&active.cache_key).map(|s| &s.state) {
            None | Some(QueryState::Idle) => true,
            Some(QueryState::Loading) => false,
            Some(QueryState::Ready(entry)) => self.is_stale(entry),
            Some(QueryState::Failed(_)) => key_changed,
        };
        if !needs_fetch {
            return None;
        }
        let (query, cache_key) = (active.query.clone(), active.cache_key.clone());
        Some(self.issue(query, cache_key))
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        self.stale_after
            .is_some_and(|limit| Utc::now() - entry.fetched_at > limit)
    }

    fn issue(&mut self, query: QueryKey, cache_key: CacheKey) -> FetchTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.slots.insert(
            cache_key.clone(),
            Slot {
                generation,
                state: QueryState::Loading,
            },
        );
        tracing::debug!(key = %cache_key, generation, "list fetch issued");
        self.evict_inactive();
        FetchTicket {
            query,
            cache_key,
            generation,
        }
    }

    /// Drops the least recently fetched keys, never the active one, until
    /// the cache is back under `max_keys`.
    fn evict_inactive(&mut self) {
        while self.slots.len() > self.max_keys {
            let active = self.active.as_ref().map(|a| &a.cache_key);
            let oldest = self
                .slots
                .iter()
                .filter(|(key, _)| Some(*key) != active)
                .min_by_key(|(_, slot)| slot.generation)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else {
                break;
            };
            self.slots.remove(&key);
            tracing::debug!(key = %key, "evicted cached list");
        }
    }

    /// Records the outcome of a fetch, unless a newer fetch or an
    /// invalidation has made it irrelevant.
    pub fn resolve(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<ListPage, CatalogError>,
    ) -> Resolution {
        let Some(slot) = self.slots.get_mut(&ticket.cache_key) else {
            tracing::info!(key = %ticket.cache_key, generation = ticket.generation, "dropping response for invalidated key");
            return Resolution::Discarded;
        };
        if slot.generation != ticket.generation {
            tracing::info!(
                key = %ticket.cache_key,
                generation = ticket.generation,
                latest = slot.generation,
                "dropping superseded response"
            );
            return Resolution::Discarded;
        }

        slot.state = match outcome {
            Ok(page) => QueryState::Ready(CacheEntry {
                products: page.products,
                total: page.total,
                fetched_at: Utc::now(),
            }),
            Err(err) => {
                tracing::warn!(key = %ticket.cache_key, error = %err, "list fetch failed");
                QueryState::Failed(err)
            }
        };

        let is_active = self
            .active
            .as_ref()
            .is_some_and(|active| active.cache_key == ticket.cache_key);
        if is_active {
            Resolution::Applied
        } else {
            Resolution::Cached
        }
    }

    /// Drops every cached entry whose key starts with `prefix`. In-flight
    /// fetches for those keys will be discarded when they resolve.
    pub fn invalidate(&mut self, prefix: &str) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| !key.has_prefix(prefix));
        let removed = before - self.slots.len();
        tracing::debug!(prefix, removed, "list cache invalidated");
        removed
    }

    pub fn current(&self) -> &QueryState {
        self.active
            .as_ref()
            .and_then(|active| self.slots.get(&active.cache_key))
            .map(|slot| &slot.state)
            .unwrap_or(&IDLE)
    }

    #[cfg(test)]
    pub fn cached_keys(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryRef, Product};

    fn product(id: u64) -> Product {
        Product {
            id,
            title: format!("Product {id}"),
            price: 10.0,
            description: String::new(),
            category: CategoryRef {
                id: 1,
                name: "Clothes".into(),
                image: None,
            },
            images: vec![],
        }
    }

    fn page_of(ids: &[u64]) -> ListPage {
        ListPage {
            products: ids.iter().copied().map(product).collect(),
            total: None,
        }
    }

    fn key(category: Option<u64>, page: u32) -> QueryKey {
        QueryKey::new(
            Filter {
                category_id: category,
                ..Default::default()
            },
            page,
        )
    }

    #[test]
    fn cache_key_is_deterministic_and_sparse() {
        let filter = Filter {
            title: Some("blue shirt".into()),
            category_id: Some(3),
            price_min: None,
            price_max: Some(40.0),
        };
        assert_eq!(
            CacheKey::for_list(&filter, 2).as_str(),
            "products?categoryId=3&page=2&price_max=40&title=blue%20shirt"
        );
        assert_eq!(
            CacheKey::for_list(&Filter::default(), 1).as_str(),
            "products?page=1"
        );
        assert_eq!(
            CacheKey::for_list(&filter, 2),
            CacheKey::for_list(&filter.clone(), 2)
        );
    }

    #[test]
    fn first_observation_loads_then_ready() {
        let mut query = ListQueryCoordinator::new();
        assert_eq!(query.current(), &QueryState::Idle);

        let ticket = query.observe(key(None, 1)).expect("new key fetches");
        assert!(query.current().is_loading());

        assert_eq!(query.resolve(ticket, Ok(page_of(&[1, 2]))), Resolution::Applied);
        assert_eq!(query.current().entry().unwrap().products.len(), 2);

        // Same key again: served from cache.
        assert!(query.observe(key(None, 1)).is_none());
    }

    #[test]
    fn observing_a_loading_key_does_not_duplicate() {
        let mut query = ListQueryCoordinator::new();
        let _ticket = query.observe(key(None, 1)).unwrap();
        assert!(query.observe(key(None, 1)).is_none());
        assert!(query.ensure_fresh().is_none());
    }

    #[test]
    fn stale_key_response_never_becomes_current() {
        let mut query = ListQueryCoordinator::new();
        let k1 = query.observe(key(Some(1), 1)).unwrap();
        let k2 = query.observe(key(Some(2), 1)).unwrap();

        assert_eq!(query.resolve(k2, Ok(page_of(&[20]))), Resolution::Applied);
        assert_eq!(query.resolve(k1, Ok(page_of(&[10]))), Resolution::Cached);

        let current = query.current().entry().unwrap();
        assert_eq!(current.products[0].id, 20);
    }

    #[test]
    fn slow_k1_resolving_before_k2_leaves_k2_loading() {
        let mut query = ListQueryCoordinator::new();
        let k1 = query.observe(key(Some(1), 1)).unwrap();
        let _k2 = query.observe(key(Some(2), 1)).unwrap();

        assert_eq!(query.resolve(k1, Ok(page_of(&[10]))), Resolution::Cached);
        assert!(query.current().is_loading());
    }

    #[test]
    fn refetch_supersedes_in_flight_request() {
        let mut query = ListQueryCoordinator::new();
        let first = query.observe(key(None, 1)).unwrap();
        let second = query.refetch().unwrap();
        assert!(second.generation() > first.generation());

        assert_eq!(query.resolve(second, Ok(page_of(&[2]))), Resolution::Applied);
        assert_eq!(query.resolve(first, Ok(page_of(&[1]))), Resolution::Discarded);
        assert_eq!(query.current().entry().unwrap().products[0].id, 2);
    }

    #[test]
    fn invalidation_refetches_only_the_active_key() {
        let mut query = ListQueryCoordinator::new();
        for category in [1, 2] {
            let ticket = query.observe(key(Some(category), 1)).unwrap();
            query.resolve(ticket, Ok(page_of(&[category])));
        }
        let ticket = query.observe(key(Some(3), 1)).unwrap();
        query.resolve(ticket, Ok(page_of(&[3])));
        assert_eq!(query.cached_keys(), 3);

        assert_eq!(query.invalidate(PRODUCTS_PREFIX), 3);
        assert_eq!(query.current(), &QueryState::Idle);

        let refetch = query.ensure_fresh().expect("active key refetches");
        assert_eq!(refetch.query(), &key(Some(3), 1));
        assert!(query.ensure_fresh().is_none());
        assert_eq!(query.cached_keys(), 1);
    }

    #[test]
    fn in_flight_response_after_invalidation_is_dropped() {
        let mut query = ListQueryCoordinator::new();
        let old = query.observe(key(None, 1)).unwrap();
        query.invalidate(PRODUCTS_PREFIX);
        let fresh = query.ensure_fresh().unwrap();

        assert_eq!(query.resolve(old, Ok(page_of(&[1]))), Resolution::Discarded);
        assert!(query.current().is_loading());
        assert_eq!(query.resolve(fresh, Ok(page_of(&[2]))), Resolution::Applied);
    }

    #[test]
    fn failure_is_not_retried_until_key_changes() {
        let mut query = ListQueryCoordinator::new();
        let ticket = query.observe(key(Some(1), 1)).unwrap();
        query.resolve(ticket, Err(CatalogError::Network("connection refused".into())));
        assert!(query.current().error().is_some());
        assert!(query.ensure_fresh().is_none());
        assert!(query.observe(key(Some(1), 1)).is_none());

        let other = query.observe(key(Some(2), 1)).unwrap();
        query.resolve(other, Ok(page_of(&[2])));
        assert!(query.observe(key(Some(1), 1)).is_some());
    }

    #[test]
    fn retry_refetches_a_failed_key() {
        let mut query = ListQueryCoordinator::new();
        assert!(query.retry().is_none());

        let ticket = query.observe(key(None, 1)).unwrap();
        query.resolve(ticket, Err(CatalogError::Network("timeout".into())));
        let retry = query.retry().expect("failed key can be retried");
        assert!(query.current().is_loading());
        assert!(query.retry().is_none());

        assert_eq!(query.resolve(retry, Ok(page_of(&[1]))), Resolution::Applied);
        assert!(query.retry().is_none());
    }

    #[test]
    fn cache_keeps_at_most_max_keys() {
        let mut query = ListQueryCoordinator {
            max_keys: 3,
            ..ListQueryCoordinator::new()
        };
        for page in 1..=5 {
            let ticket = query.observe(key(None, page)).unwrap();
            query.resolve(ticket, Ok(page_of(&[u64::from(page)])));
        }
        assert_eq!(query.cached_keys(), 3);
        assert_eq!(query.current().entry().unwrap().products[0].id, 5);

        // Page 1 was the oldest and has been dropped.
        assert!(query.observe(key(None, 1)).is_some());
        assert!(query.observe(key(None, 5)).is_none());
        assert_eq!(query.cached_keys(), 3);
    }

    #[test]
    fn eviction_spares_the_active_key() {
        let mut query = ListQueryCoordinator {
            max_keys: 1,
            ..ListQueryCoordinator::new()
        };
        let first = query.observe(key(None, 1)).unwrap();
        query.resolve(first, Ok(page_of(&[1])));
        let second = query.observe(key(None, 2)).unwrap();
        assert_eq!(query.cached_keys(), 1);
        assert!(query.current().is_loading());
        assert_eq!(query.resolve(second, Ok(page_of(&[2]))), Resolution::Applied);
    }

    #[test]
    fn entries_past_stale_after_are_refetched() {
        let mut query = ListQueryCoordinator::with_stale_after(Some(TimeDelta::zero()));
        let ticket = query.observe(key(None, 1)).unwrap();
        query.resolve(ticket, Ok(page_of(&[1])));
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(query.ensure_fresh().is_some());
    }
}
