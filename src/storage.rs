use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard,
};

use log::{debug, error, info, trace, warn};

use crate::{Adventure, AdventureError, AdventureRepository, MemoryRepository, Result};

/// Mutable part of the store, always changed under one lock
#[derive(Default)]
struct StoreState {
    /// Committed adventures in insertion order
    adventures: Vec<Adventure>,
    /// The record under edit/focus, if any
    current: Option<Adventure>,
}

/// Holds every committed adventure plus the currently selected one.
///
/// The store is constructed explicitly and shared by reference with the
/// screens that need it. `add` and `select` are its only mutators.
pub struct AdventureStore {
    state: Mutex<StoreState>,

    /// Durable backend, consulted on open and on every add
    repository: Box<dyn AdventureRepository>,

    /// Next value handed out by `next_id`
    next_id: AtomicU64,
}

impl AdventureStore {
    /// Creates an empty, memory-only store for the current session.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            repository: Box::new(MemoryRepository),
            next_id: AtomicU64::new(1),
        }
    }

    /// Opens a store over the given repository, loading what it already holds.
    ///
    /// The id generator is seeded past the highest numeric id found so that
    /// new ids never collide with loaded ones.
    pub fn open(repository: Box<dyn AdventureRepository>) -> Result<Self> {
        let adventures = repository.load_all().map_err(|e| {
            error!("Failed to load adventures: {}", e);
            e
        })?;

        let highest = adventures
            .iter()
            .filter_map(|a| a.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let last = highest.max(adventures.len() as u64);
        let next_id = last.checked_add(1).ok_or_else(|| {
            error!("Stored adventure ids leave no room for new ones");
            AdventureError::IdsExhausted { last }
        })?;

        info!(
            "Opened adventure store with {} adventures (next id {})",
            adventures.len(),
            next_id
        );

        Ok(Self {
            state: Mutex::new(StoreState {
                adventures,
                current: None,
            }),
            repository,
            next_id: AtomicU64::new(next_id),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| AdventureError::LockAcquisitionFailed {
                message: "Failed to acquire lock on adventure store".to_string(),
            })
    }

    /// Hands out a fresh id; values are never reused by this store.
    pub fn next_id(&self) -> Result<String> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map(|n| n.to_string())
            .map_err(|last| AdventureError::IdsExhausted { last })
    }

    /// Appends an adventure to the collection.
    ///
    /// The caller assigns the id. The record is persisted before it becomes
    /// visible, and readers never observe a partially applied add.
    pub fn add(&self, adventure: Adventure) -> Result<()> {
        let mut state = self.lock()?;

        if state.adventures.iter().any(|a| a.id == adventure.id) {
            warn!("Rejecting duplicate adventure id {}", adventure.id);
            return Err(AdventureError::AdventureAlreadyExists { id: adventure.id });
        }

        self.repository.append(&adventure)?;

        info!("Adventure added: {} ({})", adventure.id, adventure.name);
        state.adventures.push(adventure);
        Ok(())
    }

    /// Sets or clears the current-adventure pointer.
    ///
    /// No check is made that the adventure belongs to the collection.
    pub fn select(&self, adventure: Option<Adventure>) -> Result<()> {
        let mut state = self.lock()?;
        debug!(
            "Current adventure set to {:?}",
            adventure.as_ref().map(|a| a.id.as_str())
        );
        state.current = adventure;
        Ok(())
    }

    /// Snapshot of the whole collection in insertion order
    pub fn adventures(&self) -> Result<Vec<Adventure>> {
        Ok(self.lock()?.adventures.clone())
    }

    pub fn current(&self) -> Result<Option<Adventure>> {
        Ok(self.lock()?.current.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<Adventure>> {
        Ok(self.lock()?.adventures.iter().find(|a| a.id == id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.adventures.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.adventures.is_empty())
    }

    /// Searches adventures by name and description using fuzzy matching.
    ///
    /// Name matches weigh twice as much as description matches. Results are
    /// sorted best first; equal scores keep insertion order.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Adventure>> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        info!("Searching adventures with query: '{}'", query);

        let snapshot = self.adventures()?;
        let matcher = SkimMatcherV2::default();

        let mut scored: Vec<(i64, Adventure)> = snapshot
            .into_iter()
            .filter_map(|adventure| {
                let name_score = matcher.fuzzy_match(&adventure.name, query).unwrap_or(0);
                let description_score = adventure
                    .description
                    .as_deref()
                    .and_then(|d| matcher.fuzzy_match(d, query))
                    .unwrap_or(0);
                let score = name_score * 2 + description_score;
                trace!("Adventure {} scored {}", adventure.id, score);
                (score > 0).then_some((score, adventure))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let results: Vec<Adventure> = scored
            .into_iter()
            .take(limit)
            .map(|(_, adventure)| adventure)
            .collect();

        debug!("Returning {} search results", results.len());
        Ok(results)
    }
}

impl Default for AdventureStore {
    fn default() -> Self {
        Self::new()
    }
}
