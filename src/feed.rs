//! Live catalog lists: the result of the last fetch plus rows announced by
//! inserts, keyed by id so a row never appears twice.

use crate::model::catalog::{Event, Internship};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub trait Keyed {
    fn key(&self) -> Uuid;
}

/// Newest-first list with at most one entry per key.
#[derive(Debug, Clone)]
pub struct LiveList<T> {
    items: Vec<T>,
    /// Keys announced by inserts since the last fetch.
    announced: HashSet<Uuid>,
    hydrated: bool,
}

impl<T> Default for LiveList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            announced: HashSet::new(),
            hydrated: false,
        }
    }
}

impl<T: Keyed + Clone> LiveList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full fetch has been applied at least once.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Replaces the list with a fetch result, keeping the first occurrence of
    /// each key. Rows announced since the previous fetch that the fetch does
    /// not contain yet stay at the front.
    pub fn replace_with_fetch(&mut self, fetched: Vec<T>) {
        let mut seen = HashSet::with_capacity(fetched.len());
        let fetched: Vec<T> = fetched
            .into_iter()
            .filter(|item| seen.insert(item.key()))
            .collect();

        let announced = std::mem::take(&mut self.announced);
        let mut items: Vec<T> = self
            .items
            .drain(..)
            .filter(|item| announced.contains(&item.key()) && !seen.contains(&item.key()))
            .collect();
        if !items.is_empty() {
            debug!("Keeping {} announced row(s) missing from the fetch", items.len());
        }
        items.extend(fetched);
        self.items = items;
        self.hydrated = true;
    }

    /// Applies an insert notification. A row already present is replaced in
    /// place; a new row goes to the front.
    pub fn apply_insert(&mut self, item: T) {
        let key = item.key();
        self.announced.insert(key);
        match self.items.iter().position(|existing| existing.key() == key) {
            Some(index) => {
                debug!("Insert for {} already listed, replacing in place", key);
                self.items[index] = item;
            }
            None => self.items.insert(0, item),
        }
    }
}

/// In-memory catalog lists served by the public listing endpoints.
#[derive(Default)]
pub struct CatalogCache {
    pub events: RwLock<LiveList<Event>>,
    pub internships: RwLock<LiveList<Internship>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }
}
