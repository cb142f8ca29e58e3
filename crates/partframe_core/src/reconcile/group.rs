//! Ordered key list with explicit sync state.

/// Whether local order matches the last persisted order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Local order equals the last known persisted order.
    #[default]
    Settled,
    /// A manual reorder was applied locally and not yet persisted.
    Dirty,
}

/// Ordered set of keys for one sortable collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedGroup<K> {
    keys: Vec<K>,
    state: SyncState,
}

impl<K> Default for OrderedGroup<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            state: SyncState::Settled,
        }
    }
}

impl<K: Copy + PartialEq> OrderedGroup<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a settled group from already-ordered keys.
    pub fn from_keys(keys: impl IntoIterator<Item = K>) -> Self {
        let mut group = Self::new();
        for key in keys {
            group.push(key);
        }
        group
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: K) -> bool {
        self.keys.contains(&key)
    }

    pub fn position(&self, key: K) -> Option<usize> {
        self.keys.iter().position(|current| *current == key)
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == SyncState::Dirty
    }

    /// Appends a key if absent. Returns whether it was added.
    pub fn push(&mut self, key: K) -> bool {
        if self.contains(key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Removes a key. Returns whether it was present.
    pub fn remove(&mut self, key: K) -> bool {
        match self.position(key) {
            Some(index) => {
                self.keys.remove(index);
                true
            }
            None => false,
        }
    }

    /// Applies a manual order and marks the group dirty.
    ///
    /// Listed keys that belong to the group come first, in the given
    /// order. Unlisted keys follow in their current order. Unknown and
    /// repeated keys are ignored. Returns the resulting order.
    pub fn stage_order(&mut self, ordered: &[K]) -> Vec<K> {
        let mut next: Vec<K> = Vec::with_capacity(self.keys.len());
        for key in ordered {
            if self.contains(*key) && !next.contains(key) {
                next.push(*key);
            }
        }
        for key in &self.keys {
            if !next.contains(key) {
                next.push(*key);
            }
        }
        self.keys = next;
        self.state = SyncState::Dirty;
        self.keys.clone()
    }

    /// Drag-style move: takes `active` out and reinserts it at the index
    /// `over` occupied. Marks the group dirty when anything moved.
    pub fn move_to(&mut self, active: K, over: K) -> bool {
        let (Some(from), Some(to)) = (self.position(active), self.position(over)) else {
            return false;
        };
        if from == to {
            return false;
        }
        let key = self.keys.remove(from);
        self.keys.insert(to, key);
        self.state = SyncState::Dirty;
        true
    }

    /// Marks the current order as persisted.
    pub fn mark_settled(&mut self) {
        self.state = SyncState::Settled;
    }

    /// Stable sort by a derived rank.
    pub fn sort_by_rank<R: Ord>(&mut self, rank: impl Fn(K) -> R) {
        self.keys.sort_by_key(|key| rank(*key));
    }
}
