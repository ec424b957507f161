//! Index-stable storage with an intrusive free list.
//!
//! [`Slab`] hands out small integer keys that stay valid until removed.
//! Vacant slots form a singly linked list threaded through the entries, so
//! both [`Slab::insert`] and [`Slab::remove`] are O(1) and a removed key is
//! the next one handed out again.

/// One slot of a [`Slab`].
#[derive(Debug)]
enum Entry<T> {
    Occupied(T),
    /// Index of the next vacant slot; `entries.len()` ends the list.
    Vacant(usize),
}

/// A vector of values addressed by stable `usize` keys.
#[derive(Debug)]
pub(crate) struct Slab<T> {
    entries: Vec<Entry<T>>,
    next_free: usize,
    len: usize,
}

impl<T> Slab<T> {
    /// Create an empty slab. Usable in `static` initializers.
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_free: 0,
            len: 0,
        }
    }

    /// Store `value` and return its key.
    ///
    /// Reuses the most recently freed slot, otherwise appends a new one.
    pub(crate) fn insert(&mut self, value: T) -> usize {
        let key = self.next_free;
        if key == self.entries.len() {
            self.entries.push(Entry::Occupied(value));
            self.next_free = self.entries.len();
        } else {
            match std::mem::replace(&mut self.entries[key], Entry::Occupied(value)) {
                Entry::Vacant(next) => self.next_free = next,
                Entry::Occupied(_) => unreachable!("free list points at an occupied slot"),
            }
        }
        self.len += 1;
        key
    }

    /// Get the value stored under `key`.
    pub(crate) fn get(&self, key: usize) -> Option<&T> {
        match self.entries.get(key) {
            Some(Entry::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Remove and return the value stored under `key`, freeing the key.
    ///
    /// Returns `None` and leaves the slab untouched if `key` is vacant.
    pub(crate) fn remove(&mut self, key: usize) -> Option<T> {
        let slot = self.entries.get_mut(key)?;
        match std::mem::replace(slot, Entry::Vacant(self.next_free)) {
            Entry::Occupied(value) => {
                self.next_free = key;
                self.len -= 1;
                Some(value)
            }
            vacant @ Entry::Vacant(_) => {
                *slot = vacant;
                None
            }
        }
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
