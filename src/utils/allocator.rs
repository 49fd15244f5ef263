use serde::{Deserialize, Serialize};

/// Stable handle into a [`BodyTable`].
///
/// The index addresses a dense slot; the generation is the table epoch at the
/// time of registration, so handles kept across a reinitialization are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct BodyHandle {
    pub index: u32,
    pub generation: u32,
}

impl BodyHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Dense table that hands out stable indices at registration time.
///
/// Bodies are never removed one at a time; [`BodyTable::clear`] drops the
/// whole set and advances the epoch.
pub struct BodyTable<T> {
    items: Vec<T>,
    generation: u32,
}

impl<T> Default for BodyTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BodyTable<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> BodyHandle {
        let index = self.items.len() as u32;
        self.items.push(item);
        BodyHandle::new(index, self.generation)
    }

    /// Handle the next [`BodyTable::insert`] will return.
    pub fn next_handle(&self) -> BodyHandle {
        BodyHandle::new(self.items.len() as u32, self.generation)
    }

    /// Removes every entry and invalidates all outstanding handles.
    pub fn clear(&mut self) {
        self.items.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        handle.generation == self.generation && handle.index() < self.items.len()
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&T> {
        if self.contains(handle) {
            self.items.get(handle.index())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut T> {
        if self.contains(handle) {
            self.items.get_mut(handle.index())
        } else {
            None
        }
    }

    pub fn handle_at(&self, index: usize) -> Option<BodyHandle> {
        (index < self.items.len()).then(|| BodyHandle::new(index as u32, self.generation))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Dense view in handle-index order.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
