//! Typed indices into the IR's storage.
//!
//! Everything the DXIL model keeps about the IR is a [Handle] into one of these arenas,
//! so a [crate::dxil::DxilModule] never owns IR objects and must not outlive the
//! [crate::ir::Module] its handles were created from.

use std::{
    collections::HashMap,
    fmt,
    hash::{self, Hash},
    marker::PhantomData,
    ops::{Index, IndexMut},
};

/// A strongly typed reference to an arena item.
pub struct Handle<T> {
    index: u32,
    marker: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> hash::Hash for Handle<T> {
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        self.index.hash(hasher)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.index)
    }
}

impl<T> Handle<T> {
    fn from_usize(index: usize) -> Self {
        let index = u32::try_from(index).expect("arena overflowed u32 handles");
        Handle {
            index,
            marker: PhantomData,
        }
    }

    /// Returns the index of this handle.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// An append-only vector addressed by [Handle]s.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, value: T) -> Handle<T> {
        let handle = Handle::from_usize(self.data.len());
        self.data.push(value);
        handle
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::from_usize(i), v))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;
    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.data[handle.index()]
    }
}

/// An arena whose items are interned: inserting an equal item twice yields the same handle.
#[derive(Debug, Clone)]
pub struct UniqueArena<T: Eq + Hash + Clone> {
    data: Vec<T>,
    lookup: HashMap<T, Handle<T>>,
}

impl<T: Eq + Hash + Clone> Default for UniqueArena<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> UniqueArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        if let Some(handle) = self.lookup.get(&value) {
            return *handle;
        }
        let handle = Handle::from_usize(self.data.len());
        self.data.push(value.clone());
        self.lookup.insert(value, handle);
        handle
    }

    pub fn get(&self, value: &T) -> Option<Handle<T>> {
        self.lookup.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::from_usize(i), v))
    }
}

impl<T: Eq + Hash + Clone> Index<Handle<T>> for UniqueArena<T> {
    type Output = T;
    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_arena_interns() {
        let mut arena = UniqueArena::new();
        let a = arena.insert("float".to_owned());
        let b = arena.insert("double".to_owned());
        let c = arena.insert("float".to_owned());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
    }
}
