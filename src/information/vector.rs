//! Ordered lists of information containers.

use std::ops::{Index, IndexMut};

use super::Information;

/// One [`Information`] per port or per connection, in port order.
#[derive(Debug, Clone, Default)]
pub struct InformationVector {
    items: Vec<Information>,
}

impl InformationVector {
    /// Create a vector of `len` empty containers.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { items: vec![Information::new(); len] }
    }

    /// Container at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Information> {
        self.items.get(index)
    }

    /// Mutable container at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Information> {
        self.items.get_mut(index)
    }

    /// Number of containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no containers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a container.
    pub fn push(&mut self, info: Information) {
        self.items.push(info);
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Information> {
        self.items.iter()
    }

    /// Iterate mutably in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Information> {
        self.items.iter_mut()
    }
}

impl Index<usize> for InformationVector {
    type Output = Information;

    fn index(&self, index: usize) -> &Information {
        &self.items[index]
    }
}

impl IndexMut<usize> for InformationVector {
    fn index_mut(&mut self, index: usize) -> &mut Information {
        &mut self.items[index]
    }
}

impl FromIterator<Information> for InformationVector {
    fn from_iter<I: IntoIterator<Item = Information>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a InformationVector {
    type Item = &'a Information;
    type IntoIter = std::slice::Iter<'a, Information>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
