//! Bounded top-n selector.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Selector construction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError(usize);

impl CapacityError {
    /// Returns the rejected capacity.
    pub fn capacity(&self) -> usize {
        self.0
    }
}

impl Error for CapacityError {}

impl Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "selector capacity must be at least 1 (got {})", self.0)
    }
}

/// Outcome of [`TopSelector::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Added<T> {
    /// The selector was not full, the element was retained without eviction.
    Retained,
    /// The element was retained and the returned former minimum was evicted.
    Evicted(T),
    /// The element ranks at or below the current minimum and was not retained.
    Rejected(T),
}

impl<T> Added<T> {
    /// Returns the element that left the selector, if any.
    pub fn into_inner(self) -> Option<T> {
        match self {
            Added::Retained => None,
            Added::Evicted(item) | Added::Rejected(item) => Some(item),
        }
    }
}

/// Fixed capacity selector retaining the highest ranked elements of a stream.
///
/// Elements are kept in an array backed binary min-heap so the lowest ranked retained element
/// is always at the root and can be compared against incoming elements in constant time.
/// Add and pop cost *O*(log *capacity*), memory never exceeds *capacity* elements.
///
/// Equal elements are not ordered in any particular way.
///
/// # Example
///
/// ```
/// use ext_line_sort::TopSelector;
///
/// let mut top = TopSelector::new(3).unwrap();
/// top.extend(vec![5, 1, 9, 3, 7]);
///
/// assert_eq!(top.peek(), Some(&5));
/// assert_eq!(top.pop_all(), vec![9, 7, 5]);
/// ```
pub struct TopSelector<T, F = fn(&T, &T) -> Ordering>
where
    F: Fn(&T, &T) -> Ordering,
{
    heap: Vec<T>,
    capacity: usize,
    compare: F,
}

impl<T: Ord> TopSelector<T> {
    /// Creates a selector ranking elements by their natural order.
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        TopSelector::new_by(capacity, T::cmp)
    }
}

impl<T, F> TopSelector<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates a selector ranking elements using a custom compare function.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of retained elements, must be at least 1
    /// * `compare` - Function to be used to compare elements, greater elements rank higher
    pub fn new_by(capacity: usize, compare: F) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError(capacity));
        }

        return Ok(TopSelector {
            heap: Vec::with_capacity(capacity),
            capacity,
            compare,
        });
    }

    /// Offers an element to the selector.
    pub fn add(&mut self, item: T) -> Added<T> {
        if self.heap.len() < self.capacity {
            self.heap.push(item);
            self.sift_up(self.heap.len() - 1);
            return Added::Retained;
        }

        if (self.compare)(&item, &self.heap[0]) != Ordering::Greater {
            return Added::Rejected(item);
        }

        let evicted = std::mem::replace(&mut self.heap[0], item);
        self.sift_down(0);

        return Added::Evicted(evicted);
    }

    /// Returns the lowest ranked retained element.
    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    /// Removes and returns the lowest ranked retained element.
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }

        let item = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        return Some(item);
    }

    /// Removes all retained elements returning them highest ranked first.
    pub fn pop_all(&mut self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.heap.len());
        while let Some(item) = self.pop() {
            result.push(item);
        }
        result.reverse();

        return result;
    }

    /// Drops all retained elements keeping the allocated storage.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Checks if the next admitted element evicts another one.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns an iterator over the retained elements in arbitrary order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if (self.compare)(&self.heap[pos], &self.heap[parent]) != Ordering::Less {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let child = if right < len && (self.compare)(&self.heap[right], &self.heap[left]) == Ordering::Less {
                right
            } else {
                left
            };

            if (self.compare)(&self.heap[child], &self.heap[pos]) != Ordering::Less {
                break;
            }
            self.heap.swap(pos, child);
            pos = child;
        }
    }
}

impl<T, F> Extend<T> for TopSelector<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}
