//! Bounded two-way merger.

use std::cmp::Ordering;
use std::collections::VecDeque;

/// In-memory read window over a sorted source.
struct Window<T, I> {
    items: VecDeque<T>,
    source: I,
    limit: usize,
    exhausted: bool,
}

impl<T, E, I> Window<T, I>
where
    I: Iterator<Item = Result<T, E>>,
{
    fn new(source: I, limit: usize) -> Self {
        Window {
            items: VecDeque::with_capacity(limit),
            source,
            limit,
            exhausted: false,
        }
    }

    /// Refills the window from the source if the window is empty.
    fn refill(&mut self) -> Result<(), E> {
        if !self.items.is_empty() || self.exhausted {
            return Ok(());
        }

        while self.items.len() < self.limit {
            match self.source.next() {
                Some(Ok(item)) => self.items.push_back(item),
                Some(Err(err)) => {
                    self.exhausted = true;
                    return Err(err);
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        return Ok(());
    }
}

/// Windowed two-way merger.
/// Merges two sorted inputs into a single sorted output holding at most `window_size` items of
/// each input in memory. Each window is refilled from its input only once it is drained.
///
/// On equal items the left input goes first. Once one input is exhausted the remaining items of the
/// other one are passed through without comparison.
pub struct WindowedMerger<T, A, B, F> {
    left: Window<T, A>,
    right: Window<T, B>,
    compare: F,
}

impl<T, E, A, B, F> WindowedMerger<T, A, B, F>
where
    A: Iterator<Item = Result<T, E>>,
    B: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an instance of a windowed merger.
    /// Inputs should be sorted according to `compare` otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `left` - First sorted input
    /// * `right` - Second sorted input
    /// * `window_size` - Maximum number of items buffered per input, values below 1 are treated as 1
    /// * `compare` - Function to be used to compare items
    pub fn new_by<L, R>(left: L, right: R, window_size: usize, compare: F) -> Self
    where
        L: IntoIterator<Item = Result<T, E>, IntoIter = A>,
        R: IntoIterator<Item = Result<T, E>, IntoIter = B>,
    {
        let window_size = window_size.max(1);

        return WindowedMerger {
            left: Window::new(left.into_iter(), window_size),
            right: Window::new(right.into_iter(), window_size),
            compare,
        };
    }
}

impl<T, E, A, B> WindowedMerger<T, A, B, fn(&T, &T) -> Ordering>
where
    T: Ord,
    A: Iterator<Item = Result<T, E>>,
    B: Iterator<Item = Result<T, E>>,
{
    /// Creates an instance of a windowed merger using natural items order.
    pub fn new<L, R>(left: L, right: R, window_size: usize) -> Self
    where
        L: IntoIterator<Item = Result<T, E>, IntoIter = A>,
        R: IntoIterator<Item = Result<T, E>, IntoIter = B>,
    {
        WindowedMerger::new_by(left, right, window_size, T::cmp)
    }
}

impl<T, E, A, B, F> Iterator for WindowedMerger<T, A, B, F>
where
    A: Iterator<Item = Result<T, E>>,
    B: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.left.refill() {
            return Some(Err(err));
        }
        if let Err(err) = self.right.refill() {
            return Some(Err(err));
        }

        let take_right = match (self.left.items.front(), self.right.items.front()) {
            (Some(left), Some(right)) => (self.compare)(right, left) == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => return None,
        };

        let item = if take_right {
            self.right.items.pop_front()
        } else {
            self.left.items.pop_front()
        };

        return item.map(Ok);
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::io::{self, ErrorKind};
    use std::rc::Rc;

    use proptest::prelude::*;
    use rstest::*;

    use super::WindowedMerger;

    fn ok(items: Vec<i32>) -> Vec<Result<i32, io::Error>> {
        Vec::from_iter(items.into_iter().map(Ok))
    }

    #[rstest]
    #[case(vec![], vec![], vec![])]
    #[case(vec![1, 2, 3], vec![], vec![1, 2, 3])]
    #[case(vec![], vec![1, 2, 3], vec![1, 2, 3])]
    #[case(vec![1, 3, 5, 7], vec![2, 4, 6], vec![1, 2, 3, 4, 5, 6, 7])]
    #[case(vec![1, 1, 2], vec![1, 2, 2], vec![1, 1, 1, 2, 2, 2])]
    #[case(vec![5, 6], vec![1, 2, 3, 4], vec![1, 2, 3, 4, 5, 6])]
    fn test_merger(
        #[case] left: Vec<i32>,
        #[case] right: Vec<i32>,
        #[case] expected: Vec<i32>,
        #[values(1, 2, 100)] window_size: usize,
    ) {
        let merger = WindowedMerger::new(ok(left), ok(right), window_size);
        let actual: Result<Vec<i32>, io::Error> = merger.collect();

        assert_eq!(actual.unwrap(), expected);
    }

    #[test]
    fn test_left_wins_ties() {
        let left = vec![Ok::<_, io::Error>((1, 'l')), Ok((2, 'l'))];
        let right = vec![Ok((1, 'r')), Ok((2, 'r'))];

        let merger = WindowedMerger::new_by(left, right, 1, |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0));
        let actual: Result<Vec<_>, _> = merger.collect();

        assert_eq!(actual.unwrap(), vec![(1, 'l'), (1, 'r'), (2, 'l'), (2, 'r')]);
    }

    #[test]
    fn test_reversed_order() {
        let merger = WindowedMerger::new_by(ok(vec![9, 5, 1]), ok(vec![8, 2]), 2, |a: &i32, b: &i32| b.cmp(a));
        let actual: Result<Vec<i32>, _> = merger.collect();

        assert_eq!(actual.unwrap(), vec![9, 8, 5, 2, 1]);
    }

    #[test]
    fn test_window_bound() {
        let pulled = Rc::new(Cell::new(0));
        let counter = pulled.clone();
        let left = (0..20).map(move |i| {
            counter.set(counter.get() + 1);
            Ok::<_, io::Error>(i * 2)
        });
        let right = ok(Vec::from_iter((0..20).map(|i| i * 2 + 1)));

        let mut merger = WindowedMerger::new(left, right, 4);
        merger.next();
        assert_eq!(pulled.get(), 4);

        let rest: Result<Vec<i32>, _> = merger.collect();
        assert_eq!(rest.unwrap(), Vec::from_iter(1..40));
        assert_eq!(pulled.get(), 20);
    }

    #[test]
    fn test_source_error() {
        let left = vec![Ok(1), Err(io::Error::new(ErrorKind::Other, "test error"))];
        let right = ok(vec![0, 5]);

        let mut merger = WindowedMerger::new(left, right, 1);
        assert_eq!(merger.next().unwrap().unwrap(), 0);
        assert_eq!(merger.next().unwrap().unwrap(), 1);
        let err = merger.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "test error");
    }

    proptest! {
        #[test]
        fn test_merged_sorted(
            mut left in prop::collection::vec(any::<i16>(), 0..100),
            mut right in prop::collection::vec(any::<i16>(), 0..100),
            window_size in 1usize..10,
        ) {
            left.sort();
            right.sort();
            let mut expected = [left.clone(), right.clone()].concat();
            expected.sort();

            let left = Vec::from_iter(left.into_iter().map(Ok::<_, io::Error>));
            let right = Vec::from_iter(right.into_iter().map(Ok::<_, io::Error>));
            let actual: Result<Vec<i16>, _> = WindowedMerger::new(left, right, window_size).collect();

            prop_assert_eq!(actual.unwrap(), expected);
        }
    }
}
