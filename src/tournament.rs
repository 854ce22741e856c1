//! Loser tree k-way merger.
//!
//! The merger keeps one head item per source and a complete binary tree of `k - 1` internal nodes.
//! Leaf `i` (the head of source `i`) is located at virtual position `k + i`, the parent of position
//! `p` is `p / 2` and the root is position 1. Every internal node stores the index of the source that
//! lost the match played at that node, the overall winner is kept aside as the champion.
//!
//! When the champion's source advances only the matches on the path from its leaf to the root are
//! replayed: the new head is compared with the stored loser of each node on the way up, so every
//! emitted item costs at most ⌈log2 *k*⌉ comparisons.

use std::cmp::Ordering;

/// Tournament (loser tree) merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*k*) in worst case where *m* is the number of items,
/// *k* is the number of inputs.
///
/// Equal items are emitted in the order of their input indices.
///
/// # Example
///
/// ```
/// use std::io;
/// use ext_line_sort::TournamentMerger;
///
/// let sources = vec![vec![1, 4, 7], vec![2, 5], vec![3, 6, 8, 9]];
/// let sources = sources.into_iter().map(|s| s.into_iter().map(Ok::<_, io::Error>));
///
/// let merged: Result<Vec<i32>, _> = TournamentMerger::new(sources).collect();
/// assert_eq!(merged.unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
/// ```
pub struct TournamentMerger<T, E, I, F = fn(&T, &T) -> Ordering>
where
    I: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    sources: Vec<I>,
    // `None` marks an exhausted source, it loses every match
    heads: Vec<Option<T>>,
    // internal nodes, index 0 is unused
    losers: Vec<usize>,
    champion: usize,
    // error reported by a source, returned by the next pop
    pending: Option<E>,
    initiated: bool,
    compare: F,
}

impl<T, E, I> TournamentMerger<T, E, I>
where
    T: Ord,
    I: Iterator<Item = Result<T, E>>,
{
    /// Creates a tournament merger using natural items order.
    pub fn new<S>(sources: S) -> Self
    where
        S: IntoIterator,
        S::Item: IntoIterator<Item = Result<T, E>, IntoIter = I>,
    {
        TournamentMerger::new_by(sources, T::cmp)
    }
}

impl<T, E, I, F> TournamentMerger<T, E, I, F>
where
    I: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates a tournament merger over the sources using a custom compare function.
    /// Source items should be sorted according to `compare` otherwise the result is undefined.
    ///
    /// Sources are not read until the first item is requested.
    ///
    /// # Arguments
    /// * `sources` - Sorted inputs to be merged
    /// * `compare` - Function to be used to compare items
    pub fn new_by<S>(sources: S, compare: F) -> Self
    where
        S: IntoIterator,
        S::Item: IntoIterator<Item = Result<T, E>, IntoIter = I>,
    {
        let sources = Vec::from_iter(sources.into_iter().map(|s| s.into_iter()));
        let k = sources.len();

        return TournamentMerger {
            sources,
            heads: Vec::with_capacity(k),
            losers: vec![0; k],
            champion: 0,
            pending: None,
            initiated: false,
            compare,
        };
    }

    /// Returns the number of merged sources.
    pub fn sources_count(&self) -> usize {
        self.sources.len()
    }

    /// Returns the next item in ascending order or `None` when all sources are exhausted.
    pub fn pop(&mut self) -> Option<Result<T, E>> {
        if !self.initiated {
            self.build();
            self.initiated = true;
        }

        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }

        if self.sources.is_empty() {
            return None;
        }

        let champion = self.champion;
        let item = self.heads[champion].take()?;

        self.advance(champion);
        self.replay(champion);

        return Some(Ok(item));
    }

    /// Reads the source heads and plays the initial tournament.
    fn build(&mut self) {
        for idx in 0..self.sources.len() {
            self.heads.push(None);
            self.advance(idx);
        }

        let k = self.sources.len();
        if k == 0 {
            return;
        }

        // winners of the matches played at each internal node
        let mut winners = vec![0; k];
        for node in (1..k).rev() {
            let left = self.player(&winners, 2 * node);
            let right = self.player(&winners, 2 * node + 1);

            let (winner, loser) = if self.beats(right, left) {
                (right, left)
            } else {
                (left, right)
            };
            winners[node] = winner;
            self.losers[node] = loser;
        }

        self.champion = if k == 1 { 0 } else { winners[1] };
    }

    /// Returns the source index occupying tree position `pos`.
    fn player(&self, winners: &[usize], pos: usize) -> usize {
        let k = self.sources.len();
        if pos >= k {
            pos - k
        } else {
            winners[pos]
        }
    }

    /// Replays the matches on the path from the leaf of `source` to the root.
    fn replay(&mut self, source: usize) {
        let k = self.sources.len();
        let mut winner = source;
        let mut node = (k + source) / 2;

        while node > 0 {
            let loser = self.losers[node];
            if self.beats(loser, winner) {
                self.losers[node] = winner;
                winner = loser;
            }
            node /= 2;
        }

        self.champion = winner;
    }

    /// Checks if the head of source `a` wins against the head of source `b`.
    fn beats(&self, a: usize, b: usize) -> bool {
        match (&self.heads[a], &self.heads[b]) {
            (Some(x), Some(y)) => match (self.compare)(x, y) {
                Ordering::Less => true,
                Ordering::Equal => a < b,
                Ordering::Greater => false,
            },
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn advance(&mut self, idx: usize) {
        self.heads[idx] = match self.sources[idx].next() {
            Some(Ok(item)) => Some(item),
            Some(Err(err)) => {
                // the failed source is treated as exhausted, only the first error is kept
                if self.pending.is_none() {
                    self.pending = Some(err);
                }
                None
            }
            None => None,
        };
    }
}

impl<T, E, I, F> Iterator for TournamentMerger<T, E, I, F>
where
    I: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, ErrorKind};

    use proptest::prelude::*;
    use rstest::*;

    use super::TournamentMerger;

    fn sources(items: Vec<Vec<i32>>) -> Vec<Vec<Result<i32, io::Error>>> {
        Vec::from_iter(items.into_iter().map(|s| Vec::from_iter(s.into_iter().map(Ok))))
    }

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec![vec![], vec![]], vec![])]
    #[case(vec![vec![3, 1, 2]], vec![3, 1, 2])]
    #[case(vec![vec![1, 4, 7], vec![2, 5], vec![3, 6, 8, 9]], vec![1, 2, 3, 4, 5, 6, 7, 8, 9])]
    #[case(vec![vec![4, 5, 7], vec![1, 6], vec![3], vec![]], vec![1, 3, 4, 5, 6, 7])]
    #[case(vec![vec![], vec![2], vec![], vec![1], vec![]], vec![1, 2])]
    #[case(vec![vec![1, 2, 3], vec![4, 5, 6]], vec![1, 2, 3, 4, 5, 6])]
    #[case(vec![vec![1, 1], vec![1], vec![0, 1]], vec![0, 1, 1, 1, 1])]
    fn test_merger(#[case] items: Vec<Vec<i32>>, #[case] expected: Vec<i32>) {
        let merger = TournamentMerger::new(sources(items));
        let actual: Result<Vec<i32>, io::Error> = merger.collect();

        assert_eq!(actual.unwrap(), expected);
    }

    #[test]
    fn test_exhausted_stays_exhausted() {
        let mut merger = TournamentMerger::new(sources(vec![vec![1]]));

        assert_eq!(merger.pop().unwrap().unwrap(), 1);
        assert!(merger.pop().is_none());
        assert!(merger.pop().is_none());
    }

    #[test]
    fn test_ties_by_source_index() {
        let items = vec![
            vec![(1, 0), (2, 0)],
            vec![(1, 1), (2, 1)],
            vec![(0, 2), (1, 2), (2, 2)],
        ];
        let items = items.into_iter().map(|s| s.into_iter().map(Ok::<_, io::Error>));

        let merger = TournamentMerger::new_by(items, |a: &(i32, usize), b: &(i32, usize)| a.0.cmp(&b.0));
        let actual: Result<Vec<_>, _> = merger.collect();

        assert_eq!(
            actual.unwrap(),
            vec![(0, 2), (1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]
        );
    }

    #[test]
    fn test_descending() {
        let items = vec![vec![9, 3], vec![8, 7, 1], vec![5]];
        let merger = TournamentMerger::new_by(sources(items), |a: &i32, b: &i32| b.cmp(a));
        let actual: Result<Vec<i32>, _> = merger.collect();

        assert_eq!(actual.unwrap(), vec![9, 8, 7, 5, 3, 1]);
    }

    #[test]
    fn test_source_error() {
        let items = vec![
            vec![Ok(1), Err(io::Error::new(ErrorKind::Other, "test error")), Ok(10)],
            vec![Ok(2), Ok(3)],
        ];

        let actual = Vec::from_iter(TournamentMerger::new(items));
        let actual = Vec::from_iter(actual.into_iter().map(|r| r.map_err(|e| e.to_string())));

        assert_eq!(
            actual,
            vec![Ok(1), Err("test error".to_string()), Ok(2), Ok(3)]
        );
    }

    #[test]
    fn test_initial_error() {
        let items = vec![
            vec![Ok(5)],
            vec![Err(io::Error::new(ErrorKind::Other, "broken source"))],
        ];

        let mut merger = TournamentMerger::new(items);
        assert_eq!(merger.pop().unwrap().unwrap_err().to_string(), "broken source");
        assert_eq!(merger.pop().unwrap().unwrap(), 5);
        assert!(merger.pop().is_none());
    }

    proptest! {
        #[test]
        fn test_merged_sorted(items in prop::collection::vec(prop::collection::vec(any::<i16>(), 0..30), 0..12)) {
            let mut items = items;
            items.iter_mut().for_each(|s| s.sort());

            let mut expected = items.concat();
            expected.sort();

            let count = items.len();
            let sources = items.into_iter().map(|s| s.into_iter().map(Ok::<_, io::Error>));
            let merger = TournamentMerger::new(sources);
            prop_assert_eq!(merger.sources_count(), count);

            let actual: Result<Vec<i16>, _> = merger.collect();
            prop_assert_eq!(actual.unwrap(), expected);
        }
    }
}
