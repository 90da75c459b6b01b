use std::collections::VecDeque;

/// FIFO of groups where each group binds a key at most once.
///
/// `put` places a value into the first group that has no value for its key
/// yet, opening a new group at the back when every group already has one.
/// Two values for the same key therefore never share a group, and draining
/// groups front to back applies them in the order they were put.
#[derive(Debug)]
pub struct ValueGroups<K, V> {
    groups: VecDeque<Vec<(K, V)>>,
}

impl<K, V> Default for ValueGroups<K, V> {
    fn default() -> Self {
        ValueGroups {
            groups: VecDeque::new(),
        }
    }
}

impl<K: PartialEq, V> ValueGroups<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `value` and return the index of the group it landed in.
    pub fn put(&mut self, key: K, value: V) -> usize {
        let free = self
            .groups
            .iter()
            .position(|group| group.iter().all(|(bound, _)| *bound != key));

        match free {
            Some(index) => {
                self.groups[index].push((key, value));
                index
            }
            None => {
                self.groups.push_back(vec![(key, value)]);
                self.groups.len() - 1
            }
        }
    }

    /// The most recently queued value for `key`.
    pub fn latest_mut(&mut self, key: &K) -> Option<&mut V> {
        self.groups
            .iter_mut()
            .rev()
            .find_map(|group| group.iter_mut().find(|(bound, _)| bound == key))
            .map(|(_, value)| value)
    }

    /// Remove and return the oldest group.
    pub fn poll(&mut self) -> Option<Vec<(K, V)>> {
        self.groups.pop_front()
    }

    /// Number of queued groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of queued values across all groups.
    pub fn pending(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}
