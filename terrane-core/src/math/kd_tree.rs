use num_traits::Float;

/// Number of entries a leaf holds before it is split
const BUCKET_SIZE: usize = 24;

/// A neighbor returned by a k-d tree query
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<S: Float, V> {
    /// The payload stored with the matching key
    pub value: V,
    /// Squared euclidean distance between the query key and the matching key
    pub squared_distance: S,
}

/// Bucketed 2-D k-d tree over floating point keys.
///
/// Leaves hold up to [BUCKET_SIZE] entries and split at the midpoint of their widest axis once
/// full. Keys must not contain NaN. Duplicate keys are allowed; a leaf whose keys are all
/// identical grows past the bucket size instead of splitting, so degenerate inputs cannot
/// recurse forever.
///
/// # Example
/// ```
/// use terrane_core::math::KdTree;
///
/// let mut tree = KdTree::new();
/// tree.insert([0.0f64, 0.0], "origin");
/// tree.insert([3.0, 4.0], "far");
/// let nearest = tree.nearest_neighbors(&[1.0, 1.0], 1);
/// assert_eq!(nearest[0].value, "origin");
/// ```
pub struct KdTree<S: Float, V: Clone> {
    root: Node<S, V>,
    size: usize,
}

struct Node<S: Float, V: Clone> {
    // region covered by the entries below this node, tracked during insertion
    bound_min: [S; 2],
    bound_max: [S; 2],
    kind: NodeKind<S, V>,
}

enum NodeKind<S: Float, V: Clone> {
    Leaf {
        keys: Vec<[S; 2]>,
        values: Vec<V>,
    },
    Stem {
        split_dim: usize,
        split_value: S,
        left: Box<Node<S, V>>,
        right: Box<Node<S, V>>,
    },
}

impl<S: Float, V: Clone> KdTree<S, V> {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self {
            root: Node::new_leaf(),
            size: 0,
        }
    }

    /// Returns the number of entries in the tree
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true if the tree holds no entries
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Inserts `value` under the given key
    pub fn insert(&mut self, key: [S; 2], value: V) {
        self.root.insert(key, value);
        self.size += 1;
    }

    /// Returns up to `count` entries closest to `key`, sorted by ascending squared distance.
    /// Returns fewer entries if the tree holds fewer than `count`.
    pub fn nearest_neighbors(&self, key: &[S; 2], count: usize) -> Vec<Neighbor<S, V>> {
        if count == 0 || self.size == 0 {
            return Vec::new();
        }
        let mut heap = ResultHeap::new(count);
        self.root.search_nearest(key, &mut heap);
        heap.into_sorted()
    }

    /// Returns all entries within the given (linear) radius of `key`, in no particular order
    pub fn neighbors_within_range(&self, key: &[S; 2], radius: S) -> Vec<Neighbor<S, V>> {
        let mut results = Vec::new();
        if self.size > 0 {
            self.root
                .search_range(key, radius * radius, &mut results);
        }
        results
    }
}

impl<S: Float, V: Clone> Default for KdTree<S, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Float, V: Clone> Node<S, V> {
    fn new_leaf() -> Self {
        Self {
            bound_min: [S::infinity(); 2],
            bound_max: [S::neg_infinity(); 2],
            kind: NodeKind::Leaf {
                keys: Vec::new(),
                values: Vec::new(),
            },
        }
    }

    fn extend_bounds(&mut self, key: &[S; 2]) {
        for dim in 0..2 {
            if key[dim] < self.bound_min[dim] {
                self.bound_min[dim] = key[dim];
            }
            if key[dim] > self.bound_max[dim] {
                self.bound_max[dim] = key[dim];
            }
        }
    }

    fn insert(&mut self, key: [S; 2], value: V) {
        self.extend_bounds(&key);
        match &mut self.kind {
            NodeKind::Stem {
                split_dim,
                split_value,
                left,
                right,
            } => {
                if key[*split_dim] > *split_value {
                    right.insert(key, value);
                } else {
                    left.insert(key, value);
                }
            }
            NodeKind::Leaf { keys, values } => {
                keys.push(key);
                values.push(value);
                if keys.len() > BUCKET_SIZE {
                    self.try_split();
                }
            }
        }
    }

    /// Splits a full leaf at the midpoint of its widest axis. A leaf whose keys are all
    /// identical is left as an oversized bucket.
    fn try_split(&mut self) {
        let width_x = self.bound_max[0] - self.bound_min[0];
        let width_y = self.bound_max[1] - self.bound_min[1];
        if width_x <= S::zero() && width_y <= S::zero() {
            return;
        }
        let split_dim = if width_x > width_y { 0 } else { 1 };
        let two = S::one() + S::one();
        let mut split_value = (self.bound_min[split_dim] + self.bound_max[split_dim]) / two;
        // midpoint can round onto the upper bound for adjacent floats
        if split_value >= self.bound_max[split_dim] {
            split_value = self.bound_min[split_dim];
        }

        let (keys, values) = match &mut self.kind {
            NodeKind::Leaf { keys, values } => {
                (std::mem::take(keys), std::mem::take(values))
            }
            NodeKind::Stem { .. } => unreachable!("try_split is only called on leaves"),
        };

        let mut left = Node::new_leaf();
        let mut right = Node::new_leaf();
        for (key, value) in keys.into_iter().zip(values) {
            if key[split_dim] > split_value {
                right.insert(key, value);
            } else {
                left.insert(key, value);
            }
        }
        self.kind = NodeKind::Stem {
            split_dim,
            split_value,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    /// Smallest squared distance between `key` and any point of this node's region
    fn region_squared_distance(&self, key: &[S; 2]) -> S {
        let mut dist = S::zero();
        for dim in 0..2 {
            let d = if key[dim] < self.bound_min[dim] {
                self.bound_min[dim] - key[dim]
            } else if key[dim] > self.bound_max[dim] {
                key[dim] - self.bound_max[dim]
            } else {
                S::zero()
            };
            dist = dist + d * d;
        }
        dist
    }

    fn search_nearest(&self, key: &[S; 2], heap: &mut ResultHeap<S, V>) {
        match &self.kind {
            NodeKind::Leaf { keys, values } => {
                for (k, v) in keys.iter().zip(values) {
                    let dist = squared_distance(k, key);
                    heap.offer(dist, v);
                }
            }
            NodeKind::Stem {
                split_dim,
                split_value,
                left,
                right,
            } => {
                // descend the side containing the query first, then the far side only if its
                // region could still beat the current worst result
                let (near, far) = if key[*split_dim] > *split_value {
                    (right, left)
                } else {
                    (left, right)
                };
                near.search_nearest(key, heap);
                if !heap.is_full() || far.region_squared_distance(key) < heap.worst() {
                    far.search_nearest(key, heap);
                }
            }
        }
    }

    fn search_range(&self, key: &[S; 2], squared_radius: S, results: &mut Vec<Neighbor<S, V>>) {
        if self.region_squared_distance(key) > squared_radius {
            return;
        }
        match &self.kind {
            NodeKind::Leaf { keys, values } => {
                for (k, v) in keys.iter().zip(values) {
                    let dist = squared_distance(k, key);
                    if dist <= squared_radius {
                        results.push(Neighbor {
                            value: v.clone(),
                            squared_distance: dist,
                        });
                    }
                }
            }
            NodeKind::Stem { left, right, .. } => {
                left.search_range(key, squared_radius, results);
                right.search_range(key, squared_radius, results);
            }
        }
    }
}

fn squared_distance<S: Float>(a: &[S; 2], b: &[S; 2]) -> S {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Bounded max-heap over squared distances, used to keep the k best candidates during a
/// nearest-neighbor search. Distances must not be NaN.
struct ResultHeap<S: Float, V: Clone> {
    entries: Vec<Neighbor<S, V>>,
    capacity: usize,
}

impl<S: Float, V: Clone> ResultHeap<S, V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Squared distance of the worst entry currently held. Only valid when full.
    fn worst(&self) -> S {
        self.entries[0].squared_distance
    }

    fn offer(&mut self, squared_distance: S, value: &V) {
        if self.is_full() {
            if squared_distance >= self.worst() {
                return;
            }
            self.entries[0] = Neighbor {
                value: value.clone(),
                squared_distance,
            };
            self.sift_down();
        } else {
            self.entries.push(Neighbor {
                value: value.clone(),
                squared_distance,
            });
            self.sift_up();
        }
    }

    fn sift_up(&mut self) {
        let mut child = self.entries.len() - 1;
        while child > 0 {
            let parent = (child - 1) / 2;
            if self.entries[child].squared_distance <= self.entries[parent].squared_distance {
                break;
            }
            self.entries.swap(child, parent);
            child = parent;
        }
    }

    fn sift_down(&mut self) {
        let len = self.entries.len();
        let mut parent = 0;
        loop {
            let mut largest = parent;
            for child in [2 * parent + 1, 2 * parent + 2] {
                if child < len
                    && self.entries[child].squared_distance
                        > self.entries[largest].squared_distance
                {
                    largest = child;
                }
            }
            if largest == parent {
                break;
            }
            self.entries.swap(parent, largest);
            parent = largest;
        }
    }

    fn into_sorted(self) -> Vec<Neighbor<S, V>> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            a.squared_distance
                .partial_cmp(&b.squared_distance)
                .expect("distances must not be NaN")
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn random_points(count: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
        (0..count)
            .map(|_| [rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0)])
            .collect()
    }

    #[test]
    fn nearest_neighbors_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let points = random_points(500, &mut rng);
        let mut tree = KdTree::new();
        for (index, point) in points.iter().enumerate() {
            tree.insert(*point, index);
        }

        for _ in 0..50 {
            let query = [rng.gen_range(-120.0..120.0), rng.gen_range(-120.0..120.0)];
            let found = tree.nearest_neighbors(&query, 10);
            assert_eq!(found.len(), 10);

            let mut expected: Vec<_> = points
                .iter()
                .map(|p| squared_distance(p, &query))
                .collect();
            expected.sort_by(|a, b| a.partial_cmp(b).unwrap());

            for (neighbor, expected_dist) in found.iter().zip(&expected) {
                assert!((neighbor.squared_distance - expected_dist).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn range_query_is_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = random_points(500, &mut rng);
        let mut tree = KdTree::new();
        for (index, point) in points.iter().enumerate() {
            tree.insert(*point, index);
        }

        let query = [0.0, 0.0];
        let radius = 40.0;
        let mut found: Vec<usize> = tree
            .neighbors_within_range(&query, radius)
            .into_iter()
            .map(|n| n.value)
            .collect();
        found.sort_unstable();

        let expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| squared_distance(p, &query) <= radius * radius)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn duplicate_keys_do_not_split_forever() {
        let mut tree = KdTree::new();
        for index in 0..200 {
            tree.insert([1.0f32, 1.0], index);
        }
        assert_eq!(tree.len(), 200);
        let found = tree.nearest_neighbors(&[1.0, 1.0], 5);
        assert_eq!(found.len(), 5);
        for neighbor in found {
            assert_eq!(neighbor.squared_distance, 0.0);
        }
    }

    #[test]
    fn fewer_entries_than_requested() {
        let mut tree = KdTree::new();
        tree.insert([0.0f64, 0.0], 'a');
        tree.insert([1.0, 0.0], 'b');
        let found = tree.nearest_neighbors(&[0.0, 0.0], 10);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value, 'a');
        assert_eq!(found[1].value, 'b');
    }

    #[test]
    fn empty_tree_queries() {
        let tree: KdTree<f64, usize> = KdTree::new();
        assert!(tree.nearest_neighbors(&[0.0, 0.0], 3).is_empty());
        assert!(tree.neighbors_within_range(&[0.0, 0.0], 10.0).is_empty());
    }
}
