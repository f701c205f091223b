/// Union-Find (Disjoint Sets) over named families, used to collapse a
/// parent→children hierarchy into connected family trees
use indexmap::IndexMap;

pub struct UnionFind {
    index: IndexMap<String, usize>,
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    pub fn new() -> Self {
        UnionFind {
            index: IndexMap::new(),
            parent: Vec::new(),
            rank: Vec::new(),
        }
    }

    /// Index for `name`, adding it as its own set on first sight
    pub fn insert(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.parent.len();
        self.index.insert(name.to_string(), idx);
        self.parent.push(idx);
        self.rank.push(0);
        idx
    }

    /// Find the root of element x with path compression
    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    /// Union the sets containing two names
    pub fn union(&mut self, a: &str, b: &str) {
        let x = self.insert(a);
        let y = self.insert(b);
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x != root_y {
            // Union by rank
            if self.rank[root_x] < self.rank[root_y] {
                self.parent[root_x] = root_y;
            } else if self.rank[root_x] > self.rank[root_y] {
                self.parent[root_y] = root_x;
            } else {
                self.parent[root_y] = root_x;
                self.rank[root_x] += 1;
            }
        }
    }

    /// Map every name to a stable label for its set: the lexicographically
    /// smallest member name
    pub fn labels(&mut self) -> IndexMap<String, String> {
        let names: Vec<String> = self.index.keys().cloned().collect();
        let mut smallest: IndexMap<usize, String> = IndexMap::new();

        for (idx, name) in names.iter().enumerate() {
            let root = self.find(idx);
            let entry = smallest.entry(root).or_insert_with(|| name.clone());
            if *name < *entry {
                *entry = name.clone();
            }
        }

        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let root = self.find(idx);
                (name.clone(), smallest[&root].clone())
            })
            .collect()
    }
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}
