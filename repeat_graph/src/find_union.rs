// Union-find with path compression and union by size.
#[derive(Debug, Clone)]
pub struct FindUnion {
    parents: Vec<usize>,
    sizes: Vec<usize>,
}

impl FindUnion {
    pub fn new(size: usize) -> Self {
        Self {
            parents: (0..size).collect(),
            sizes: vec![1; size],
        }
    }
    pub fn len(&self) -> usize {
        self.parents.len()
    }
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
    /// Appends a new singleton and returns its index.
    pub fn push(&mut self) -> usize {
        self.parents.push(self.parents.len());
        self.sizes.push(1);
        self.parents.len() - 1
    }
    pub fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parents[root] != root {
            root = self.parents[root];
        }
        let mut current = index;
        while self.parents[current] != root {
            let next = self.parents[current];
            self.parents[current] = root;
            current = next;
        }
        root
    }
    /// Returns true if the two sets were different.
    pub fn unite(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        let (large, small) = if self.sizes[a] < self.sizes[b] {
            (b, a)
        } else {
            (a, b)
        };
        self.parents[small] = large;
        self.sizes[large] += self.sizes[small];
        true
    }
    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn unite() {
        let mut fu = FindUnion::new(5);
        assert!(fu.unite(0, 1));
        assert!(fu.unite(3, 4));
        assert!(!fu.unite(1, 0));
        assert!(fu.same(0, 1));
        assert!(!fu.same(1, 3));
        let x = fu.push();
        assert!(fu.unite(x, 4));
        assert!(fu.same(x, 3));
        assert_eq!(fu.len(), 6);
    }
}
