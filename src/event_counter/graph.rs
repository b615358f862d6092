/// Small directed graph used to order metric evaluation.
///
/// An edge `node -> successor` means `node` has to be handled first.
#[derive(Clone, Debug)]
pub struct DirectedGraph<N> {
    nodes: Vec<N>,
    edges: Vec<(N, N)>,
}

impl<N> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self {
            nodes: vec![],
            edges: vec![],
        }
    }
}

impl<N: Clone + PartialEq> DirectedGraph<N> {
    pub fn insert(&mut self, node: N) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }

    /// Adds `node -> successor`, inserting both nodes.
    pub fn connect(&mut self, node: N, successor: N) {
        self.insert(node.clone());
        self.insert(successor.clone());
        let edge = (node, successor);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains(node)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Removes and returns the first node no other node leads to.
    ///
    /// `None` once the graph is empty, or if every remaining node is on a cycle.
    pub fn pop(&mut self) -> Option<N> {
        let index = self
            .nodes
            .iter()
            .position(|node| !self.edges.iter().any(|(_, successor)| successor == node))?;
        let node = self.nodes.remove(index);
        self.edges.retain(|(from, _)| *from != node);
        Some(node)
    }

    pub fn is_cyclic(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }

        let mut colors = vec![Color::White; self.nodes.len()];
        let index_of = |node: &N| self.nodes.iter().position(|it| it == node);

        // Iterative DFS, a grey successor closes a cycle.
        for root in 0..self.nodes.len() {
            if colors[root] != Color::White {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            colors[root] = Color::Grey;
            while let Some((node, next_edge)) = stack.pop() {
                let successors = self
                    .edges
                    .iter()
                    .filter(|(from, _)| *from == self.nodes[node])
                    .filter_map(|(_, to)| index_of(to));
                match successors.clone().nth(next_edge) {
                    Some(successor) => {
                        stack.push((node, next_edge + 1));
                        match colors[successor] {
                            Color::Grey => return true,
                            Color::White => {
                                colors[successor] = Color::Grey;
                                stack.push((successor, 0));
                            }
                            Color::Black => (),
                        }
                    }
                    None => colors[node] = Color::Black,
                }
            }
        }
        false
    }
}
