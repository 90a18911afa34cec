use std::collections::VecDeque;

/// Sources-first order of `count` nodes connected by `(producer, consumer)`
/// edges (Kahn). Nodes on a cycle, and everything only reachable through
/// one, follow in insertion order.
pub(crate) fn dependency_order(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; count];
    let mut downstream = vec![Vec::new(); count];
    for &(from, to) in edges {
        indegree[to] += 1;
        downstream[from].push(to);
    }

    let mut ready: VecDeque<usize> = (0..count).filter(|&node| indegree[node] == 0).collect();
    let mut placed = vec![false; count];
    let mut order = Vec::with_capacity(count);
    while let Some(node) = ready.pop_front() {
        placed[node] = true;
        order.push(node);
        for &next in &downstream[node] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push_back(next);
            }
        }
    }
    order.extend((0..count).filter(|&node| !placed[node]));
    order
}
