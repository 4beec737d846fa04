//! Dependency cycle detection at install time.
//!
//! Walks dependency edges from the controller being installed through every
//! claimed or installed holder. A name that is not held yet ends the walk on
//! that branch; the cycle, if it ever closes, is caught by whichever install
//! completes it.

use std::collections::HashSet;
use std::sync::Arc;

use super::controller::ServiceController;
use super::name::ServiceName;

struct Frame {
    controller: Arc<ServiceController>,
    reached_as: ServiceName,
    next_edge: usize,
}

/// Returns the names along a cycle through `root`'s dependencies, first name
/// repeated at the end, or `None`.
pub(crate) fn find_cycle(root: &Arc<ServiceController>) -> Option<Vec<ServiceName>> {
    let mut path = vec![Frame {
        controller: Arc::clone(root),
        reached_as: root.name().clone(),
        next_edge: 0,
    }];
    let mut on_path: HashSet<u64> = HashSet::from([root.id()]);
    let mut finished: HashSet<u64> = HashSet::new();

    loop {
        let Some(frame) = path.last_mut() else {
            return None;
        };
        let edge = frame.controller.dependency_edges().get(frame.next_edge).cloned();
        frame.next_edge += 1;

        let Some(edge) = edge else {
            if let Some(done) = path.pop() {
                on_path.remove(&done.controller.id());
                finished.insert(done.controller.id());
            }
            continue;
        };
        let Some(next) = edge.target().holder() else {
            continue;
        };
        let next_id = next.id();
        if on_path.contains(&next_id) {
            let start = path
                .iter()
                .position(|f| f.controller.id() == next_id)
                .unwrap_or(0);
            let mut names: Vec<ServiceName> =
                path[start..].iter().map(|f| f.reached_as.clone()).collect();
            names.push(edge.target().name().clone());
            return Some(names);
        }
        if finished.contains(&next_id) {
            continue;
        }
        on_path.insert(next_id);
        path.push(Frame {
            controller: next,
            reached_as: edge.target().name().clone(),
            next_edge: 0,
        });
    }
}
