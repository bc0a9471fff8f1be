//! One collection pass over a set of handed-over roots.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::object::{ErasedObject, Object, Ref};

/// Summary of a collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Objects examined.
    pub candidates: usize,
    /// Objects destroyed as garbage.
    pub garbage: usize,
}

impl CollectionStats {
    pub(crate) fn absorb(&mut self, other: CollectionStats) {
        self.candidates += other.candidates;
        self.garbage += other.garbage;
    }
}

/// Sink for the references an object reports during collection.
///
/// Passed to [`Object::report_references`]; each strong reference the object
/// holds should be reported once.
#[derive(Default)]
pub struct GarbageCollector {
    reported: Vec<ErasedObject>,
}

impl GarbageCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Report one outgoing strong reference, labelled `name` for diagnostics.
    ///
    /// References to objects that do not participate in collection are
    /// ordinary strong references and are not followed.
    pub fn report<T: Object + ?Sized>(&mut self, reference: &Ref<T>, name: &str) {
        if !reference.uses_garbage_collector() {
            trace!(edge = name, class = reference.class_name(), "gc.report.skip");
            return;
        }
        if let Some(object) = reference.erased() {
            trace!(edge = name, class = reference.class_name(), "gc.report");
            self.reported.push(object);
        }
    }

    /// Report a reference that may be unset.
    pub fn report_option<T: Object + ?Sized>(&mut self, reference: Option<&Ref<T>>, name: &str) {
        if let Some(reference) = reference {
            self.report(reference, name);
        }
    }

    /// Number of references reported so far.
    #[must_use]
    pub fn reported_count(&self) -> usize {
        self.reported.len()
    }
}

struct Node {
    object: ErasedObject,
    /// References the collector holds on behalf of dropped handles.
    handed_over: usize,
    /// References reported from other nodes in this graph.
    internal: usize,
    edges: Vec<usize>,
    live: bool,
}

#[derive(Default)]
struct Graph {
    nodes: Vec<Node>,
    index: HashMap<usize, usize>,
}

impl Graph {
    fn intern(&mut self, object: ErasedObject) -> usize {
        let key = Arc::as_ptr(&object) as *const () as usize;
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(Node { object, handed_over: 0, internal: 0, edges: Vec::new(), live: false });
        self.index.insert(key, i);
        i
    }

    fn discover(&mut self) {
        let mut cursor = 0;
        while cursor < self.nodes.len() {
            let object = Arc::clone(&self.nodes[cursor].object);
            let mut collector = GarbageCollector::new();
            object.value.report_references(&mut collector);
            for target in collector.reported {
                if !target.header.is_alive() {
                    continue;
                }
                let j = self.intern(target);
                self.nodes[j].internal += 1;
                self.nodes[cursor].edges.push(j);
            }
            cursor += 1;
        }
    }

    fn mark_live(&mut self) {
        let mut stack = Vec::new();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let count = node.object.header.reference_count();
            let accounted = node.internal + node.handed_over;
            if count < accounted {
                warn!(
                    class = node.object.value.class_name(),
                    count, accounted, "gc.over_reported"
                );
            }
            if count != accounted {
                node.live = true;
                stack.push(i);
            }
        }
        while let Some(i) = stack.pop() {
            for k in 0..self.nodes[i].edges.len() {
                let j = self.nodes[i].edges[k];
                if !self.nodes[j].live {
                    self.nodes[j].live = true;
                    stack.push(j);
                }
            }
        }
    }
}

/// Run one pass over `roots`, destroying every garbage object found.
pub(crate) fn collect_roots(roots: Vec<ErasedObject>) -> CollectionStats {
    let mut graph = Graph::default();
    for root in roots {
        if !root.header.is_alive() {
            continue;
        }
        let i = graph.intern(root);
        graph.nodes[i].handed_over += 1;
    }
    graph.discover();
    graph.mark_live();

    let garbage: Vec<usize> = (0..graph.nodes.len()).filter(|&i| !graph.nodes[i].live).collect();
    let stats = CollectionStats { candidates: graph.nodes.len(), garbage: garbage.len() };

    for &i in &garbage {
        graph.nodes[i].object.header.set_doomed();
    }
    // Every intra-garbage edge is gone before the first delete observer runs.
    for &i in &garbage {
        graph.nodes[i].object.value.remove_references();
    }
    for &i in &garbage {
        let object = &graph.nodes[i].object;
        object.header.destroy(object.value.class_name());
    }

    for node in graph.nodes.iter().filter(|n| n.live) {
        for _ in 0..node.handed_over {
            crate::object::release_erased(&node.object);
        }
    }

    // Dropping the graph frees garbage in discovery order.
    drop(graph);
    stats
}

/// Release handed-over references without looking for cycles.
pub(crate) fn release_roots(roots: Vec<ErasedObject>) -> CollectionStats {
    for root in &roots {
        if root.header.is_alive() {
            crate::object::release_erased(root);
        }
    }
    CollectionStats::default()
}
