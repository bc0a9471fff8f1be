//! Topology queries over the stage arena.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{Pipeline, StageId};
use crate::error::{Error, Result};

/// One consumer connection of a producer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Consumer {
    pub(super) stage: StageId,
    pub(super) port: usize,
    pub(super) connection: usize,
}

/// The stages one update touches, producers before consumers.
#[derive(Debug)]
pub(super) struct Plan {
    pub(super) target: StageId,
    pub(super) order: Vec<StageId>,
    position: HashMap<StageId, usize>,
    /// Consumers of `(producer, output port)` inside the plan, in plan order.
    consumers: HashMap<(StageId, usize), Vec<Consumer>>,
}

impl Plan {
    pub(super) fn position(&self, id: StageId) -> Option<usize> {
        self.position.get(&id).copied()
    }

    pub(super) fn consumers(&self, producer: StageId, port: usize) -> &[Consumer] {
        self.consumers.get(&(producer, port)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of the last plan stage consuming any output of `producer`.
    pub(super) fn last_consumer(&self, producer: StageId) -> Option<usize> {
        self.consumers
            .iter()
            .filter(|((p, _), _)| *p == producer)
            .flat_map(|(_, list)| list.iter())
            .filter_map(|c| self.position(c.stage))
            .max()
    }

    /// Plan positions grouped by depth: level 0 has no producers in the plan,
    /// level n depends only on levels below n.
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    pub(super) fn levels(&self, pipeline: &Pipeline) -> Vec<Vec<usize>> {
        let mut depth = vec![0usize; self.order.len()];
        for (pos, &id) in self.order.iter().enumerate() {
            let d = pipeline.stages[id.index()]
                .links
                .iter()
                .flatten()
                .filter_map(|link| self.position(link.producer))
                .map(|p| depth[p] + 1)
                .max()
                .unwrap_or(0);
            depth[pos] = d;
        }
        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (pos, &d) in depth.iter().enumerate() {
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(pos);
        }
        levels
    }
}

impl Pipeline {
    /// Stages feeding `target`, including it, in producer-first order.
    ///
    /// Depth-first over inputs in port and connection order, so the order is
    /// stable for a given topology.
    pub(super) fn upstream_order(&self, target: StageId) -> Vec<StageId> {
        fn visit(pipeline: &Pipeline, id: StageId, seen: &mut HashSet<StageId>, out: &mut Vec<StageId>) {
            if !seen.insert(id) {
                return;
            }
            for link in pipeline.stages[id.index()].links.iter().flatten() {
                visit(pipeline, link.producer, seen, out);
            }
            out.push(id);
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        visit(self, target, &mut seen, &mut out);
        out
    }

    /// Returns true if `from` feeds `to`, directly or through other stages.
    pub(super) fn reaches(&self, from: StageId, to: StageId) -> bool {
        let mut queue = VecDeque::from([to]);
        let mut seen = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if id == from {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            for link in self.stages[id.index()].links.iter().flatten() {
                queue.push_back(link.producer);
            }
        }
        false
    }

    /// Every stage consuming an output of `id`, in arena order.
    pub(super) fn direct_consumers(&self, id: StageId) -> Vec<StageId> {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.links.iter().flatten().any(|link| link.producer == id))
            .map(|(i, _)| StageId::from_index(i))
            .collect()
    }

    /// `id` and everything downstream of it.
    pub(super) fn downstream_closure(&self, id: StageId) -> Vec<StageId> {
        let mut out = vec![id];
        let mut seen = HashSet::from([id]);
        let mut cursor = 0;
        while cursor < out.len() {
            for consumer in self.direct_consumers(out[cursor]) {
                if seen.insert(consumer) {
                    out.push(consumer);
                }
            }
            cursor += 1;
        }
        out
    }

    /// Build the plan for updating `target`, checking required inputs.
    pub(super) fn plan(&self, target: StageId) -> Result<Plan> {
        let order = self.upstream_order(target);
        let position: HashMap<StageId, usize> = order.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();

        let mut consumers: HashMap<(StageId, usize), Vec<Consumer>> = HashMap::new();
        for &id in &order {
            let stage = &self.stages[id.index()];
            for (port, links) in stage.links.iter().enumerate() {
                if links.is_empty() && !stage.input_is_optional(port) {
                    return Err(Error::MissingInput { stage: id, port });
                }
                for (connection, link) in links.iter().enumerate() {
                    consumers
                        .entry((link.producer, link.port))
                        .or_default()
                        .push(Consumer { stage: id, port, connection });
                }
            }
        }

        Ok(Plan { target, order, position, consumers })
    }
}
