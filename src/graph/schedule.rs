//! Pass scheduling and transient live ranges.
//!
//! Scheduling is a stable topological sort: a pass runs after every producer
//! of its inputs, writers of the same resource keep their declaration order,
//! and ties are broken by declaration order so the schedule is deterministic
//! frame to frame.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::GraphicsError;
use crate::graph::{Handle, RenderPass};

/// Compute the execution order of `passes` as indices into the slice.
pub(crate) fn schedule_passes(passes: &[RenderPass]) -> Result<Vec<usize>, GraphicsError> {
    // Producers of each handle, in declaration order.
    let mut producers: HashMap<Handle, Vec<usize>> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        if let Some(output) = pass.output() {
            if output.handle != Handle::OUTPUT {
                producers.entry(output.handle).or_default().push(index);
            }
        }
    }

    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); passes.len()];
    let mut in_degree: Vec<usize> = vec![0; passes.len()];
    let mut add_edge = |from: usize,
                        to: usize,
                        successors: &mut Vec<Vec<usize>>,
                        in_degree: &mut Vec<usize>| {
        if from != to && edges.insert((from, to)) {
            successors[from].push(to);
            in_degree[to] += 1;
        }
    };

    for (index, pass) in passes.iter().enumerate() {
        for input in pass.inputs() {
            if let Some(writers) = producers.get(input) {
                for &writer in writers {
                    add_edge(writer, index, &mut successors, &mut in_degree);
                }
            }
        }
    }
    // Writers of one resource keep their declaration order.
    for writers in producers.values() {
        for pair in writers.windows(2) {
            add_edge(pair[0], pair[1], &mut successors, &mut in_degree);
        }
    }
    // Passes writing the final output keep their declaration order too.
    let output_writers: Vec<usize> = passes
        .iter()
        .enumerate()
        .filter(|(_, pass)| {
            pass.output()
                .map(|output| output.handle == Handle::OUTPUT)
                .unwrap_or(false)
        })
        .map(|(index, _)| index)
        .collect();
    for pair in output_writers.windows(2) {
        add_edge(pair[0], pair[1], &mut successors, &mut in_degree);
    }

    // Kahn's algorithm; the ready heap yields the lowest declaration index.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();
    let mut order = Vec::with_capacity(passes.len());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != passes.len() {
        let scheduled: HashSet<usize> = order.iter().copied().collect();
        let stuck: Vec<&str> = passes
            .iter()
            .enumerate()
            .filter(|(index, _)| !scheduled.contains(index))
            .map(|(_, pass)| pass.name())
            .collect();
        return Err(GraphicsError::InvalidGraph(format!(
            "dependency cycle involving passes: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

/// First and last schedule position at which each resource is used.
///
/// Positions index into `order`, not into the pass declaration list.
pub(crate) fn live_ranges(
    passes: &[RenderPass],
    order: &[usize],
) -> HashMap<Handle, (usize, usize)> {
    let mut ranges: HashMap<Handle, (usize, usize)> = HashMap::new();
    for (position, &index) in order.iter().enumerate() {
        let pass = &passes[index];
        let output = pass
            .output()
            .map(|output| output.handle)
            .filter(|handle| !handle.is_sentinel());
        for handle in pass.inputs().iter().copied().chain(output) {
            ranges
                .entry(handle)
                .and_modify(|(_, last)| *last = position)
                .or_insert((position, position));
        }
    }
    ranges
}
