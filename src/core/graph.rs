//! Dependency graph and wave planning

use crate::core::pipeline::Pipeline;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Structural errors in a pipeline's dependency declarations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("step '{step_id}': duplicate step id")]
    DuplicateStepId { step_id: String },

    #[error("step '{step_id}': depends_on references unknown step '{dependency}'")]
    UnknownDependency { step_id: String, dependency: String },

    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
}

/// Steps grouped into waves that can run concurrently
///
/// Every step appears in exactly one wave, and always in a later wave than
/// all of its dependencies. Within a wave, steps keep declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    waves: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn step_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    /// Index of the wave containing `step_id`
    pub fn wave_of(&self, step_id: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|id| id == step_id))
    }

    /// All step IDs, wave by wave
    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.waves.iter().flatten().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct GraphNode {
    deps: Vec<usize>,
    dependents: Vec<usize>,
}

/// Validated, acyclic step dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    nodes: Vec<GraphNode>,
}

impl DependencyGraph {
    /// Validate a pipeline's steps and build its graph and execution plan
    ///
    /// Checks run in order: duplicate ids, unknown dependencies, cycles.
    pub fn build(pipeline: &Pipeline) -> Result<(Self, ExecutionPlan), GraphError> {
        let mut index = HashMap::with_capacity(pipeline.steps.len());
        for (idx, step) in pipeline.steps.iter().enumerate() {
            if index.insert(step.id.clone(), idx).is_some() {
                return Err(GraphError::DuplicateStepId {
                    step_id: step.id.clone(),
                });
            }
        }

        let mut nodes: Vec<GraphNode> = pipeline
            .steps
            .iter()
            .map(|_| GraphNode {
                deps: Vec::new(),
                dependents: Vec::new(),
            })
            .collect();

        for (idx, step) in pipeline.steps.iter().enumerate() {
            for dep in &step.depends_on {
                let Some(&dep_idx) = index.get(dep) else {
                    return Err(GraphError::UnknownDependency {
                        step_id: step.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                if !nodes[idx].deps.contains(&dep_idx) {
                    nodes[idx].deps.push(dep_idx);
                    nodes[dep_idx].dependents.push(idx);
                }
            }
        }

        let graph = Self {
            ids: pipeline.steps.iter().map(|s| s.id.clone()).collect(),
            index,
            nodes,
        };
        let plan = graph.partition_waves()?;
        Ok((graph, plan))
    }

    /// Kahn's algorithm, one removal round per wave
    fn partition_waves(&self) -> Result<ExecutionPlan, GraphError> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.deps.len()).collect();
        let mut placed = vec![false; self.nodes.len()];
        let mut remaining = self.nodes.len();
        let mut waves = Vec::new();

        while remaining > 0 {
            // Scanning in index order keeps declaration order inside a wave
            let wave: Vec<usize> = (0..self.nodes.len())
                .filter(|&idx| !placed[idx] && in_degree[idx] == 0)
                .collect();

            if wave.is_empty() {
                return Err(GraphError::CyclicDependency {
                    cycle: self.find_cycle(&placed),
                });
            }

            for &idx in &wave {
                placed[idx] = true;
                for &dependent in &self.nodes[idx].dependents {
                    in_degree[dependent] -= 1;
                }
            }
            remaining -= wave.len();
            waves.push(wave.into_iter().map(|idx| self.ids[idx].clone()).collect());
        }

        Ok(ExecutionPlan { waves })
    }

    /// Walk unplaced nodes along their dependencies until one repeats
    ///
    /// Every unplaced node still has an unplaced dependency, so the walk
    /// never dead-ends.
    fn find_cycle(&self, placed: &[bool]) -> Vec<String> {
        let Some(start) = (0..self.nodes.len()).find(|&idx| !placed[idx]) else {
            return Vec::new();
        };

        let mut path = Vec::new();
        let mut seen_at = HashMap::new();
        let mut current = start;

        loop {
            if let Some(&pos) = seen_at.get(&current) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&idx: &usize| self.ids[idx].clone())
                    .collect();
                cycle.push(self.ids[current].clone());
                return cycle;
            }
            seen_at.insert(current, path.len());
            path.push(current);

            match self.nodes[current].deps.iter().find(|&&dep| !placed[dep]) {
                Some(&next) => current = next,
                None => return path.iter().map(|&idx| self.ids[idx].clone()).collect(),
            }
        }
    }

    /// Step IDs in declaration order
    pub fn step_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.index.contains_key(step_id)
    }

    /// Immediate dependencies of a step
    pub fn dependencies_of(&self, step_id: &str) -> Vec<&str> {
        self.neighbours(step_id, |node| &node.deps)
    }

    /// Immediate dependents of a step
    pub fn dependents_of(&self, step_id: &str) -> Vec<&str> {
        self.neighbours(step_id, |node| &node.dependents)
    }

    fn neighbours<'a>(&'a self, step_id: &str, edges: impl Fn(&GraphNode) -> &Vec<usize>) -> Vec<&'a str> {
        self.index
            .get(step_id)
            .map(|&idx| {
                edges(&self.nodes[idx])
                    .iter()
                    .map(|&n| self.ids[n].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every step that depends on `step_id`, directly or not, in declaration order
    pub fn transitive_dependents(&self, step_id: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(step_id) else {
            return Vec::new();
        };

        let mut reached = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            for &dependent in &self.nodes[idx].dependents {
                if !reached[dependent] {
                    reached[dependent] = true;
                    stack.push(dependent);
                }
            }
        }

        (0..self.nodes.len())
            .filter(|&idx| reached[idx])
            .map(|idx| self.ids[idx].as_str())
            .collect()
    }

    /// True if `ancestor` is a direct or transitive dependency of `step_id`
    pub fn is_ancestor(&self, ancestor: &str, step_id: &str) -> bool {
        self.transitive_dependents(ancestor).contains(&step_id)
    }
}
