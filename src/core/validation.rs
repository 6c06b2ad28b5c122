//! Build-time validation: dependency graph plus condition checks

use crate::core::{
    condition::{Condition, ConditionError},
    graph::{DependencyGraph, ExecutionPlan, GraphError},
    pipeline::Pipeline,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Any error that stops a pipeline before it runs or is generated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// A pipeline that passed validation, with its derived graph and plan
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pipeline: Pipeline,
    graph: DependencyGraph,
    plan: ExecutionPlan,
    conditions: HashMap<String, Condition>,
}

impl CompiledPipeline {
    /// Validate a pipeline
    ///
    /// Graph errors are reported before condition errors; conditions are
    /// checked in declaration order.
    pub fn compile(pipeline: Pipeline) -> Result<Self, BuildError> {
        let (graph, plan) = DependencyGraph::build(&pipeline)?;

        let mut conditions = HashMap::new();
        for step in &pipeline.steps {
            let Some(source) = step.condition.as_deref() else {
                continue;
            };

            let condition = Condition::parse(&step.id, source)?;
            let env = pipeline.env_for_step(step);
            condition.check(&step.id, &env, |id| graph.contains(id))?;

            for referenced in condition.referenced_steps() {
                if !graph.is_ancestor(referenced, &step.id) {
                    warn!(
                        "Step '{}' condition references '{}', which is not one of its dependencies; \
                         its outcome may not be recorded when the condition is evaluated",
                        step.id, referenced
                    );
                }
            }

            conditions.insert(step.id.clone(), condition);
        }

        debug!(
            "Compiled pipeline '{}': {} steps in {} waves",
            pipeline.name,
            pipeline.steps.len(),
            plan.wave_count()
        );

        Ok(Self {
            pipeline,
            graph,
            plan,
            conditions,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Parsed condition for a step, if it has one
    pub fn condition(&self, step_id: &str) -> Option<&Condition> {
        self.conditions.get(step_id)
    }
}
