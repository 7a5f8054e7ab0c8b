// src/engine/check.rs

//! Static inspection of the registered task graph.
//!
//! Runs never need this; recursion is caught on the call stack anyway. It
//! exists so `bud check` can report problems before anything executes.

use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::engine::Engine;
use crate::task::TaskName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// `task` lists `dependency`, which resolves to nothing.
    UnknownDependency { task: TaskName, dependency: String },
    /// Tasks that (transitively) depend on themselves, sorted by name.
    Cycle(Vec<TaskName>),
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::UnknownDependency { task, dependency } => {
                write!(f, "task '{task}' depends on unknown task '{dependency}'")
            }
            GraphIssue::Cycle(members) => {
                write!(f, "dependency cycle between: {}", members.join(", "))
            }
        }
    }
}

impl Engine {
    /// Unknown dependencies first (in task order), then every cycle.
    pub fn check_graph(&self) -> Vec<GraphIssue> {
        let registry = self.registry();
        let tasks = registry.tasks();

        let mut resolved = Vec::new();
        let mut issues = Vec::new();
        // Edge direction: task -> dependency, on qualified names.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for task in &tasks {
            graph.add_node(task.qualified_name());
            for dep in task.dependencies() {
                match registry.resolve(dep) {
                    Some(target) => resolved.push((task.qualified_name(), target)),
                    None => issues.push(GraphIssue::UnknownDependency {
                        task: task.qualified_name().to_string(),
                        dependency: dep.clone(),
                    }),
                }
            }
        }
        for (from, to) in &resolved {
            graph.add_edge(*from, to.qualified_name(), ());
        }

        let mut cycles: Vec<Vec<TaskName>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<TaskName> = scc.into_iter().map(str::to_string).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        issues.extend(cycles.into_iter().map(GraphIssue::Cycle));
        issues
    }
}
