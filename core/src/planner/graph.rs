use std::collections::{HashMap, HashSet};

use crate::error::PlanningError;
use crate::task::TaskLike;

/// Task dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct TaskGraph<T: TaskLike> {
    /// Task nodes: task_id -> Task
    pub nodes: HashMap<String, T>,

    /// Dependency edges: task_id -> list of dependencies
    pub edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> list of tasks that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,

    /// Original insertion order (for stable sorting)
    insertion_order: Vec<String>,
}

impl<T: TaskLike> TaskGraph<T> {
    /// Construct task graph from task list
    pub fn from_tasks(tasks: &[T]) -> Result<Self, PlanningError> {
        let mut nodes = HashMap::new();
        let mut edges = HashMap::new();
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut insertion_order = Vec::new();

        for task in tasks {
            if nodes.contains_key(task.id()) {
                return Err(PlanningError::DuplicateTaskId(task.id().to_string()));
            }

            let task_id = task.id().to_string();
            let dependencies = task.dependencies().to_vec();

            nodes.insert(task_id.clone(), task.clone());
            edges.insert(task_id.clone(), dependencies.clone());
            insertion_order.push(task_id.clone());

            for dep in dependencies {
                reverse_edges.entry(dep).or_default().push(task_id.clone());
            }
        }

        Ok(Self {
            nodes,
            edges,
            reverse_edges,
            insertion_order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Task ids in the order they were added.
    pub fn insertion_order(&self) -> &[String] {
        &self.insertion_order
    }

    /// Validate dependency relationships
    pub fn validate(&self) -> Result<(), PlanningError> {
        for task_id in &self.insertion_order {
            for dep in self.edges.get(task_id).into_iter().flatten() {
                if !self.nodes.contains_key(dep) {
                    return Err(PlanningError::DependencyNotFound {
                        task_id: task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(PlanningError::CircularDependency(cycle));
        }

        Ok(())
    }

    /// Every task reachable by following reverse edges from `id`
    /// (direct and indirect dependents), excluding `id` itself.
    pub fn transitive_dependents(&self, id: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![id];
        let mut out = Vec::new();

        while let Some(current) = stack.pop() {
            for dependent in self.reverse_edges.get(current).into_iter().flatten() {
                if seen.insert(dependent.as_str()) {
                    out.push(dependent.clone());
                    stack.push(dependent.as_str());
                }
            }
        }

        out
    }

    /// Topological sort using Kahn's algorithm, insertion order within a stage.
    pub fn topological_sort(&self) -> Result<Vec<Vec<String>>, PlanningError> {
        self.topological_sort_by(|_| ())
    }

    /// Topological sort using Kahn's algorithm
    ///
    /// Returns execution stages where tasks in the same stage can run in parallel.
    /// Within a stage tasks are ordered by `key`, ties broken by insertion order.
    ///
    /// # Algorithm
    ///
    /// 1. Calculate in-degree for all nodes
    /// 2. Find all nodes with in-degree 0 (first stage)
    /// 3. Remove these nodes and update in-degrees
    /// 4. Repeat until all nodes processed
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn topological_sort_by<K, F>(&self, key: F) -> Result<Vec<Vec<String>>, PlanningError>
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let position: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        // edges[A] = [B, C] means A depends on B and C
        // In execution graph: B -> A, C -> A
        // So A's in-degree = 2
        let mut in_degree: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), self.edges.get(id).map_or(0, Vec::len)))
            .collect();

        let order_stage = |stage: &mut Vec<String>| {
            stage.sort_by(|a, b| {
                let ka = self.nodes.get(a).map(&key);
                let kb = self.nodes.get(b).map(&key);
                ka.cmp(&kb).then_with(|| {
                    let pa = position.get(a.as_str()).copied().unwrap_or(usize::MAX);
                    let pb = position.get(b.as_str()).copied().unwrap_or(usize::MAX);
                    pa.cmp(&pb)
                })
            });
        };

        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut current_stage: Vec<String> = self
            .insertion_order
            .iter()
            .filter(|id| in_degree.get(id.as_str()) == Some(&0))
            .cloned()
            .collect();
        order_stage(&mut current_stage);

        let mut processed = 0;

        while !current_stage.is_empty() {
            processed += current_stage.len();

            let mut next_stage = Vec::new();
            for task_id in &current_stage {
                for dependent in self.reverse_edges.get(task_id).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            next_stage.push(dependent.clone());
                        }
                    }
                }
            }
            order_stage(&mut next_stage);

            stages.push(std::mem::replace(&mut current_stage, next_stage));
        }

        if processed != self.nodes.len() {
            return Err(PlanningError::CircularDependency(
                "Unable to complete topological sort (cycle detected)".to_string(),
            ));
        }

        Ok(stages)
    }

    /// Detect circular dependencies using DFS
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(format_cycle_path(&stack));
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(dependencies) = self.edges.get(node) {
            for dep in dependencies {
                // dependency already on the current path
                if let Some(pos) = stack.iter().position(|x| x == dep) {
                    stack.push(dep.clone());
                    *stack = stack[pos..].to_vec();
                    return true;
                }

                if !visited.contains(dep) && self.dfs_cycle(dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }
}

fn format_cycle_path(stack: &[String]) -> String {
    stack.join(" -> ")
}
