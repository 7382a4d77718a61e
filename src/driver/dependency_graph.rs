use std::collections::BTreeSet;
use std::collections::HashMap;

use petgraph::graph::Graph;

use crate::configure::Module;

/// Module information relevant for ordering the configure phase
/// via topological sorting
#[derive(Debug)]
pub struct ModuleNode {
    pub after_self: Vec<usize>,

    pub predecessor_count: usize,
}

impl ModuleNode {
    pub fn new() -> ModuleNode {
        ModuleNode {
            after_self: Vec::new(),
            predecessor_count: 0,
        }
    }
}

#[derive(Debug)]
pub struct DependencyManager {
    nodes: Vec<ModuleNode>,

    /// Modules without unconfigured predecessors, by registration index
    runnable: BTreeSet<usize>,
}

impl DependencyManager {
    /// Return a newly constructed dependency manager
    ///
    /// If the modules contain a cyclic dependency the Err(index)
    /// contains the index of some module involved in the cycle
    pub fn with_modules(modules: &[Box<dyn Module>]) -> Result<Self, usize> {
        let nodes = DependencyManager::build_dependencies(modules);
        let result = DependencyManager {
            runnable: DependencyManager::find_initial_runnables(&nodes),
            nodes,
        };

        result.check_for_cycles()?;
        Ok(result)
    }

    /// Configure order of all modules
    ///
    /// Among modules whose predecessors are done the one registered first
    /// is picked, so independent modules keep their registration order.
    pub fn order(mut self) -> Vec<usize> {
        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(next) = self.pop_runnable() {
            self.notify_module_configured(next);
            result.push(next);
        }
        result
    }

    fn pop_runnable(&mut self) -> Option<usize> {
        let next = *self.runnable.iter().next()?;
        self.runnable.remove(&next);
        Some(next)
    }

    fn notify_module_configured(&mut self, module: usize) {
        for successor_index in self.nodes[module].after_self.clone() {
            let successor = &mut self.nodes[successor_index];
            successor.predecessor_count -= 1;
            if successor.predecessor_count == 0 {
                self.runnable.insert(successor_index);
            }
        }
    }

    fn find_initial_runnables(nodes: &[ModuleNode]) -> BTreeSet<usize> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.predecessor_count == 0)
            .map(|(i, _)| i)
            .collect()
    }

    fn build_dependencies(modules: &[Box<dyn Module>]) -> Vec<ModuleNode> {
        let name_dict: HashMap<&str, usize> = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.base().section.as_str(), i))
            .collect();

        let mut result: Vec<ModuleNode> = modules.iter().map(|_| ModuleNode::new()).collect();
        for (current_index, module) in modules.iter().enumerate() {
            // Sections of modules not registered impose no order
            let predecessors: BTreeSet<usize> = module
                .configure_after()
                .iter()
                .filter_map(|section| name_dict.get(section).copied())
                .filter(|i| *i != current_index)
                .collect();
            for predecessor_index in predecessors {
                result[predecessor_index].after_self.push(current_index);
                result[current_index].predecessor_count += 1;
            }
        }
        result
    }

    fn check_for_cycles(&self) -> Result<(), usize> {
        let mut graph = Graph::<usize, ()>::new();
        let node_dict: Vec<_> = (0..self.nodes.len()).map(|i| graph.add_node(i)).collect();

        for (i, node) in self.nodes.iter().enumerate() {
            for successor in &node.after_self {
                graph.add_edge(node_dict[i], node_dict[*successor], ());
            }
        }

        match petgraph::algo::toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(graph[cycle.node_id()]),
        }
    }
}
