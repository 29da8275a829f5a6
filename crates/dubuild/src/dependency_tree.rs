//! Dependency resolution from an entry file
//!
//! Resolution is a depth-first walk that emits every file after all of the files it requires.
//! Independent subtrees keep the order in which their `--@require` directives were declared, so
//! the same sources always produce the same load order.

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::{
    error::{BuildError, BuildResult},
    source_file::SourceFile,
    source_repository::SourceRepository,
    types::{FxIndexMap, FxIndexSet},
};

/// Linear build order of the files reachable from one or more roots
#[derive(Debug)]
pub struct DependencyTree<'a> {
    repository: &'a SourceRepository,
    /// Resolved files; the index of an entry is its build position
    order: FxIndexMap<&'a str, &'a SourceFile>,
}

impl<'a> DependencyTree<'a> {
    pub fn new(repository: &'a SourceRepository) -> Self {
        Self {
            repository,
            order: FxIndexMap::default(),
        }
    }

    /// Resolve `root` and everything it transitively requires
    ///
    /// Files already placed by an earlier call keep their position.
    pub fn add(&mut self, root: &'a SourceFile) -> BuildResult<()> {
        let mut in_progress = FxIndexSet::default();
        self.visit(root, &mut in_progress)?;
        debug!(
            "Resolved {} file(s) after adding {}",
            self.order.len(),
            root.name()
        );
        Ok(())
    }

    fn visit(
        &mut self,
        file: &'a SourceFile,
        in_progress: &mut FxIndexSet<&'a str>,
    ) -> BuildResult<()> {
        if self.order.contains_key(file.name()) {
            return Ok(());
        }

        if let Some(start) = in_progress.get_index_of(file.name()) {
            let mut cycle: Vec<String> = in_progress
                .iter()
                .skip(start)
                .map(|name| (*name).to_owned())
                .collect();
            cycle.push(file.name().to_owned());
            return Err(BuildError::CyclicDependency { cycle });
        }

        in_progress.insert(file.name());
        for reference in file.dependencies() {
            let dependency = self.repository.resolve(reference).ok_or_else(|| {
                BuildError::UnresolvedDependency {
                    file: file.name().to_owned(),
                    dependency: reference.to_owned(),
                }
            })?;
            self.visit(dependency, in_progress)?;
        }
        in_progress.pop();

        debug!("Placed {} at position {}", file.name(), self.order.len());
        self.order.insert(file.name(), file);
        Ok(())
    }

    /// Files paired with their build position, dependencies first
    pub fn dependency_order(&self) -> impl ExactSizeIterator<Item = (&'a SourceFile, usize)> + '_ {
        self.order
            .values()
            .enumerate()
            .map(|(position, file)| (*file, position))
    }

    /// Build position of a resolved file
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.get_index_of(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolved files as a graph with edges pointing from a dependency to its dependent
    pub fn to_graph(&self) -> DiGraph<&'a str, ()> {
        let mut graph = DiGraph::with_capacity(self.order.len(), 0);
        let nodes: FxHashMap<&str, NodeIndex> = self
            .order
            .keys()
            .map(|name| (*name, graph.add_node(*name)))
            .collect();

        for (name, file) in &self.order {
            for reference in file.dependencies() {
                if let Some(dependency) = self.repository.resolve(reference)
                    && let (Some(&from), Some(&to)) =
                        (nodes.get(dependency.name()), nodes.get(name))
                {
                    graph.update_edge(from, to, ());
                }
            }
        }
        graph
    }
}
