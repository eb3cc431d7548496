//! Dependency tree construction.
//!
//! The tree is a forest of value-like nested maps. A dependency shared by two
//! branches is expanded independently under each of them, so the same package
//! may appear many times; deduplicating side effects is the executor's job.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::BuildHasher;

use indexmap::{IndexMap, IndexSet};
use instant_types::{PackageId, PackageRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DependencyError;

/// Lookup from a package identifier to its declared direct dependencies.
///
/// `None` means the package is unknown to the registry.
pub trait DependencySource {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]>;
}

impl<T: DependencySource + ?Sized> DependencySource for &T {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]> {
        (**self).dependencies(id)
    }
}

impl<S: BuildHasher> DependencySource for HashMap<PackageId, Vec<PackageId>, S> {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]> {
        self.get(id).map(Vec::as_slice)
    }
}

impl DependencySource for BTreeMap<PackageId, Vec<PackageId>> {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]> {
        self.get(id).map(Vec::as_slice)
    }
}

impl DependencySource for IndexMap<PackageId, Vec<PackageId>> {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]> {
        self.get(id).map(Vec::as_slice)
    }
}

impl DependencySource for IndexMap<PackageId, PackageRecord> {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]> {
        self.get(id).map(PackageRecord::dependencies)
    }
}

/// Direct dependencies of the owning package, each with its own subtree.
///
/// Children keep the order in which the manifest declared them. An empty node
/// is a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyNode {
    children: IndexMap<PackageId, DependencyNode>,
}

impl DependencyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.children.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&DependencyNode> {
        self.children.get(id)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, PackageId, DependencyNode> {
        self.children.iter()
    }

    /// Identifiers of the direct children, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &PackageId> {
        self.children.keys()
    }

    fn insert(&mut self, id: PackageId, node: DependencyNode) {
        self.children.insert(id, node);
    }
}

impl<'a> IntoIterator for &'a DependencyNode {
    type Item = (&'a PackageId, &'a DependencyNode);
    type IntoIter = indexmap::map::Iter<'a, PackageId, DependencyNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

impl<K: Into<PackageId>> FromIterator<(K, DependencyNode)> for DependencyNode {
    fn from_iter<I: IntoIterator<Item = (K, DependencyNode)>>(iter: I) -> Self {
        Self {
            children: iter.into_iter().map(|(id, node)| (id.into(), node)).collect(),
        }
    }
}

/// Mapping from each chosen root package to its full dependency expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyTree {
    roots: DependencyNode,
}

impl DependencyTree {
    pub fn new(roots: DependencyNode) -> Self {
        Self { roots }
    }

    /// The top level node whose children are the chosen roots.
    pub fn roots(&self) -> &DependencyNode {
        &self.roots
    }

    pub fn root_ids(&self) -> impl Iterator<Item = &PackageId> {
        self.roots.keys()
    }

    pub fn get(&self, id: &str) -> Option<&DependencyNode> {
        self.roots.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Every package in the tree exactly once, dependencies before dependents.
    ///
    /// Depth-first post-order over the roots in their chosen order; the first
    /// occurrence of a package fixes its position.
    pub fn dependency_order(&self) -> Vec<PackageId> {
        fn collect(node: &DependencyNode, ordered: &mut IndexSet<PackageId>) {
            for (id, child) in node {
                collect(child, ordered);
                if !ordered.contains(id) {
                    ordered.insert(id.clone());
                }
            }
        }

        let mut ordered = IndexSet::new();
        collect(&self.roots, &mut ordered);
        ordered.into_iter().collect()
    }

    /// Pretty JSON rendering in the nested object shape, e.g. `{"a": {"b": {}}}`.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Expand the chosen root packages into a dependency tree.
///
/// Roots are expanded in the given order; a root listed twice is only placed
/// once. Fails when any package reached (root or dependency) is unknown to
/// `source`, or when a package reappears on its own expansion path.
pub fn build_dependency_tree<S, I>(source: &S, root_ids: I) -> Result<DependencyTree, DependencyError>
where
    S: DependencySource + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut builder = TreeBuilder {
        source,
        path: HashSet::new(),
    };
    let mut roots = DependencyNode::default();

    for root_id in root_ids {
        let root_id = root_id.as_ref();
        if roots.contains(root_id) {
            debug!(package = %root_id, "skipping duplicate root package");
            continue;
        }
        let node = builder.expand(root_id)?;
        roots.insert(root_id.to_string(), node);
    }

    Ok(DependencyTree::new(roots))
}

struct TreeBuilder<'s, S: ?Sized> {
    source: &'s S,
    /// Packages on the current recursion stack.
    path: HashSet<PackageId>,
}

impl<S: DependencySource + ?Sized> TreeBuilder<'_, S> {
    fn expand(&mut self, id: &str) -> Result<DependencyNode, DependencyError> {
        let dependencies = self
            .source
            .dependencies(id)
            .ok_or_else(|| DependencyError::unknown_package(id))?;

        if !self.path.insert(id.to_string()) {
            return Err(DependencyError::cycle(id));
        }

        let mut node = DependencyNode::default();
        for dependency in dependencies {
            if node.contains(dependency) {
                continue;
            }
            let subtree = self.expand(dependency)?;
            node.insert(dependency.clone(), subtree);
        }

        self.path.remove(id);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(entries: &[(&str, &[&str])]) -> HashMap<PackageId, Vec<PackageId>> {
        entries
            .iter()
            .map(|(id, deps)| (id.to_string(), deps.iter().map(|dep| dep.to_string()).collect()))
            .collect()
    }

    fn tree_json(tree: &DependencyTree) -> serde_json::Value {
        serde_json::to_value(tree).expect("serialize tree")
    }

    #[test]
    fn single_package_without_dependencies() {
        let source = registry(&[("package1", &[])]);
        let tree = build_dependency_tree(&source, ["package1"]).expect("build");
        assert_eq!(tree_json(&tree), json!({ "package1": {} }));
    }

    #[test]
    fn package_with_a_dependency() {
        let source = registry(&[("package1", &["package2"]), ("package2", &[])]);
        let tree = build_dependency_tree(&source, ["package1"]).expect("build");
        assert_eq!(tree_json(&tree), json!({ "package1": { "package2": {} } }));
    }

    #[test]
    fn shared_dependencies_are_duplicated_per_branch() {
        let source = registry(&[
            ("package1", &["package2", "package3"]),
            ("package2", &["package3"]),
            ("package3", &[]),
        ]);
        let tree = build_dependency_tree(&source, ["package1"]).expect("build");
        assert_eq!(
            tree_json(&tree),
            json!({ "package1": { "package2": { "package3": {} }, "package3": {} } })
        );
    }

    #[test]
    fn diamond_dependency_appears_under_both_parents() {
        let source = registry(&[("app", &["left", "right"]), ("left", &["base"]), ("right", &["base"]), ("base", &[])]);
        let tree = build_dependency_tree(&source, ["app"]).expect("build");
        let app = tree.get("app").expect("app root");
        assert!(app.get("left").expect("left").contains("base"));
        assert!(app.get("right").expect("right").contains("base"));
    }

    #[test]
    fn children_follow_declaration_order() {
        let source = registry(&[("app", &["zeta", "alpha", "mid"]), ("zeta", &[]), ("alpha", &[]), ("mid", &[])]);
        let tree = build_dependency_tree(&source, ["app"]).expect("build");
        let children: Vec<&str> = tree.get("app").expect("app").keys().map(String::as_str).collect();
        assert_eq!(children, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn repeated_direct_dependency_expands_once() {
        let source = registry(&[("app", &["db", "db"]), ("db", &[])]);
        let tree = build_dependency_tree(&source, ["app"]).expect("build");
        assert_eq!(tree.get("app").expect("app").len(), 1);
    }

    #[test]
    fn duplicate_roots_are_placed_once() {
        let source = registry(&[("a", &[]), ("b", &[])]);
        let tree = build_dependency_tree(&source, ["a", "b", "a"]).expect("build");
        let roots: Vec<&str> = tree.root_ids().map(String::as_str).collect();
        assert_eq!(roots, vec!["a", "b"]);
    }

    #[test]
    fn empty_root_list_yields_empty_tree() {
        let source = registry(&[("a", &[])]);
        let tree = build_dependency_tree(&source, Vec::<String>::new()).expect("build");
        assert!(tree.is_empty());
        assert_eq!(tree_json(&tree), json!({}));
    }

    #[test]
    fn root_that_is_also_a_dependency_keeps_both_placements() {
        let source = registry(&[("app", &["db"]), ("db", &[])]);
        let tree = build_dependency_tree(&source, ["app", "db"]).expect("build");
        assert_eq!(tree_json(&tree), json!({ "app": { "db": {} }, "db": {} }));
    }

    #[test]
    fn circular_dependency_is_rejected() {
        let source = registry(&[("package1", &["package2"]), ("package2", &["package1"])]);
        let error = build_dependency_tree(&source, ["package1"]).expect_err("cycle");
        assert_eq!(error, DependencyError::cycle("package1"));
        assert_eq!(error.to_string(), "Circular dependency detected: package1 has already been visited.");
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let source = registry(&[("loop", &["loop"])]);
        let error = build_dependency_tree(&source, ["loop"]).expect_err("cycle");
        assert_eq!(error, DependencyError::cycle("loop"));
    }

    #[test]
    fn deep_cycle_names_a_member_of_the_cycle() {
        let source = registry(&[("entry", &["a"]), ("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        let error = build_dependency_tree(&source, ["entry"]).expect_err("cycle");
        assert!(["a", "b", "c"].contains(&error.package_id()), "unexpected cycle member: {error}");
    }

    #[test]
    fn cycle_outside_the_chosen_roots_is_ignored() {
        let source = registry(&[("app", &["db"]), ("db", &[]), ("ping", &["pong"]), ("pong", &["ping"])]);
        let tree = build_dependency_tree(&source, ["app"]).expect("unreachable cycle does not matter");
        assert_eq!(tree_json(&tree), json!({ "app": { "db": {} } }));
    }

    #[test]
    fn unknown_root_is_rejected() {
        let source = registry(&[("package1", &[])]);
        let error = build_dependency_tree(&source, ["nonExistentPackage"]).expect_err("unknown");
        assert_eq!(error.to_string(), "Invalid package ID: nonExistentPackage");
    }

    #[test]
    fn unknown_transitive_dependency_is_rejected() {
        let source = registry(&[("app", &["db"]), ("db", &["missing"])]);
        let error = build_dependency_tree(&source, ["app"]).expect_err("unknown");
        assert_eq!(error, DependencyError::unknown_package("missing"));
    }

    #[test]
    fn dependency_order_lists_dependencies_first_once() {
        let source = registry(&[
            ("package1", &["package2", "package3"]),
            ("package2", &["package3"]),
            ("package3", &[]),
            ("other", &["package3"]),
        ]);
        let tree = build_dependency_tree(&source, ["package1", "other"]).expect("build");
        assert_eq!(tree.dependency_order(), vec!["package3", "package2", "package1", "other"]);
    }

    #[test]
    fn tree_round_trips_through_nested_json() {
        let tree: DependencyTree = serde_json::from_value(json!({ "a": { "b": {}, "c": { "d": {} } } })).expect("parse tree");
        assert!(tree.get("a").expect("a").get("c").expect("c").contains("d"));
        assert!(tree.to_json_pretty().expect("render").contains("\"d\": {}"));
    }
}
