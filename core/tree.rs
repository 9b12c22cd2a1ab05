use log;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

const LAST_CONNECTOR: &str = "└── ";
const MIDDLE_CONNECTOR: &str = "├── ";
const LAST_INDENT: &str = "    ";
const MIDDLE_INDENT: &str = "│   ";

/// Orders `/`-separated relative paths segment by segment, so a directory's
/// descendants always sort directly after it.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Draws the tree with box-drawing connectors. The root is drawn in the
    /// last-child position with an empty prefix.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, "", true);
        out
    }

    fn render_into(&self, out: &mut String, prefix: &str, is_last: bool) {
        out.push_str(prefix);
        out.push_str(if is_last { LAST_CONNECTOR } else { MIDDLE_CONNECTOR });
        out.push_str(&self.name);
        out.push('\n');

        let child_prefix = format!(
            "{}{}",
            prefix,
            if is_last { LAST_INDENT } else { MIDDLE_INDENT }
        );
        let last_index = self.children.len().saturating_sub(1);
        for (i, child) in self.children.iter().enumerate() {
            child.render_into(out, &child_prefix, i == last_index);
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTree {
    pub root: TreeNode,
    pub directories: usize,
    pub files: usize,
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

fn label_of(path: &str) -> &str {
    if path.is_empty() {
        "."
    } else {
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Parent-to-children adjacency keyed by relative path. `""` is the root.
struct Adjacency {
    children: BTreeMap<String, Vec<String>>,
    nodes: Vec<String>,
}

fn link_paths<S: AsRef<str>>(paths: &[S]) -> Adjacency {
    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut linked: HashSet<String> = HashSet::new();
    let mut nodes = Vec::new();

    for path in paths {
        let mut current = path.as_ref().trim_matches('/');
        // Walk up until an already-linked ancestor is reached, linking each
        // implied directory exactly once.
        while !current.is_empty() && linked.insert(current.to_string()) {
            let parent = parent_of(current);
            children
                .entry(parent.to_string())
                .or_default()
                .push(current.to_string());
            nodes.push(current.to_string());
            current = parent;
        }
    }

    for list in children.values_mut() {
        list.sort_by(|a, b| compare_paths(a, b));
    }
    Adjacency { children, nodes }
}

fn build_recursive(current: &str, adjacency: &Adjacency) -> TreeNode {
    let children = adjacency
        .children
        .get(current)
        .map(|list| {
            list.iter()
                .map(|child| build_recursive(child, adjacency))
                .collect()
        })
        .unwrap_or_default();
    TreeNode {
        name: label_of(current).to_string(),
        children,
    }
}

/// Assembles the hierarchy for `paths` (relative, `/`-separated) under a
/// synthetic `.` root. Ancestor directories need not be listed.
pub fn assemble_tree<S: AsRef<str>>(paths: &[S]) -> TreeNode {
    build_recursive("", &link_paths(paths))
}

/// Assembles the tree and counts directories and files by stating every
/// node under `project_root`. Nodes that cannot be stated are not counted.
pub fn build_file_tree<S: AsRef<str>>(project_root: &Path, paths: &[S]) -> FileTree {
    log::debug!("Building tree structure from {} paths...", paths.len());
    let adjacency = link_paths(paths);

    let mut directories = 0;
    let mut files = 0;
    for node in &adjacency.nodes {
        match fs::metadata(project_root.join(node)) {
            Ok(metadata) if metadata.is_dir() => directories += 1,
            Ok(metadata) if metadata.is_file() => files += 1,
            Ok(_) => {}
            Err(e) => log::debug!("Could not stat tree node {}: {}", node, e),
        }
    }

    let root = build_recursive("", &adjacency);
    log::debug!(
        "Tree structure built: {} directories, {} files.",
        directories,
        files
    );
    FileTree {
        root,
        directories,
        files,
    }
}
