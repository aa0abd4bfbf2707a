//! Hierarchy context (spec §4.3: "a hierarchy context (`isParent(id)`,
//! `depth(id)`)") computed once per calculation pass and threaded through
//! the CPM phases, generalizing the teacher's repeated
//! `is_parent`/`get_depth` tree walks (`cpm.rs`) into a single precomputed
//! index.

use std::collections::{HashMap, HashSet};

use pls_core::Task;

/// Precomputed parent/child/depth relationships for one calculation pass.
pub struct Hierarchy {
    parent_ids: HashSet<String>,
    depths: HashMap<String, i32>,
    children: HashMap<String, Vec<String>>,
    max_depth: i32,
}

impl Hierarchy {
    pub fn build(tasks: &[Task]) -> Self {
        let mut parent_ids = HashSet::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for task in tasks {
            if let Some(parent) = &task.parent_id {
                parent_ids.insert(parent.clone());
                children.entry(parent.clone()).or_default().push(task.id.clone());
            }
        }

        let mut depths = HashMap::new();
        for task in tasks {
            let depth = Self::compute_depth(task.id.as_str(), tasks, &mut depths);
            depths.insert(task.id.clone(), depth);
        }
        let max_depth = depths.values().copied().max().unwrap_or(0);

        Hierarchy {
            parent_ids,
            depths,
            children,
            max_depth,
        }
    }

    fn compute_depth(id: &str, tasks: &[Task], memo: &mut HashMap<String, i32>) -> i32 {
        if let Some(d) = memo.get(id) {
            return *d;
        }
        let depth = match tasks.iter().find(|t| t.id == id).and_then(|t| t.parent_id.as_deref()) {
            Some(parent) => Self::compute_depth(parent, tasks, memo) + 1,
            None => 0,
        };
        memo.insert(id.to_string(), depth);
        depth
    }

    pub fn is_parent(&self, id: &str) -> bool {
        self.parent_ids.contains(id)
    }

    pub fn depth(&self, id: &str) -> i32 {
        self.depths.get(id).copied().unwrap_or(0)
    }

    pub fn max_depth(&self) -> i32 {
        self.max_depth
    }

    pub fn children_of<'a>(&'a self, id: &str) -> &'a [String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids at `depth`, restricted to those that are parents (summary tasks).
    pub fn parents_at_depth(&self, depth: i32) -> Vec<&str> {
        self.parent_ids
            .iter()
            .filter(|id| self.depths.get(id.as_str()) == Some(&depth))
            .map(String::as_str)
            .collect()
    }
}
