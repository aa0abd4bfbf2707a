//! Project-wide structural invariants (spec §3 Invariants 1-3).
//!
//! No direct teacher equivalent — `engine_state.rs` trusts its input. These
//! checks are the boundary validation spec §4.1/§7 require before any
//! calculation runs.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::task::Task;

/// Validate a full task set: unique ids, predecessors that exist, an
/// acyclic hierarchy, and an acyclic dependency graph.
pub fn validate_project(tasks: &[Task]) -> Result<()> {
    let mut by_id: HashMap<&str, &Task> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        if task.id.is_empty() {
            return Err(Error::EmptyTaskId);
        }
        if by_id.insert(task.id.as_str(), task).is_some() {
            return Err(Error::DuplicateTaskId(task.id.clone()));
        }
    }

    for task in tasks {
        for dep in &task.dependencies {
            if !by_id.contains_key(dep.id.as_str()) {
                return Err(Error::UnknownPredecessor(task.id.clone(), dep.id.clone()));
            }
        }
        if let Some(parent) = &task.parent_id {
            if !by_id.contains_key(parent.as_str()) {
                return Err(Error::UnknownPredecessor(task.id.clone(), parent.clone()));
            }
        }
    }

    for task in tasks {
        check_hierarchy_acyclic(task.id.as_str(), &by_id)?;
    }

    check_dependencies_acyclic(tasks, &by_id)?;

    Ok(())
}

fn check_hierarchy_acyclic(start: &str, by_id: &HashMap<&str, &Task>) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(start);
    let mut current = start;
    loop {
        let task = by_id
            .get(current)
            .expect("start id was validated to exist by caller");
        let Some(parent) = &task.parent_id else {
            return Ok(());
        };
        if parent.as_str() == start || !seen.insert(parent.as_str()) {
            return Err(Error::HierarchyCycle(start.to_string()));
        }
        current = parent.as_str();
    }
}

fn check_dependencies_acyclic(tasks: &[Task], by_id: &HashMap<&str, &Task>) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Task>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(Error::DependencyCycle(id.to_string())),
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        let task = by_id.get(id).expect("id validated by caller");
        for dep in &task.dependencies {
            visit(dep.id.as_str(), by_id, marks)?;
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for task in tasks {
        visit(task.id.as_str(), by_id, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Dependency;
    use crate::task::LinkType;

    fn task(id: &str, parent: Option<&str>) -> Task {
        let mut t = Task::new(id, "V", 1);
        t.parent_id = parent.map(String::from);
        t
    }

    #[test]
    fn accepts_valid_project() {
        let tasks = vec![task("a", None), task("b", Some("a"))];
        assert!(validate_project(&tasks).is_ok());
    }

    #[test]
    fn rejects_duplicate_id() {
        let tasks = vec![task("a", None), task("a", None)];
        assert!(matches!(
            validate_project(&tasks),
            Err(Error::DuplicateTaskId(_))
        ));
    }

    #[test]
    fn rejects_unknown_predecessor() {
        let mut b = task("b", None);
        b.dependencies.push(Dependency {
            id: "missing".into(),
            link_type: LinkType::FS,
            lag: 0,
        });
        assert!(matches!(
            validate_project(&[task("a", None), b]),
            Err(Error::UnknownPredecessor(_, _))
        ));
    }

    #[test]
    fn rejects_hierarchy_cycle() {
        let tasks = vec![task("a", Some("b")), task("b", Some("a"))];
        assert!(matches!(
            validate_project(&tasks),
            Err(Error::HierarchyCycle(_))
        ));
    }

    #[test]
    fn rejects_self_parent() {
        let tasks = vec![task("a", Some("a"))];
        assert!(matches!(
            validate_project(&tasks),
            Err(Error::HierarchyCycle(_))
        ));
    }

    #[test]
    fn rejects_dependency_cycle() {
        let mut a = task("a", None);
        let mut b = task("b", None);
        a.dependencies.push(Dependency {
            id: "b".into(),
            link_type: LinkType::FS,
            lag: 0,
        });
        b.dependencies.push(Dependency {
            id: "a".into(),
            link_type: LinkType::FS,
            lag: 0,
        });
        assert!(matches!(
            validate_project(&[a, b]),
            Err(Error::DependencyCycle(_))
        ));
    }
}
