use crate::domain::models::DepartmentNode;
use std::collections::HashSet;
use uuid::Uuid;

/// Resolve which departments an HOD may act on.
///
/// Starts from every active department that explicitly lists the HOD, then
/// walks down the tree, descending into a sub-department only when the HOD is
/// explicitly listed on it too. Membership is never inherited: being HOD of a
/// parent grants nothing on an unlisted child.
pub fn resolve_hod_scope(departments: &[DepartmentNode], hod_id: Uuid) -> Vec<Uuid> {
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut scope: Vec<Uuid> = Vec::new();

    let roots: Vec<&DepartmentNode> = departments
        .iter()
        .filter(|d| d.is_active && d.hod_ids.contains(&hod_id))
        .collect();

    for root in roots {
        walk(departments, root, hod_id, &mut visited, &mut scope);
    }

    scope.sort();
    scope
}

fn walk(
    departments: &[DepartmentNode],
    node: &DepartmentNode,
    hod_id: Uuid,
    visited: &mut HashSet<Uuid>,
    scope: &mut Vec<Uuid>,
) {
    if !visited.insert(node.id) {
        return;
    }
    scope.push(node.id);

    for child in departments
        .iter()
        .filter(|d| d.parent_id == Some(node.id) && d.is_active)
    {
        if child.hod_ids.contains(&hod_id) {
            walk(departments, child, hod_id, visited, scope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(
        id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
        hod_ids: Vec<Uuid>,
        is_active: bool,
    ) -> DepartmentNode {
        DepartmentNode {
            id,
            name: name.to_string(),
            parent_id,
            hod_ids,
            is_active,
        }
    }

    #[test]
    fn listed_parent_does_not_pull_in_unlisted_child() {
        let hod = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        let tree = vec![
            dept(parent, "Engineering", None, vec![hod], true),
            dept(child, "Platform", Some(parent), vec![], true),
        ];

        let scope = resolve_hod_scope(&tree, hod);
        assert!(scope.contains(&parent));
        assert!(!scope.contains(&child));
    }

    #[test]
    fn listed_child_is_included_through_traversal() {
        let hod = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        let grandchild = Uuid::new_v4();
        let tree = vec![
            dept(parent, "Engineering", None, vec![hod], true),
            dept(child, "Platform", Some(parent), vec![hod], true),
            dept(grandchild, "Infra", Some(child), vec![], true),
        ];

        let scope = resolve_hod_scope(&tree, hod);
        assert!(scope.contains(&parent));
        assert!(scope.contains(&child));
        assert!(!scope.contains(&grandchild));
    }

    #[test]
    fn detached_listed_department_is_its_own_root() {
        let hod = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        // HOD listed only on the child; the unlisted parent stays out.
        let tree = vec![
            dept(parent, "Engineering", None, vec![], true),
            dept(child, "Platform", Some(parent), vec![hod], true),
        ];

        let scope = resolve_hod_scope(&tree, hod);
        assert_eq!(scope, vec![child]);
    }

    #[test]
    fn inactive_departments_are_skipped() {
        let hod = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let tree = vec![
            dept(a, "Sales", None, vec![hod], false),
            dept(b, "Marketing", None, vec![hod], true),
        ];

        let scope = resolve_hod_scope(&tree, hod);
        assert_eq!(scope, vec![b]);
    }

    #[test]
    fn no_duplicates_for_multiply_reachable_departments() {
        let hod = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let tree = vec![
            dept(a, "Ops", None, vec![hod], true),
            dept(b, "SRE", Some(a), vec![hod], true),
        ];

        let scope = resolve_hod_scope(&tree, hod);
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn unlisted_hod_gets_empty_scope() {
        let tree = vec![dept(Uuid::new_v4(), "Finance", None, vec![Uuid::new_v4()], true)];
        assert!(resolve_hod_scope(&tree, Uuid::new_v4()).is_empty());
    }
}
