use std::collections::{BTreeMap, HashSet};

use crate::bus::BusSnapshot;
use crate::errors::StartError;
use crate::function::{Function, FunctionId};
use crate::patch::Patch;

/// Check that `root` and everything it can start is runnable: every
/// fixture, bus and child exists and the graph has no cycles.
pub(crate) fn validate_tree(
    functions: &BTreeMap<FunctionId, Function>,
    patch: &Patch,
    buses: &BusSnapshot,
    root: FunctionId,
) -> Result<(), StartError> {
    if !functions.contains_key(&root) {
        return Err(StartError::UnknownFunction(root));
    }

    let mut path = Vec::new();
    let mut done = HashSet::new();
    visit(functions, patch, buses, root, &mut path, &mut done)
}

fn visit(
    functions: &BTreeMap<FunctionId, Function>,
    patch: &Patch,
    buses: &BusSnapshot,
    id: FunctionId,
    path: &mut Vec<FunctionId>,
    done: &mut HashSet<FunctionId>,
) -> Result<(), StartError> {
    if path.contains(&id) {
        return Err(StartError::RecursiveReference(id));
    }
    if done.contains(&id) {
        return Ok(());
    }

    let function = functions.get(&id).ok_or(StartError::UnknownFunction(id))?;
    function.validate(patch, buses)?;

    path.push(id);
    for child in function.children() {
        if !functions.contains_key(&child) {
            return Err(StartError::MissingChild {
                function_id: id,
                child_id: child,
            });
        }
        visit(functions, patch, buses, child, path, done)?;
    }
    path.pop();

    done.insert(id);
    Ok(())
}

/// Number of instances starting `root` creates right away.
pub(crate) fn initial_instance_count(
    functions: &BTreeMap<FunctionId, Function>,
    root: FunctionId,
) -> usize {
    use crate::function::FunctionKind;

    let Some(function) = functions.get(&root) else {
        return 0;
    };
    let children = match &function.kind {
        FunctionKind::Scene(_) => 0,
        FunctionKind::Chaser(chaser) => {
            let first = match chaser.direction {
                crate::function::Direction::Forward => chaser.steps.first(),
                crate::function::Direction::Backward => chaser.steps.last(),
            };
            first.map_or(0, |step| initial_instance_count(functions, step.function_id))
        }
        FunctionKind::Efx(efx) if efx.fixtures.is_empty() => 0,
        FunctionKind::Efx(efx) => efx
            .start_scene
            .map_or(0, |scene| initial_instance_count(functions, scene)),
        FunctionKind::Collection(collection) => collection
            .members
            .iter()
            .map(|member| initial_instance_count(functions, *member))
            .sum(),
    };
    1 + children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusRegistry;
    use crate::function::{Chaser, ChaserStep, Collection, Scene};

    fn functions(list: Vec<Function>) -> BTreeMap<FunctionId, Function> {
        list.into_iter().map(|f| (f.id, f)).collect()
    }

    #[test]
    fn test_detects_cycles() {
        let functions = functions(vec![
            Function::chaser(1, "A", Chaser::new(vec![ChaserStep::new(2)])),
            Function::collection(2, "B", Collection::new(vec![3])),
            Function::chaser(3, "C", Chaser::new(vec![ChaserStep::new(1)])),
            Function::collection(4, "Self", Collection::new(vec![4])),
        ]);
        let buses = BusRegistry::new().snapshot();
        let patch = Patch::new();

        assert_eq!(
            validate_tree(&functions, &patch, &buses, 1),
            Err(StartError::RecursiveReference(1))
        );
        assert_eq!(
            validate_tree(&functions, &patch, &buses, 4),
            Err(StartError::RecursiveReference(4))
        );
    }

    #[test]
    fn test_shared_children_are_not_cycles() {
        let functions = functions(vec![
            Function::scene(1, "Look", Scene::new()),
            Function::chaser(2, "A", Chaser::new(vec![ChaserStep::new(1), ChaserStep::new(1)])),
            Function::collection(3, "Both", Collection::new(vec![1, 2])),
        ]);
        let buses = BusRegistry::new().snapshot();
        assert!(validate_tree(&functions, &Patch::new(), &buses, 3).is_ok());
        assert_eq!(initial_instance_count(&functions, 3), 4);
    }

    #[test]
    fn test_missing_child() {
        let functions = functions(vec![Function::collection(
            1,
            "Group",
            Collection::new(vec![9]),
        )]);
        let buses = BusRegistry::new().snapshot();
        assert_eq!(
            validate_tree(&functions, &Patch::new(), &buses, 1),
            Err(StartError::MissingChild {
                function_id: 1,
                child_id: 9
            })
        );
        assert_eq!(
            validate_tree(&functions, &Patch::new(), &buses, 2),
            Err(StartError::UnknownFunction(2))
        );
    }
}
