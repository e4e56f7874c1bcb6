//! Partition state and the per-operation merge rules.
//!
//! [`PartitionState::apply`] is the single place where an operation changes
//! state. Replicas and the service both derive their state by calling it on
//! the sequenced log in order, which is what makes them converge.

use crate::{
    error::Result, object::Origin, operation::OperationKind, Error, Operation, PrimaryKey,
    Schema, SyncObject,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of applying one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// State changed
    Applied,
    /// Valid operation that lost a conflict and has no effect
    Discarded(String),
}

/// All objects of one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionState {
    objects: BTreeMap<PrimaryKey, SyncObject>,
}

impl PartitionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<&SyncObject> {
        self.objects.get(key)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SyncObject> {
        self.objects.values()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Apply one operation.
    ///
    /// Returns `Err` for operations that are malformed against the schema or
    /// the current state; those must never be sequenced. Conflicts that make a
    /// valid operation ineffective return [`ApplyOutcome::Discarded`].
    pub fn apply(&mut self, schema: &Schema, op: &Operation, origin: Origin) -> Result<ApplyOutcome> {
        schema.validate_operation(op)?;

        match &op.kind {
            OperationKind::CreateObject => {
                if self.objects.contains_key(&op.object) {
                    return Ok(ApplyOutcome::Discarded("object already exists".into()));
                }
                let object = SyncObject::new(
                    op.object.clone(),
                    &schema.object,
                    op.timestamp,
                    op.clock.clone(),
                    origin,
                );
                self.objects.insert(op.object.clone(), object);
                return Ok(ApplyOutcome::Applied);
            }
            OperationKind::DeleteObject => {
                return Ok(match self.objects.remove(&op.object) {
                    Some(_) => ApplyOutcome::Applied,
                    None => ApplyOutcome::Discarded("object already deleted".into()),
                });
            }
            _ => {}
        }

        let Some(object) = self.objects.get_mut(&op.object) else {
            return Ok(ApplyOutcome::Discarded(format!(
                "object {} does not exist",
                op.object
            )));
        };

        let outcome = apply_to_object(object, op)?;
        if outcome == ApplyOutcome::Applied {
            object
                .metadata
                .touch(op.timestamp, op.clock.clone(), origin);
        }
        Ok(outcome)
    }
}

fn apply_to_object(object: &mut SyncObject, op: &Operation) -> Result<ApplyOutcome> {
    match &op.kind {
        // Lifecycle is handled by PartitionState::apply before reaching here.
        OperationKind::CreateObject | OperationKind::DeleteObject => Ok(ApplyOutcome::Discarded(
            format!("{} does not target a collection", op.kind.name()),
        )),
        OperationKind::ListAppend { property, values } => {
            let list = object.list_mut(property);
            for (id, value) in op.created_elements().into_iter().zip(values) {
                list.push(id, value.clone());
            }
            Ok(ApplyOutcome::Applied)
        }
        OperationKind::ListSet {
            property,
            element,
            value,
        } => {
            let list = object.list_mut(property);
            if list.replace(element, value.clone()) {
                Ok(ApplyOutcome::Applied)
            } else if list.is_removed(element) {
                Ok(ApplyOutcome::Discarded(format!(
                    "element {element} was removed"
                )))
            } else {
                Err(Error::MalformedOperation(format!(
                    "unknown element {element} in {property}"
                )))
            }
        }
        OperationKind::ListRemove { property, elements } => {
            let list = object.list_mut(property);
            if let Some(unknown) = elements.iter().find(|id| !list.knows(id)) {
                return Err(Error::MalformedOperation(format!(
                    "unknown element {unknown} in {property}"
                )));
            }
            if list.remove(elements) == 0 {
                Ok(ApplyOutcome::Discarded("elements already removed".into()))
            } else {
                Ok(ApplyOutcome::Applied)
            }
        }
        OperationKind::ListClear { property } => {
            object.list_mut(property).clear();
            Ok(ApplyOutcome::Applied)
        }
        OperationKind::SetInsert { property, values } => {
            object.set_mut(property).insert(values.iter().cloned());
            Ok(ApplyOutcome::Applied)
        }
        OperationKind::SetRemove { property, values } => {
            object.set_mut(property).remove(values);
            Ok(ApplyOutcome::Applied)
        }
        OperationKind::SetClear { property } => {
            object.set_mut(property).clear();
            Ok(ApplyOutcome::Applied)
        }
        OperationKind::SetIntersect { property, other }
        | OperationKind::SetUnion { property, other }
        | OperationKind::SetSubtract { property, other } => {
            // Resolved against the operand's state at this point of the order.
            let operand = object.set(other).cloned().unwrap_or_default();
            let set = object.set_mut(property);
            match &op.kind {
                OperationKind::SetIntersect { .. } => set.intersect_with(&operand),
                OperationKind::SetUnion { .. } => set.union_with(&operand),
                _ => set.subtract(&operand),
            }
            Ok(ApplyOutcome::Applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementId, LogicalClock, Value};

    fn op(node: &str, counter: u64, kind: OperationKind) -> Operation {
        Operation::new(LogicalClock::with_counter(node, counter), 1000, "pk", kind)
    }

    fn with_object() -> (Schema, PartitionState) {
        let schema = Schema::collection_sync_object();
        let mut state = PartitionState::new();
        state
            .apply(&schema, &op("child", 1, OperationKind::CreateObject), Origin::Remote)
            .unwrap();
        (schema, state)
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn int_list(state: &PartitionState) -> Vec<Value> {
        state.object("pk").unwrap().list("intList").unwrap().to_vec()
    }

    #[test]
    fn create_is_idempotent() {
        let (schema, mut state) = with_object();
        let outcome = state
            .apply(&schema, &op("parent", 1, OperationKind::CreateObject), Origin::Local)
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Discarded(_)));
        assert_eq!(state.object_count(), 1);
    }

    #[test]
    fn operations_on_deleted_object_are_discarded() {
        let (schema, mut state) = with_object();
        state
            .apply(&schema, &op("parent", 2, OperationKind::DeleteObject), Origin::Remote)
            .unwrap();
        let outcome = state
            .apply(
                &schema,
                &op(
                    "child",
                    3,
                    OperationKind::ListAppend {
                        property: "intList".into(),
                        values: ints(&[1]),
                    },
                ),
                Origin::Remote,
            )
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Discarded(_)));
        assert_eq!(state.object_count(), 0);
    }

    #[test]
    fn concurrent_appends_ordered_by_application() {
        let (schema, mut state) = with_object();
        let a = op(
            "child",
            2,
            OperationKind::ListAppend {
                property: "intList".into(),
                values: ints(&[1, 2]),
            },
        );
        let b = op(
            "parent",
            2,
            OperationKind::ListAppend {
                property: "intList".into(),
                values: ints(&[9]),
            },
        );
        state.apply(&schema, &b, Origin::Remote).unwrap();
        state.apply(&schema, &a, Origin::Remote).unwrap();
        assert_eq!(int_list(&state), ints(&[9, 1, 2]));
    }

    #[test]
    fn replace_of_removed_element_is_discarded() {
        let (schema, mut state) = with_object();
        let append = op(
            "child",
            2,
            OperationKind::ListAppend {
                property: "intList".into(),
                values: ints(&[1, 2, 3]),
            },
        );
        state.apply(&schema, &append, Origin::Remote).unwrap();
        let ids = append.created_elements();

        let remove = op(
            "child",
            3,
            OperationKind::ListRemove {
                property: "intList".into(),
                elements: vec![ids[0].clone(), ids[1].clone()],
            },
        );
        let replace_removed = op(
            "parent",
            3,
            OperationKind::ListSet {
                property: "intList".into(),
                element: ids[1].clone(),
                value: Value::Int(20),
            },
        );
        let replace_survivor = op(
            "parent",
            4,
            OperationKind::ListSet {
                property: "intList".into(),
                element: ids[2].clone(),
                value: Value::Int(30),
            },
        );

        state.apply(&schema, &remove, Origin::Remote).unwrap();
        let outcome = state.apply(&schema, &replace_removed, Origin::Remote).unwrap();
        assert!(matches!(outcome, ApplyOutcome::Discarded(_)));
        state.apply(&schema, &replace_survivor, Origin::Remote).unwrap();

        // The survivor is replaced at its post-removal index.
        assert_eq!(int_list(&state), ints(&[30]));
    }

    #[test]
    fn last_replace_wins() {
        let (schema, mut state) = with_object();
        let append = op(
            "child",
            2,
            OperationKind::ListAppend {
                property: "intList".into(),
                values: ints(&[1]),
            },
        );
        state.apply(&schema, &append, Origin::Remote).unwrap();
        let id = append.created_elements().remove(0);

        for (node, value) in [("child", 5), ("parent", 6)] {
            let set = op(
                node,
                3,
                OperationKind::ListSet {
                    property: "intList".into(),
                    element: id.clone(),
                    value: Value::Int(value),
                },
            );
            state.apply(&schema, &set, Origin::Remote).unwrap();
        }
        assert_eq!(int_list(&state), ints(&[6]));
    }

    #[test]
    fn unknown_element_is_malformed() {
        let (schema, mut state) = with_object();
        let bogus = ElementId::new(LogicalClock::with_counter("ghost", 99), 0);
        let result = state.apply(
            &schema,
            &op(
                "child",
                2,
                OperationKind::ListRemove {
                    property: "intList".into(),
                    elements: vec![bogus],
                },
            ),
            Origin::Remote,
        );
        assert!(matches!(result, Err(Error::MalformedOperation(_))));
    }

    #[test]
    fn intersect_uses_operand_state_at_apply_time() {
        let (schema, mut state) = with_object();
        let insert = |counter, property: &str, values: &[i64]| {
            op(
                "child",
                counter,
                OperationKind::SetInsert {
                    property: property.into(),
                    values: ints(values),
                },
            )
        };
        state.apply(&schema, &insert(2, "intSet", &[1, 2, 3]), Origin::Remote).unwrap();
        state.apply(&schema, &insert(3, "otherIntSet", &[3, 4, 5]), Origin::Remote).unwrap();
        state
            .apply(
                &schema,
                &op(
                    "parent",
                    4,
                    OperationKind::SetIntersect {
                        property: "intSet".into(),
                        other: "otherIntSet".into(),
                    },
                ),
                Origin::Remote,
            )
            .unwrap();

        let object = state.object("pk").unwrap();
        assert_eq!(object.set("intSet").unwrap().to_vec(), ints(&[3]));
        assert_eq!(object.set("otherIntSet").unwrap().len(), 3);
    }

    #[test]
    fn clear_then_insert_keeps_insert() {
        let (schema, mut state) = with_object();
        let clear = op(
            "child",
            2,
            OperationKind::SetClear {
                property: "intSet".into(),
            },
        );
        let insert = op(
            "parent",
            2,
            OperationKind::SetInsert {
                property: "intSet".into(),
                values: ints(&[7]),
            },
        );
        state.apply(&schema, &clear, Origin::Remote).unwrap();
        state.apply(&schema, &insert, Origin::Remote).unwrap();
        assert_eq!(state.object("pk").unwrap().set("intSet").unwrap().len(), 1);

        state.apply(&schema, &clear, Origin::Remote).unwrap();
        assert!(state.object("pk").unwrap().set("intSet").unwrap().is_empty());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let (schema, mut state) = with_object();
        let result = state.apply(
            &schema,
            &op(
                "child",
                2,
                OperationKind::SetInsert {
                    property: "uuidSet".into(),
                    values: ints(&[1]),
                },
            ),
            Origin::Remote,
        );
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }
}
