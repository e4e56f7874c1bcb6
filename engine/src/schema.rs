//! Schema definition and operation validation.
//!
//! The schema declares which collection properties an object type carries
//! and what element type each holds. Remote operations are validated against
//! it before they are sequenced.

use crate::{
    error::Result, operation::OperationKind, Error, Operation, PropertyName, SchemaVersion,
    ValueType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of collection a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    List,
    Set,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKind::List => write!(f, "list"),
            CollectionKind::Set => write!(f, "set"),
        }
    }
}

/// Definition of a collection property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    /// Property name
    pub name: PropertyName,
    /// List or set
    pub kind: CollectionKind,
    /// Element type
    pub element: ValueType,
}

impl PropertyDef {
    /// An ordered list property.
    pub fn list(name: impl Into<PropertyName>, element: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::List,
            element,
        }
    }

    /// An unordered set property.
    pub fn set(name: impl Into<PropertyName>, element: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Set,
            element,
        }
    }
}

/// Schema for one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    /// Object type name
    pub name: String,
    /// Collection properties by name
    pub properties: BTreeMap<PropertyName, PropertyDef>,
}

impl ObjectSchema {
    /// Create an object schema from its properties.
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDef>) -> Self {
        Self {
            name: name.into(),
            properties: properties
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    /// An object type with `<type>List`, `<type>Set` and `other<Type>Set`
    /// for every element type.
    pub fn all_collection_types(name: impl Into<String>) -> Self {
        let mut properties = Vec::with_capacity(ValueType::ALL.len() * 3);
        for element in ValueType::ALL {
            let prefix = element.name();
            properties.push(PropertyDef::list(format!("{prefix}List"), element));
            properties.push(PropertyDef::set(format!("{prefix}Set"), element));
            properties.push(PropertyDef::set(
                format!("other{}Set", capitalize(prefix)),
                element,
            ));
        }
        Self::new(name, properties)
    }

    /// Look up a property of the given kind.
    pub fn property(&self, name: &str, kind: CollectionKind) -> Result<&PropertyDef> {
        match self.properties.get(name) {
            Some(def) if def.kind == kind => Ok(def),
            Some(def) => Err(Error::TypeMismatch {
                property: name.to_string(),
                expected: kind.to_string(),
                got: def.kind.to_string(),
            }),
            None => Err(Error::PropertyNotFound {
                object_type: self.name.clone(),
                property: name.to_string(),
            }),
        }
    }

    /// Validate a value against a property's element type.
    pub fn check_value(&self, def: &PropertyDef, value: &crate::Value) -> Result<()> {
        if def.element.accepts(value) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                property: def.name.clone(),
                expected: def.element.to_string(),
                got: value.type_name().to_string(),
            })
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Schema for a partition.
///
/// Every object in a partition shares the one object type; primary keys
/// distinguish instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema version
    pub version: SchemaVersion,
    /// The synchronized object type
    pub object: ObjectSchema,
}

impl Schema {
    /// Create a new schema.
    pub fn new(version: SchemaVersion, object: ObjectSchema) -> Self {
        Self { version, object }
    }

    /// Schema holding every list/set/other-set combination.
    pub fn collection_sync_object() -> Self {
        Self::new(
            1,
            ObjectSchema::all_collection_types("CollectionSyncObject"),
        )
    }

    /// Validate an operation's shape against the schema.
    ///
    /// This checks property names, kinds and element types only; references
    /// to element ids are checked against state during replay.
    pub fn validate_operation(&self, op: &Operation) -> Result<()> {
        let object = &self.object;
        match &op.kind {
            OperationKind::CreateObject | OperationKind::DeleteObject => Ok(()),
            OperationKind::ListAppend { property, values } => {
                let def = object.property(property, CollectionKind::List)?;
                values.iter().try_for_each(|v| object.check_value(def, v))
            }
            OperationKind::ListSet {
                property, value, ..
            } => {
                let def = object.property(property, CollectionKind::List)?;
                object.check_value(def, value)
            }
            OperationKind::ListRemove { property, elements } => {
                object.property(property, CollectionKind::List)?;
                if elements.is_empty() {
                    return Err(Error::MalformedOperation(
                        "list removal names no elements".into(),
                    ));
                }
                Ok(())
            }
            OperationKind::ListClear { property } => {
                object.property(property, CollectionKind::List).map(|_| ())
            }
            OperationKind::SetClear { property } => {
                object.property(property, CollectionKind::Set).map(|_| ())
            }
            OperationKind::SetInsert { property, values }
            | OperationKind::SetRemove { property, values } => {
                let def = object.property(property, CollectionKind::Set)?;
                values.iter().try_for_each(|v| object.check_value(def, v))
            }
            OperationKind::SetIntersect { property, other }
            | OperationKind::SetUnion { property, other }
            | OperationKind::SetSubtract { property, other } => {
                let def = object.property(property, CollectionKind::Set)?;
                let other_def = object.property(other, CollectionKind::Set)?;
                if def.element != other_def.element {
                    return Err(Error::TypeMismatch {
                        property: other.clone(),
                        expected: def.element.to_string(),
                        got: other_def.element.to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogicalClock, Value};

    fn op(kind: OperationKind) -> Operation {
        Operation::new(LogicalClock::with_counter("child", 1), 1000, "pk", kind)
    }

    #[test]
    fn all_collection_types_names() {
        let schema = ObjectSchema::all_collection_types("Obj");
        assert_eq!(schema.properties.len(), 30);
        assert!(schema.property("intList", CollectionKind::List).is_ok());
        assert!(schema.property("objectIdSet", CollectionKind::Set).is_ok());
        assert!(schema.property("otherObjectIdSet", CollectionKind::Set).is_ok());
        assert!(schema.property("otherAnySet", CollectionKind::Set).is_ok());
        assert_eq!(
            schema.properties["decimalList"].element,
            ValueType::Decimal
        );
    }

    #[test]
    fn property_kind_mismatch() {
        let schema = ObjectSchema::all_collection_types("Obj");
        let err = schema.property("intList", CollectionKind::Set).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let err = schema.property("nope", CollectionKind::List).unwrap_err();
        assert!(matches!(err, Error::PropertyNotFound { .. }));
    }

    #[test]
    fn validate_list_append_types() {
        let schema = Schema::collection_sync_object();
        let ok = op(OperationKind::ListAppend {
            property: "intList".into(),
            values: vec![Value::Int(1), Value::Int(2)],
        });
        assert!(schema.validate_operation(&ok).is_ok());

        let bad = op(OperationKind::ListAppend {
            property: "intList".into(),
            values: vec![Value::Int(1), Value::from("two")],
        });
        assert!(matches!(
            schema.validate_operation(&bad),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn validate_null_only_in_any() {
        let schema = Schema::collection_sync_object();
        let typed = op(OperationKind::SetInsert {
            property: "stringSet".into(),
            values: vec![Value::Null],
        });
        assert!(schema.validate_operation(&typed).is_err());

        let any = op(OperationKind::SetInsert {
            property: "anySet".into(),
            values: vec![Value::Null],
        });
        assert!(schema.validate_operation(&any).is_ok());
    }

    #[test]
    fn validate_set_algebra_operand_types() {
        let schema = Schema::collection_sync_object();
        let ok = op(OperationKind::SetIntersect {
            property: "intSet".into(),
            other: "otherIntSet".into(),
        });
        assert!(schema.validate_operation(&ok).is_ok());

        let bad = op(OperationKind::SetUnion {
            property: "intSet".into(),
            other: "otherStringSet".into(),
        });
        assert!(schema.validate_operation(&bad).is_err());

        let list_operand = op(OperationKind::SetSubtract {
            property: "intSet".into(),
            other: "intList".into(),
        });
        assert!(schema.validate_operation(&list_operand).is_err());
    }

    #[test]
    fn validate_empty_removal() {
        let schema = Schema::collection_sync_object();
        let bad = op(OperationKind::ListRemove {
            property: "intList".into(),
            elements: vec![],
        });
        assert!(matches!(
            schema.validate_operation(&bad),
            Err(Error::MalformedOperation(_))
        ));
    }

    #[test]
    fn schema_serialization() {
        let schema = Schema::collection_sync_object();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }
}
