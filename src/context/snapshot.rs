use crate::core::Value;
use crate::metadata::{Entity, EntityMeta};
use std::collections::{BTreeMap, BTreeSet};

/// Property values of an entity captured at a point in time.
///
/// The snapshot owns its values; later mutation of the entity does not
/// reach it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<&'static str, Value>,
}

impl Snapshot {
    pub fn capture<T: Entity>(meta: &EntityMeta<T>, entity: &T) -> Self {
        let values = meta
            .properties()
            .iter()
            .map(|property| (property.name(), property.get(entity)))
            .collect();
        Self { values }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    /// Names of properties whose values differ between the two snapshots.
    ///
    /// A property present on one side only compares against `NULL`.
    pub fn diff(&self, current: &Snapshot) -> BTreeSet<&'static str> {
        let null = Value::Null;
        self.values
            .keys()
            .chain(current.values.keys())
            .copied()
            .filter(|name| {
                let before = self.values.get(name).unwrap_or(&null);
                let after = current.values.get(name).unwrap_or(&null);
                before != after
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Result};
    use crate::metadata::{IdentityValue, PersistValue, PropertyAccessor};

    #[derive(Debug, Clone, Default)]
    struct Note {
        id: i64,
        body: String,
        pinned: bool,
    }

    impl Entity for Note {
        fn entity_meta() -> Result<EntityMeta<Self>> {
            EntityMeta::builder("Note")
                .id("id", "id", |n: &Note| n.id.identity(), |n: &mut Note, id| n.id = id)
                .property(PropertyAccessor::new(
                    "body",
                    "body",
                    DataType::Text,
                    false,
                    |n: &Note| n.body.to_value(),
                    |n: &mut Note, v| {
                        n.body = PersistValue::from_value(v)?;
                        Ok(())
                    },
                ))
                .property(PropertyAccessor::new(
                    "pinned",
                    "pinned",
                    DataType::Boolean,
                    false,
                    |n: &Note| n.pinned.to_value(),
                    |n: &mut Note, v| {
                        n.pinned = PersistValue::from_value(v)?;
                        Ok(())
                    },
                ))
                .build()
        }
    }

    #[test]
    fn test_capture_is_detached_from_entity() {
        let meta = Note::entity_meta().unwrap();
        let mut note = Note { id: 1, body: "draft".into(), pinned: false };
        let before = Snapshot::capture(&meta, &note);

        note.body = "final".into();
        assert_eq!(before.get("body"), Some(&Value::Text("draft".into())));

        let after = Snapshot::capture(&meta, &note);
        assert_eq!(before.diff(&after).into_iter().collect::<Vec<_>>(), vec!["body"]);
        assert!(after.diff(&Snapshot::capture(&meta, &note)).is_empty());
    }

    #[test]
    fn test_diff_reports_every_changed_property_once() {
        let meta = Note::entity_meta().unwrap();
        let a = Snapshot::capture(&meta, &Note { id: 1, body: "a".into(), pinned: false });
        let b = Snapshot::capture(&meta, &Note { id: 1, body: "b".into(), pinned: true });
        let changed: Vec<_> = a.diff(&b).into_iter().collect();
        assert_eq!(changed, vec!["body", "pinned"]);
        assert!(a.diff(&Snapshot::default()).contains("pinned"));
    }
}
