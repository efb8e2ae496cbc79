use super::{Entity, EntityMeta};
use crate::core::{PersistenceError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{Level, event};

/// The entity kinds a session knows how to persist.
///
/// Registration builds the accessor table once; every later operation looks
/// it up by type. Types that were never registered are rejected with
/// [`PersistenceError::InvalidEntityKind`].
#[derive(Default)]
pub struct EntityRegistry {
    metas: HashMap<TypeId, Rc<dyn Any>>,
    names: HashMap<&'static str, TypeId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its metadata. Registering twice is a no-op.
    pub fn register<T: Entity>(&mut self) -> Result<Rc<EntityMeta<T>>> {
        if let Ok(meta) = self.meta::<T>() {
            return Ok(meta);
        }

        let meta = Rc::new(T::entity_meta()?);
        let name = meta.entity_name();
        if self.names.contains_key(name) {
            return Err(PersistenceError::Config(format!(
                "entity name '{}' is already registered by another type",
                name
            )));
        }

        event!(
            Level::DEBUG,
            entity = name,
            table = meta.table().table_name(),
            "entity registered"
        );
        self.names.insert(name, TypeId::of::<T>());
        self.metas
            .insert(TypeId::of::<T>(), meta.clone() as Rc<dyn Any>);
        Ok(meta)
    }

    pub fn meta<T: Entity>(&self) -> Result<Rc<EntityMeta<T>>> {
        self.metas
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|meta| meta.downcast::<EntityMeta<T>>().ok())
            .ok_or_else(|| PersistenceError::InvalidEntityKind(std::any::type_name::<T>().to_string()))
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.metas.contains_key(&TypeId::of::<T>())
    }

    pub fn is_registered_name(&self, entity_name: &str) -> bool {
        self.names.contains_key(entity_name)
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names.keys().collect();
        names.sort();
        f.debug_struct("EntityRegistry").field("entities", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::metadata::{IdentityValue, PersistValue, PropertyAccessor};

    #[derive(Debug, Clone, Default)]
    struct Tag {
        id: i64,
        label: String,
    }

    impl Entity for Tag {
        fn entity_meta() -> Result<EntityMeta<Self>> {
            EntityMeta::builder("Tag")
                .id("id", "id", |tag: &Tag| tag.id.identity(), |tag: &mut Tag, id| tag.id = id)
                .property(PropertyAccessor::new(
                    "label",
                    "label",
                    DataType::Text,
                    false,
                    |tag: &Tag| tag.label.to_value(),
                    |tag: &mut Tag, value| {
                        tag.label = PersistValue::from_value(value)?;
                        Ok(())
                    },
                ))
                .build()
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Impostor {
        id: i64,
    }

    impl Entity for Impostor {
        fn entity_meta() -> Result<EntityMeta<Self>> {
            EntityMeta::builder("Tag")
                .id("id", "id", |it: &Impostor| it.id.identity(), |it: &mut Impostor, id| it.id = id)
                .build()
        }
    }

    #[test]
    fn test_unregistered_type_is_invalid_kind() {
        let registry = EntityRegistry::new();
        assert!(matches!(
            registry.meta::<Tag>(),
            Err(PersistenceError::InvalidEntityKind(_))
        ));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = EntityRegistry::new();
        let first = registry.register::<Tag>().unwrap();
        let second = registry.register::<Tag>().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_registered::<Tag>());
        assert!(registry.is_registered_name("Tag"));
        assert_eq!(first.table().table_name(), "tag");
    }

    #[test]
    fn test_entity_name_collision_is_rejected() {
        let mut registry = EntityRegistry::new();
        registry.register::<Tag>().unwrap();
        assert!(matches!(
            registry.register::<Impostor>(),
            Err(PersistenceError::Config(_))
        ));
        assert!(!registry.is_registered::<Impostor>());
    }
}
