use std::any::{Any, TypeId};
use std::collections::HashMap;

use sea_orm::{EntityTrait, IdenStatic, Iterable};

use super::SagaSet;
use crate::errors::PersistenceError;

type ColumnOf<S> = <<S as SagaSet>::Entity as EntityTrait>::Column;

/// Typed handle for one registered saga type.
///
/// The property-name to column map is built once, at registration.
pub struct SagaSetHandle<S: SagaSet> {
    columns: HashMap<String, ColumnOf<S>>,
}

impl<S: SagaSet> SagaSetHandle<S> {
    fn new() -> Self {
        let mut columns = HashMap::new();
        for col in <ColumnOf<S> as Iterable>::iter() {
            // column name (`customer_id`) and field variant (`CustomerId`)
            columns.insert(col.as_str().to_string(), col);
            columns.insert(format!("{col:?}"), col);
        }
        Self { columns }
    }

    pub fn type_tag(&self) -> &'static str { S::TYPE_TAG }

    /// Column backing a declared property, if any.
    pub fn column(&self, property: &str) -> Option<ColumnOf<S>> {
        self.columns.get(property).copied()
    }
}

struct Entry {
    type_tag: &'static str,
    handle: Box<dyn Any + Send + Sync>,
}

/// Registry of saga types that have an entity set.
#[derive(Default)]
pub struct SagaRegistry {
    sets: HashMap<TypeId, Entry>,
}

impl SagaRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register<S: SagaSet>(&mut self) -> &mut Self {
        let handle: SagaSetHandle<S> = SagaSetHandle::new();
        self.sets.insert(TypeId::of::<S>(), Entry { type_tag: S::TYPE_TAG, handle: Box::new(handle) });
        self
    }

    /// Builder form of [`SagaRegistry::register`].
    pub fn with<S: SagaSet>(mut self) -> Self {
        self.register::<S>();
        self
    }

    pub fn contains<S: SagaSet>(&self) -> bool { self.sets.contains_key(&TypeId::of::<S>()) }

    pub fn type_tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.sets.values().map(|e| e.type_tag).collect();
        tags.sort_unstable();
        tags
    }

    pub fn handle<S: SagaSet>(&self) -> Result<&SagaSetHandle<S>, PersistenceError> {
        self.sets
            .get(&TypeId::of::<S>())
            .and_then(|e| e.handle.downcast_ref::<SagaSetHandle<S>>())
            .ok_or_else(PersistenceError::unsupported::<S>)
    }
}

impl std::fmt::Debug for SagaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaRegistry").field("types", &self.type_tags()).finish()
    }
}
