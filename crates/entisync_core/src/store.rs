//! Local entity mirror.

use crate::types::{Entity, EntityId, OwnerId, ViewMode};
use std::collections::{BTreeSet, HashMap};

/// A deep, independent copy of everything needed to rebuild an [`EntityStore`].
///
/// The owner index is not part of the view; it is derived from the entities
/// on restore.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreView<E> {
    /// All entities by ID.
    pub entities: HashMap<EntityId, E>,
    /// The active selection pointer.
    pub active: Option<EntityId>,
    /// Per-entity view-mode annotations.
    pub view_modes: HashMap<EntityId, ViewMode>,
}

impl<E> Default for StoreView<E> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            active: None,
            view_modes: HashMap::new(),
        }
    }
}

/// In-memory mirror of remote entities.
///
/// Holds the best-known local value of every entity, a secondary index from
/// owner to owned entity IDs, one active selection pointer (e.g. the
/// currently active avatar) and per-entity view modes.
///
/// # Invariants
///
/// - Every entity appears in the owner index under exactly its current owner
/// - The active pointer, when set, refers to an entity present in the store
/// - No operation fails; lookups of missing IDs return `None`
#[derive(Debug, Clone)]
pub struct EntityStore<E> {
    entities: HashMap<EntityId, E>,
    owners: HashMap<OwnerId, BTreeSet<EntityId>>,
    active: Option<EntityId>,
    view_modes: HashMap<EntityId, ViewMode>,
}

impl<E> Default for EntityStore<E> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            owners: HashMap::new(),
            active: None,
            view_modes: HashMap::new(),
        }
    }
}

impl<E: Entity> EntityStore<E> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity with the given ID, or `None` if it is not mirrored.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.entities.get(id)
    }

    /// Returns true if the entity is mirrored locally.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Inserts or replaces an entity, keeping the owner index current.
    ///
    /// Returns the previous value, if any.
    pub fn set(&mut self, entity: E) -> Option<E> {
        let id = entity.id().clone();
        let owner = entity.owner().clone();

        let previous = self.entities.insert(id.clone(), entity);
        if let Some(prev) = &previous {
            if prev.owner() != &owner {
                self.unindex(prev.owner(), &id);
            }
        }
        self.owners.entry(owner).or_default().insert(id);
        previous
    }

    /// Returns a handle that can only change `id`: its value, its view mode
    /// and whether the active pointer refers to it.
    pub fn entry_mut(&mut self, id: EntityId) -> EntryMut<'_, E> {
        EntryMut { store: self, id }
    }

    /// Removes an entity together with its view mode.
    ///
    /// Clears the active pointer if it referred to the removed entity.
    pub fn remove(&mut self, id: &EntityId) -> Option<E> {
        let removed = self.entities.remove(id)?;
        self.unindex(removed.owner(), id);
        self.view_modes.remove(id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        Some(removed)
    }

    /// Upserts an entity and makes it the active selection.
    pub fn set_active(&mut self, entity: E) {
        let id = entity.id().clone();
        self.set(entity);
        self.active = Some(id);
    }

    /// Clears the active selection without removing any entity.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Returns the active entity, if one is selected.
    #[must_use]
    pub fn active(&self) -> Option<&E> {
        self.active.as_ref().and_then(|id| self.entities.get(id))
    }

    /// Returns the ID of the active entity, if one is selected.
    #[must_use]
    pub fn active_id(&self) -> Option<&EntityId> {
        self.active.as_ref()
    }

    /// Annotates an entity with a view mode.
    ///
    /// Returns false (and records nothing) if the entity is not mirrored.
    pub fn set_view_mode(&mut self, id: &EntityId, mode: ViewMode) -> bool {
        if !self.entities.contains_key(id) {
            return false;
        }
        self.view_modes.insert(id.clone(), mode);
        true
    }

    /// Returns the view mode of an entity, or `None` if it is not annotated.
    #[must_use]
    pub fn view_mode(&self, id: &EntityId) -> Option<ViewMode> {
        self.view_modes.get(id).copied()
    }

    /// Returns the IDs owned by `owner` in ascending order.
    #[must_use]
    pub fn ids_owned_by(&self, owner: &OwnerId) -> Vec<EntityId> {
        self.owners
            .get(owner)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the entities owned by `owner`, ordered by ID.
    #[must_use]
    pub fn owned_by(&self, owner: &OwnerId) -> Vec<&E> {
        self.owners
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.entities.get(id)).collect())
            .unwrap_or_default()
    }

    /// Returns the number of mirrored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over all mirrored entities in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.values()
    }

    /// Returns a deep copy of the observable state.
    #[must_use]
    pub fn snapshot_view(&self) -> StoreView<E> {
        StoreView {
            entities: self.entities.clone(),
            active: self.active.clone(),
            view_modes: self.view_modes.clone(),
        }
    }

    /// Replaces the whole store with a previously captured view.
    pub fn restore(&mut self, view: &StoreView<E>) {
        self.entities = view.entities.clone();
        self.active = view.active.clone();
        self.view_modes = view.view_modes.clone();
        self.rebuild_owner_index();
    }

    /// Restores a single key from a previously captured view.
    ///
    /// The entity value and view mode of `id` are reset to what the view
    /// holds (removing them if the view has none). The active pointer is
    /// reset to the view's pointer when either side points at `id`. Other
    /// keys are left untouched.
    pub fn restore_entry(&mut self, id: &EntityId, view: &StoreView<E>) {
        let was_active = self.active.as_ref() == Some(id);

        match view.entities.get(id) {
            Some(entity) => {
                self.set(entity.clone());
            }
            None => {
                self.remove(id);
            }
        }

        match view.view_modes.get(id) {
            Some(mode) => {
                self.view_modes.insert(id.clone(), *mode);
            }
            None => {
                self.view_modes.remove(id);
            }
        }

        if was_active || view.active.as_ref() == Some(id) {
            self.active = view
                .active
                .clone()
                .filter(|active| self.entities.contains_key(active));
        }
    }

    fn unindex(&mut self, owner: &OwnerId, id: &EntityId) {
        if let Some(ids) = self.owners.get_mut(owner) {
            ids.remove(id);
            if ids.is_empty() {
                self.owners.remove(owner);
            }
        }
    }

    fn rebuild_owner_index(&mut self) {
        self.owners.clear();
        for (id, entity) in &self.entities {
            self.owners
                .entry(entity.owner().clone())
                .or_default()
                .insert(id.clone());
        }
    }
}

/// Mutable access to one key of an [`EntityStore`].
///
/// Everything an `EntryMut` can change is covered by
/// [`EntityStore::restore_entry`] for the same key.
#[derive(Debug)]
pub struct EntryMut<'a, E> {
    store: &'a mut EntityStore<E>,
    id: EntityId,
}

impl<E: Entity> EntryMut<'_, E> {
    /// Returns the key this handle is bound to.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Returns the current value.
    #[must_use]
    pub fn get(&self) -> Option<&E> {
        self.store.get(&self.id)
    }

    /// Returns the current view mode.
    #[must_use]
    pub fn view_mode(&self) -> Option<ViewMode> {
        self.store.view_mode(&self.id)
    }

    /// Returns true if the active pointer refers to this key.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store.active_id() == Some(&self.id)
    }

    /// Upserts `entity`.
    ///
    /// Returns false (and stores nothing) if `entity` has a different ID.
    pub fn set(&mut self, entity: E) -> bool {
        if entity.id() != &self.id {
            return false;
        }
        self.store.set(entity);
        true
    }

    /// Upserts `entity` and makes it the active selection.
    ///
    /// Returns false (and changes nothing) if `entity` has a different ID.
    pub fn set_active(&mut self, entity: E) -> bool {
        if entity.id() != &self.id {
            return false;
        }
        self.store.set_active(entity);
        true
    }

    /// Clears the active pointer if it refers to this key.
    pub fn clear_active(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.store.clear_active();
        true
    }

    /// Annotates this key with a view mode; false if it is not mirrored.
    pub fn set_view_mode(&mut self, mode: ViewMode) -> bool {
        self.store.set_view_mode(&self.id, mode)
    }

    /// Removes the entity together with its view mode.
    pub fn remove(&mut self) -> Option<E> {
        self.store.remove(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: EntityId,
        owner: OwnerId,
        body: String,
    }

    impl Entity for Note {
        fn id(&self) -> &EntityId {
            &self.id
        }
        fn owner(&self) -> &OwnerId {
            &self.owner
        }
    }

    fn note(id: &str, owner: &str, body: &str) -> Note {
        Note {
            id: id.into(),
            owner: owner.into(),
            body: body.into(),
        }
    }

    #[test]
    fn get_missing_is_none() {
        let store: EntityStore<Note> = EntityStore::new();
        assert!(store.get(&"nope".into()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn set_upserts_and_indexes() {
        let mut store = EntityStore::new();
        assert!(store.set(note("n1", "alice", "a")).is_none());
        let prev = store.set(note("n1", "alice", "b")).unwrap();

        assert_eq!(prev.body, "a");
        assert_eq!(store.get(&"n1".into()).unwrap().body, "b");
        assert_eq!(store.ids_owned_by(&"alice".into()), vec![EntityId::new("n1")]);
    }

    #[test]
    fn owner_change_moves_index_entry() {
        let mut store = EntityStore::new();
        store.set(note("n1", "alice", "a"));
        store.set(note("n1", "bob", "a"));

        assert!(store.ids_owned_by(&"alice".into()).is_empty());
        assert_eq!(store.owned_by(&"bob".into()).len(), 1);
    }

    #[test]
    fn remove_clears_active_and_view_mode() {
        let mut store = EntityStore::new();
        store.set_active(note("n1", "alice", "a"));
        store.set_view_mode(&"n1".into(), ViewMode::Private);

        let removed = store.remove(&"n1".into()).unwrap();
        assert_eq!(removed.body, "a");
        assert!(store.active().is_none());
        assert!(store.view_mode(&"n1".into()).is_none());
        assert!(store.ids_owned_by(&"alice".into()).is_empty());
    }

    #[test]
    fn view_mode_requires_entity() {
        let mut store: EntityStore<Note> = EntityStore::new();
        assert!(!store.set_view_mode(&"ghost".into(), ViewMode::Public));
        assert!(store.view_mode(&"ghost".into()).is_none());
    }

    #[test]
    fn snapshot_view_is_independent() {
        let mut store = EntityStore::new();
        store.set(note("n1", "alice", "before"));
        let view = store.snapshot_view();

        store.set(note("n1", "alice", "after"));
        assert_eq!(view.entities[&EntityId::new("n1")].body, "before");
    }

    #[test]
    fn restore_rebuilds_everything() {
        let mut store = EntityStore::new();
        store.set_active(note("n1", "alice", "a"));
        store.set_view_mode(&"n1".into(), ViewMode::Followers);
        let view = store.snapshot_view();

        store.remove(&"n1".into());
        store.set(note("n2", "bob", "b"));
        store.restore(&view);

        assert_eq!(store.snapshot_view(), view);
        assert_eq!(store.ids_owned_by(&"alice".into()), vec![EntityId::new("n1")]);
        assert!(store.ids_owned_by(&"bob".into()).is_empty());
    }

    #[test]
    fn restore_entry_touches_only_that_key() {
        let mut store = EntityStore::new();
        store.set(note("n1", "alice", "a1"));
        store.set(note("n2", "alice", "b1"));
        let view = store.snapshot_view();

        store.set(note("n1", "alice", "a2"));
        store.set(note("n2", "alice", "b2"));
        store.restore_entry(&"n1".into(), &view);

        assert_eq!(store.get(&"n1".into()).unwrap().body, "a1");
        assert_eq!(store.get(&"n2".into()).unwrap().body, "b2");
    }

    #[test]
    fn restore_entry_removes_created_entity_and_resets_active() {
        let mut store = EntityStore::new();
        store.set_active(note("n1", "alice", "a"));
        let view = store.snapshot_view();

        store.set_active(note("n9", "alice", "new"));
        store.restore_entry(&"n9".into(), &view);

        assert!(store.get(&"n9".into()).is_none());
        assert_eq!(store.active_id(), Some(&EntityId::new("n1")));
    }

    #[test]
    fn entry_mut_only_touches_its_key() {
        let mut store = EntityStore::new();
        store.set(note("x", "u1", "x0"));
        store.set_active(note("y", "u1", "y0"));
        let before = store.snapshot_view();

        {
            let mut entry = store.entry_mut(EntityId::new("x"));
            assert!(entry.set(note("x", "u2", "x1")));
            assert!(!entry.set(note("y", "u1", "y1")));
            assert!(!entry.clear_active());
            assert!(entry.set_view_mode(ViewMode::Private));
        }
        assert_eq!(store.get(&EntityId::new("y")).unwrap().body, "y0");
        assert_eq!(store.active_id(), Some(&EntityId::new("y")));

        store.restore_entry(&EntityId::new("x"), &before);
        assert_eq!(store.snapshot_view(), before);
        assert!(store.owned_by(&OwnerId::new("u2")).is_empty());
    }
}
