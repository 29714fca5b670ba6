use super::{
    body::IdAllocator,
    collision::{SpatialHash, SpatialHashParams, AABB},
    Body, BodyId,
};
use crate::math as m;

use thunderdome as td;

/// Key type to look up a body stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(super) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }

    /// Arena slot of the key, used for addressing per-body scratch data.
    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.0.slot() as usize
    }
}

/// Storage for the bodies of a physics world.
///
/// Bodies live in an arena and in the spatial hash at the same time.
/// Insertion and removal go through this type so the two never disagree.
/// Iteration follows insertion order.
#[derive(Debug)]
pub struct BodySet {
    bodies: td::Arena<Body>,
    order: Vec<BodyKey>,
    hash: SpatialHash,
    ids: IdAllocator,
}

impl BodySet {
    pub fn new(params: SpatialHashParams) -> Self {
        Self {
            bodies: td::Arena::with_capacity(params.initial_capacity),
            order: Vec::with_capacity(params.initial_capacity),
            hash: SpatialHash::new(params),
            ids: IdAllocator::default(),
        }
    }

    /// Add a body, assigning it an id and placing it in the spatial hash.
    pub fn insert(&mut self, mut body: Body) -> BodyKey {
        let id = self.ids.next_id();
        body.id = Some(id);
        let key = BodyKey(self.bodies.insert(body));
        self.order.push(key);
        if let Some(body) = self.bodies.get_mut(key.0) {
            self.hash.insert(key, body);
        }
        log::debug!("Added body {} ({:?})", id.0, key.0);
        key
    }

    /// Remove a body from storage and the spatial hash.
    ///
    /// Panics if the body isn't in the set.
    pub fn remove(&mut self, key: BodyKey) -> Body {
        let mut body = self
            .bodies
            .remove(key.0)
            .unwrap_or_else(|| panic!("bug: tried to remove a body that doesn't exist"));
        self.hash.remove(key, &mut body);
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        log::debug!("Removed body {:?} ({:?})", body.id.map(|id| id.0), key.0);
        body
    }

    #[inline]
    pub fn get(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key.0)
    }

    /// Mutably access a body.
    ///
    /// Moving the body through this doesn't update the spatial hash until the next
    /// [`update`][Self::update] (which the physics tick does for every body).
    #[inline]
    pub fn get_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key.0)
    }

    /// Mutably access two different bodies at once.
    pub fn get2_mut(&mut self, a: BodyKey, b: BodyKey) -> (Option<&mut Body>, Option<&mut Body>) {
        assert!(a != b, "bug: paired a body with itself");
        self.bodies.get2_mut(a.0, b.0)
    }

    #[inline]
    pub fn contains(&self, key: BodyKey) -> bool {
        self.bodies.contains(key.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys of all bodies in insertion order.
    #[inline]
    pub fn keys(&self) -> &[BodyKey] {
        &self.order
    }

    /// All bodies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyKey, &Body)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.bodies.get(key.0).map(|body| (*key, body)))
    }

    /// Iterate over mutable references to all bodies in arbitrary order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (BodyKey, &mut Body)> + '_ {
        self.bodies.iter_mut().map(|(idx, body)| (BodyKey(idx), body))
    }

    /// Find the key of a body by its id.
    pub fn key_of(&self, id: BodyId) -> Option<BodyKey> {
        self.iter()
            .find(|(_, body)| body.id == Some(id))
            .map(|(key, _)| key)
    }

    /// Move a body to the spatial hash cells matching its current bounding box.
    /// Returns `false` if nothing changed or the body doesn't exist.
    pub fn update(&mut self, key: BodyKey) -> bool {
        match self.bodies.get_mut(key.0) {
            Some(body) => self.hash.update(key, body),
            None => false,
        }
    }

    /// Collect candidates for collision with a body into `out`.
    ///
    /// Panics if the body doesn't exist.
    pub fn query(&mut self, key: BodyKey, out: &mut Vec<BodyKey>) {
        let body = self
            .bodies
            .get(key.0)
            .unwrap_or_else(|| panic!("bug: queried neighbors of a body that doesn't exist"));
        self.hash.query(key, body, out);
    }

    /// Collect bodies whose bounding boxes overlap the given one into `out`.
    pub fn query_aabb(&mut self, aabb: &AABB, out: &mut Vec<BodyKey>) {
        self.hash.query_aabb(aabb, out);
        let bodies = &self.bodies;
        out.retain(|key| bodies.get(key.0).is_some_and(|b| b.aabb().intersects(aabb)));
    }

    /// Collect bodies containing the given point into `out`.
    pub fn query_point(&mut self, point: m::Vec2, out: &mut Vec<BodyKey>) {
        self.hash.query_point(point, out);
        let bodies = &self.bodies;
        out.retain(|key| bodies.get(key.0).is_some_and(|b| b.contains_point(point)));
    }

    #[cfg(test)]
    pub(crate) fn hash_mut(&mut self) -> &mut SpatialHash {
        &mut self.hash
    }
}
