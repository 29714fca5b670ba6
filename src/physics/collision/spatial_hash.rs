//! The spatial hash is responsible for detecting pairs of possibly
//! intersecting bodies for further, more accurate narrow phase inspection.

use super::AABB;
use crate::{
    math as m,
    physics::{Body, BodyKey},
};

/// A uniform grid of buckets over a bounded region of the world.
///
/// Bodies partially or fully outside the bounds are clamped into the nearest edge cells,
/// so they are still found by queries, just less efficiently.
/// Memory use grows with the number of cells, so keep the bounds tight
/// and the cells no smaller than the typical body.
#[derive(Debug)]
pub struct SpatialHash {
    bounds: AABB,
    cell_size: f64,
    column_count: usize,
    row_count: usize,
    cells: Vec<Vec<BodyKey>>,
    // timestamping used to keep track of which bodies were already found by a query,
    // indexed by arena slot
    last_timestamp: u32,
    timestamps: Vec<u32>,
}

/// Parameters for the creation of a spatial hash.
#[derive(Clone, Copy, Debug)]
pub struct SpatialHashParams {
    /// Region covered by the grid. Bodies outside it still work but crowd the edge cells.
    pub bounds: AABB,
    /// Width and height of a cell. A good value is a little larger than the typical body.
    pub cell_size: f64,
    /// How many bodies to initially allocate space for.
    /// More space will be allocated as needed.
    pub initial_capacity: usize,
}

impl Default for SpatialHashParams {
    fn default() -> Self {
        Self {
            bounds: AABB::new(m::Vec2::new(-100.0, -100.0), m::Vec2::new(100.0, 100.0)),
            cell_size: 4.0,
            initial_capacity: 64,
        }
    }
}

/// Inclusive range of cells a body's bounding box touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub min_col: usize,
    pub min_row: usize,
    pub max_col: usize,
    pub max_row: usize,
}

impl CellRange {
    fn cells(self) -> impl Iterator<Item = (usize, usize)> {
        (self.min_row..=self.max_row)
            .flat_map(move |row| (self.min_col..=self.max_col).map(move |col| (col, row)))
    }
}

impl SpatialHash {
    pub fn new(params: SpatialHashParams) -> Self {
        assert!(
            params.cell_size > 0.0 && params.cell_size.is_finite(),
            "Spatial hash cell size must be positive"
        );
        let column_count = ((params.bounds.width() / params.cell_size).ceil() as usize).max(1);
        let row_count = ((params.bounds.height() / params.cell_size).ceil() as usize).max(1);
        log::debug!("Created a {column_count}x{row_count} spatial hash");

        Self {
            bounds: params.bounds,
            cell_size: params.cell_size,
            column_count,
            row_count,
            cells: vec![Vec::new(); column_count * row_count],
            last_timestamp: 0,
            timestamps: vec![0; params.initial_capacity],
        }
    }

    #[inline]
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    #[cfg(test)]
    fn dimensions(&self) -> (usize, usize) {
        (self.column_count, self.row_count)
    }

    /// The range of cells covered by a bounding box, clamped to the grid.
    pub fn cell_range(&self, aabb: &AABB) -> CellRange {
        let (min_col, min_row) = self.cell_coords(aabb.min);
        let (max_col, max_row) = self.cell_coords(aabb.max);
        CellRange {
            min_col,
            min_row,
            max_col,
            max_row,
        }
    }

    fn cell_coords(&self, point: m::Vec2) -> (usize, usize) {
        let rel = (point - self.bounds.min) / self.cell_size;
        // float to int casts saturate, so negative and NaN become 0
        let col = (rel.x.floor() as usize).min(self.column_count - 1);
        let row = (rel.y.floor() as usize).min(self.row_count - 1);
        (col, row)
    }

    #[inline]
    fn cell_index(&self, col: usize, row: usize) -> usize {
        row * self.column_count + col
    }

    /// Add a body to every cell its bounding box touches and record the range on the body.
    pub fn insert(&mut self, key: BodyKey, body: &mut Body) {
        let range = self.cell_range(&body.aabb());
        for (col, row) in range.cells() {
            let idx = self.cell_index(col, row);
            self.cells[idx].push(key);
        }
        body.cell_range = Some(range);

        let slot = key.slot();
        if slot >= self.timestamps.len() {
            self.timestamps.resize(slot + 1, 0);
        }
    }

    /// Remove a body from the cells it was last inserted into.
    pub fn remove(&mut self, key: BodyKey, body: &mut Body) {
        let Some(range) = body.cell_range.take() else {
            return;
        };
        for (col, row) in range.cells() {
            let idx = self.cell_index(col, row);
            let bucket = &mut self.cells[idx];
            if let Some(pos) = bucket.iter().position(|k| *k == key) {
                bucket.swap_remove(pos);
            }
        }
    }

    /// Move a body to the cells its current bounding box touches.
    /// Does nothing and returns `false` if the range of cells hasn't changed.
    pub fn update(&mut self, key: BodyKey, body: &mut Body) -> bool {
        let range = self.cell_range(&body.aabb());
        if body.cell_range == Some(range) {
            return false;
        }
        self.remove(key, body);
        self.insert(key, body);
        true
    }

    /// Collect every other body sharing a cell with the given one into `out`.
    /// These are only candidates, their bounding boxes may not actually overlap.
    ///
    /// Panics if the body was never inserted.
    pub fn query(&mut self, key: BodyKey, body: &Body, out: &mut Vec<BodyKey>) {
        let range = body
            .cell_range
            .unwrap_or_else(|| panic!("bug: queried the spatial hash with a body that isn't in it"));
        self.collect(range, Some(key), out);
    }

    /// Collect every body in the cells touched by a bounding box into `out`.
    pub fn query_aabb(&mut self, aabb: &AABB, out: &mut Vec<BodyKey>) {
        let range = self.cell_range(aabb);
        self.collect(range, None, out);
    }

    /// Collect every body in the cell containing a point into `out`.
    pub fn query_point(&mut self, point: m::Vec2, out: &mut Vec<BodyKey>) {
        let (col, row) = self.cell_coords(point);
        let range = CellRange {
            min_col: col,
            min_row: row,
            max_col: col,
            max_row: row,
        };
        self.collect(range, None, out);
    }

    fn collect(&mut self, range: CellRange, exclude: Option<BodyKey>, out: &mut Vec<BodyKey>) {
        out.clear();
        if self.last_timestamp == u32::MAX {
            self.last_timestamp = 0;
            for ts in &mut self.timestamps {
                *ts = 0;
            }
        }
        self.last_timestamp += 1;
        let curr_timestamp = self.last_timestamp;
        if let Some(key) = exclude {
            self.timestamps[key.slot()] = curr_timestamp;
        }

        for (col, row) in range.cells() {
            let idx = self.cell_index(col, row);
            for &other in &self.cells[idx] {
                let ts = &mut self.timestamps[other.slot()];
                if *ts == curr_timestamp {
                    continue;
                }
                *ts = curr_timestamp;
                out.push(other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BodyOptions, BodySet};
    use rand::Rng;

    fn params() -> SpatialHashParams {
        SpatialHashParams {
            bounds: AABB::new(m::Vec2::new(0.0, 0.0), m::Vec2::new(20.0, 10.0)),
            cell_size: 2.0,
            initial_capacity: 4,
        }
    }

    fn circle(x: f64, y: f64, r: f64) -> Body {
        Body::circle(x, y, r, BodyOptions::default()).unwrap()
    }

    #[test]
    fn cell_ranges_are_clamped() {
        let hash = SpatialHash::new(params());
        assert_eq!(hash.dimensions(), (10, 5));
        let inside = AABB::new(m::Vec2::new(1.0, 1.0), m::Vec2::new(4.5, 2.0));
        assert_eq!(
            hash.cell_range(&inside),
            CellRange {
                min_col: 0,
                min_row: 0,
                max_col: 2,
                max_row: 1
            }
        );
        let outside = AABB::new(m::Vec2::new(-50.0, 30.0), m::Vec2::new(-40.0, 40.0));
        assert_eq!(
            hash.cell_range(&outside),
            CellRange {
                min_col: 0,
                min_row: 4,
                max_col: 0,
                max_row: 4
            }
        );
    }

    #[test]
    fn insert_query_remove() {
        let mut set = BodySet::new(params());
        let a = set.insert(circle(3.0, 3.0, 0.5));
        let b = set.insert(circle(3.8, 3.0, 0.5));
        let far = set.insert(circle(15.0, 7.0, 0.5));

        let mut out = Vec::new();
        set.query(a, &mut out);
        assert_eq!(out, vec![b]);
        set.query(far, &mut out);
        assert!(out.is_empty());

        set.remove(b);
        set.query(a, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn each_candidate_reported_once() {
        let mut set = BodySet::new(params());
        // both span several cells
        let a = set.insert(Body::rect(5.0, 5.0, 5.0, 5.0, BodyOptions::default()).unwrap());
        let b = set.insert(Body::rect(6.0, 5.0, 5.0, 5.0, BodyOptions::default()).unwrap());
        let mut out = Vec::new();
        set.query(a, &mut out);
        assert_eq!(out, vec![b]);
    }

    #[test]
    fn update_is_noop_within_the_same_cells() {
        let mut set = BodySet::new(params());
        let a = set.insert(circle(3.0, 3.0, 0.5));
        let b = set.insert(circle(9.0, 3.0, 0.5));

        set.get_mut(a).unwrap().set_position(m::Vec2::new(3.2, 3.1));
        assert!(!set.update(a));

        set.get_mut(a).unwrap().set_position(m::Vec2::new(9.0, 3.5));
        assert!(set.update(a));
        let mut out = Vec::new();
        set.query(b, &mut out);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn timestamps_survive_wraparound() {
        let mut set = BodySet::new(params());
        let a = set.insert(circle(3.0, 3.0, 0.5));
        let b = set.insert(circle(3.5, 3.0, 0.5));
        set.hash_mut().last_timestamp = u32::MAX - 1;
        let mut out = Vec::new();
        for _ in 0..3 {
            set.query(a, &mut out);
            assert_eq!(out, vec![b]);
        }
    }

    #[test]
    #[should_panic]
    fn querying_uninserted_body_panics() {
        let mut hash = SpatialHash::new(params());
        let mut set = BodySet::new(params());
        let key = set.insert(circle(1.0, 1.0, 0.5));
        let loose = circle(1.0, 1.0, 0.5);
        let mut out = Vec::new();
        hash.query(key, &loose, &mut out);
    }

    #[test]
    fn no_overlapping_pair_is_missed() {
        let mut rng = rand::thread_rng();
        let mut set = BodySet::new(params());
        let keys: Vec<BodyKey> = (0..60)
            .map(|_| {
                // some bodies partially outside the bounds
                let x = rng.gen_range(-2.0..22.0);
                let y = rng.gen_range(-2.0..12.0);
                set.insert(circle(x, y, rng.gen_range(0.1..1.5)))
            })
            .collect();
        // move everything around a bit
        for &key in &keys {
            let body = set.get_mut(key).unwrap();
            let offset = m::Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            body.set_position(body.position() + offset);
            set.update(key);
        }

        let mut out = Vec::new();
        for &a in &keys {
            set.query(a, &mut out);
            for &b in &keys {
                if a == b {
                    continue;
                }
                let (body_a, body_b) = (set.get(a).unwrap(), set.get(b).unwrap());
                if body_a.aabb().intersects(&body_b.aabb()) {
                    assert!(out.contains(&b), "overlapping pair was not found");
                }
            }
        }
    }
}
