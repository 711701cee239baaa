use rayon::prelude::*;

/// Offsets of the 8-connected neighbourhood, orthogonal first.
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
];

/// A bounded, row-major 2D grid.
///
/// Nothing wraps: coordinates outside
/// `[0, width) x [0, height)` simply have no cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

impl<T: Clone + Default + Send + Sync> Grid<T> {
    /// Build a grid by evaluating `f(x, y)` for every cell, one rayon task per row.
    ///
    /// Each row is written by exactly one task, so no synchronisation is needed.
    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> T + Sync,
    {
        let mut grid = Self::new(width, height);
        grid.par_rows_mut().for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = f(x, y);
            }
        });
        grid
    }

    /// Produce a new grid of the same shape by mapping every cell in parallel.
    pub fn map<U, F>(&self, f: F) -> Grid<U>
    where
        U: Clone + Default + Send + Sync,
        F: Fn(usize, usize, &T) -> U + Sync,
    {
        Grid::from_fn(self.width, self.height, |x, y| f(x, y, self.get(x, y)))
    }
}

impl<T> Grid<T> {
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        y * self.width + x
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Checked access with signed coordinates.
    pub fn try_get(&self, x: i64, y: i64) -> Option<&T> {
        if self.in_bounds(x, y) {
            Some(self.get(x as usize, y as usize))
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Get the in-bounds 8-connected neighbours of a cell.
    /// Corner cells have 3, edge cells 5, interior cells 8.
    pub fn neighbors_8(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(8);
        for (dx, dy) in NEIGHBORS_8 {
            let nx = x as i64 + dx as i64;
            let ny = y as i64 + dy as i64;
            if self.in_bounds(nx, ny) {
                result.push((nx as usize, ny as usize));
            }
        }
        result
    }

    /// True when any of the 8 neighbours is off-grid or fails `same`.
    pub fn is_boundary<F>(&self, x: usize, y: usize, same: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        NEIGHBORS_8.iter().any(|&(dx, dy)| {
            match self.try_get(x as i64 + dx as i64, y as i64 + dy as i64) {
                Some(v) => !same(v),
                None => true,
            }
        })
    }

    /// Iterate over all cells with their coordinates, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            (idx % width, idx / width, val)
        })
    }

    /// Parallel iterator over `(y, row)` pairs; rows are disjoint mutable slices.
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &mut [T])>
    where
        T: Send,
    {
        // chunks_mut panics on a zero chunk size; an empty grid has no rows anyway.
        let width = self.width.max(1);
        self.data.par_chunks_mut(width).enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let grid = Grid::from_fn(3, 2, |x, y| (y * 3 + x) as u32);
        assert_eq!(grid.as_slice(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(grid.row(1), &[3, 4, 5]);
        assert_eq!(*grid.get(2, 1), 5);
    }

    #[test]
    fn test_neighbor_counts() {
        let grid: Grid<u8> = Grid::new(4, 4);
        assert_eq!(grid.neighbors_8(0, 0).len(), 3);
        assert_eq!(grid.neighbors_8(1, 0).len(), 5);
        assert_eq!(grid.neighbors_8(1, 1).len(), 8);
        assert_eq!(grid.neighbors_8(3, 3).len(), 3);

        let single: Grid<u8> = Grid::new(1, 1);
        assert!(single.neighbors_8(0, 0).is_empty());
    }

    #[test]
    fn test_no_horizontal_wrap() {
        let grid = Grid::from_fn(3, 1, |x, _| x as i32);
        assert_eq!(grid.try_get(-1, 0), None);
        assert_eq!(grid.try_get(3, 0), None);
        assert_eq!(grid.try_get(2, 0), Some(&2));
    }

    #[test]
    fn test_is_boundary() {
        let mut grid = Grid::new_with(5, 5, 1u8);
        // Every edge cell touches the outside
        assert!(grid.is_boundary(0, 2, |&v| v == 1));
        assert!(!grid.is_boundary(2, 2, |&v| v == 1));

        grid.set(3, 3, 2);
        assert!(grid.is_boundary(2, 2, |&v| v == 1));
    }

    #[test]
    fn test_map_preserves_shape() {
        let grid = Grid::from_fn(4, 3, |x, y| (x + y) as f32);
        let doubled = grid.map(|_, _, &v| v * 2.0);
        assert_eq!(doubled.width, 4);
        assert_eq!(doubled.height, 3);
        assert_eq!(*doubled.get(3, 2), 10.0);
    }
}
