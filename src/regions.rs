//! Region segmentation
//!
//! Splits the biome map into 8-connected same-biome components and folds
//! undersized components into their nearest same-biome neighbour.
//!
//! Flood fill runs in horizontal bands, one rayon task per band, each with its
//! own label buffer. Components that cross a band seam are joined afterwards
//! with a union-find. Regions are then numbered by their first cell in row-major
//! order and list their cells row-major, so the output does not depend on how
//! many bands were used.

use std::collections::VecDeque;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::biomes::Biome;
use crate::grid::{Grid, NEIGHBORS_8};

const UNLABELED: u32 = u32::MAX;

/// A connected set of same-biome cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub biome: Biome,
    pub cells: Vec<(usize, usize)>,
    /// Cells touching the map edge or a different biome; always a subset of `cells`
    pub barrier_cells: Vec<(usize, usize)>,
    /// Any cell carries river flow
    pub has_river: bool,
}

impl Region {
    fn new(biome: Biome) -> Self {
        Self {
            biome,
            cells: Vec::new(),
            barrier_cells: Vec::new(),
            has_river: false,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn add_cell(&mut self, x: usize, y: usize, is_barrier: bool) {
        self.cells.push((x, y));
        if is_barrier {
            self.barrier_cells.push((x, y));
        }
    }

    /// Take over all of `other`'s cells and barrier cells.
    fn absorb(&mut self, other: Region) {
        self.cells.extend(other.cells);
        self.barrier_cells.extend(other.barrier_cells);
        self.has_river |= other.has_river;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionParams {
    /// Regions smaller than this (and without a river) are merged away
    pub min_area: usize,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self { min_area: 700 }
    }
}

/// Summary of a segmentation
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegionStats {
    /// Components found by flood fill
    pub discovered: usize,
    /// Regions absorbed into a neighbour
    pub merged: usize,
    /// Surviving regions
    pub count: usize,
    pub smallest: usize,
    pub largest: usize,
    pub mean_size: f32,
    /// Surviving regions below the minimum area (river regions or no target)
    pub undersized: usize,
}

/// Regions plus a per-cell index into them.
#[derive(Clone, Debug)]
pub struct Segmentation {
    pub regions: Vec<Region>,
    pub region_map: Grid<usize>,
    pub stats: RegionStats,
}

/// Flood fill, merge, and index the regions of a biome map.
pub fn segment(biomes: &Grid<Biome>, rivers: &Grid<f32>, params: &RegionParams) -> Segmentation {
    let found = find_regions(biomes, rivers);
    let discovered = found.len();

    let (regions, merged) = merge_small_regions(found, params.min_area);
    let region_map = build_region_map(&regions, biomes.width, biomes.height);

    let mut stats = RegionStats {
        discovered,
        merged,
        count: regions.len(),
        ..Default::default()
    };
    if !regions.is_empty() {
        stats.smallest = regions.iter().map(Region::len).min().unwrap_or(0);
        stats.largest = regions.iter().map(Region::len).max().unwrap_or(0);
        stats.mean_size = biomes.len() as f32 / regions.len() as f32;
        stats.undersized = regions.iter().filter(|r| r.len() < params.min_area).count();
    }

    Segmentation { regions, region_map, stats }
}

/// Connected components with one band per available worker.
pub fn find_regions(biomes: &Grid<Biome>, rivers: &Grid<f32>) -> Vec<Region> {
    let workers = rayon::current_num_threads().max(1);
    let band_rows = biomes.height.div_ceil(workers).max(1);
    find_regions_banded(biomes, rivers, band_rows)
}

/// Connected components, flood-filling `band_rows` rows per task.
pub fn find_regions_banded(biomes: &Grid<Biome>, rivers: &Grid<f32>, band_rows: usize) -> Vec<Region> {
    let width = biomes.width;
    let height = biomes.height;
    if biomes.is_empty() {
        return Vec::new();
    }
    let band_rows = band_rows.max(1);

    let bands: Vec<(usize, usize)> = (0..height)
        .step_by(band_rows)
        .map(|y0| (y0, (y0 + band_rows).min(height)))
        .collect();

    // Phase 1: independent flood fill per band
    let labeled: Vec<(Vec<u32>, u32)> = bands
        .par_iter()
        .map(|&(y0, y1)| label_band(biomes, y0, y1))
        .collect();

    // Concatenate band labels into global ids
    let mut labels = Vec::with_capacity(width * height);
    let mut offset = 0u32;
    for (band_labels, count) in labeled {
        labels.extend(band_labels.into_iter().map(|l| l + offset));
        offset += count;
    }

    // Phase 2: join components across each seam
    let mut sets = DisjointSet::new(offset as usize);
    for &(_, y1) in bands.iter().take(bands.len() - 1) {
        let above = y1 - 1;
        for x in 0..width {
            let biome = *biomes.get(x, above);
            for dx in -1i64..=1 {
                let nx = x as i64 + dx;
                if nx < 0 || nx >= width as i64 {
                    continue;
                }
                let nx = nx as usize;
                if *biomes.get(nx, y1) == biome {
                    sets.union(labels[above * width + x], labels[y1 * width + nx]);
                }
            }
        }
    }

    // Phase 3: number regions by first appearance, row-major
    let mut region_of_root = vec![usize::MAX; offset as usize];
    let mut regions: Vec<Region> = Vec::new();
    for (x, y, &biome) in biomes.iter() {
        let root = sets.find(labels[y * width + x]) as usize;
        if region_of_root[root] == usize::MAX {
            region_of_root[root] = regions.len();
            regions.push(Region::new(biome));
        }
        let region = &mut regions[region_of_root[root]];
        let is_barrier = biomes.is_boundary(x, y, |&b| b == biome);
        region.add_cell(x, y, is_barrier);
        region.has_river |= *rivers.get(x, y) > 0.0;
    }

    regions
}

/// Breadth-first labeling of rows `y0..y1`. Returns row-major labels for the
/// band and the number of components found.
fn label_band(biomes: &Grid<Biome>, y0: usize, y1: usize) -> (Vec<u32>, u32) {
    let width = biomes.width;
    let mut labels = vec![UNLABELED; width * (y1 - y0)];
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for sy in y0..y1 {
        for sx in 0..width {
            if labels[(sy - y0) * width + sx] != UNLABELED {
                continue;
            }
            let biome = *biomes.get(sx, sy);
            labels[(sy - y0) * width + sx] = next;
            queue.push_back((sx, sy));

            while let Some((x, y)) = queue.pop_front() {
                for (dx, dy) in NEIGHBORS_8 {
                    let nx = x as i64 + dx as i64;
                    let ny = y as i64 + dy as i64;
                    if nx < 0 || nx >= width as i64 || ny < y0 as i64 || ny >= y1 as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    let idx = (ny - y0) * width + nx;
                    if labels[idx] == UNLABELED && *biomes.get(nx, ny) == biome {
                        labels[idx] = next;
                        queue.push_back((nx, ny));
                    }
                }
            }

            next += 1;
        }
    }

    (labels, next)
}

/// Union-find over band-local component ids.
struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
        }
    }

    fn find(&mut self, mut id: u32) -> u32 {
        while self.parent[id as usize] != id {
            let grandparent = self.parent[self.parent[id as usize] as usize];
            self.parent[id as usize] = grandparent;
            id = grandparent;
        }
        id
    }

    /// Keeps the smaller id as root.
    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

fn is_undersized(region: &Region, min_area: usize) -> bool {
    region.len() < min_area && !region.has_river
}

/// Smallest squared distance between any two barrier cells.
fn barrier_distance_sq(a: &Region, b: &Region) -> Option<u64> {
    a.barrier_cells
        .iter()
        .flat_map(|&(ax, ay)| {
            b.barrier_cells.iter().map(move |&(bx, by)| {
                let dx = ax.abs_diff(bx) as u64;
                let dy = ay.abs_diff(by) as u64;
                dx * dx + dy * dy
            })
        })
        .min()
}

/// Nearest live, same-biome region that is not waiting for its own merge.
/// Ties go to the earliest-created region.
fn nearest_target(slots: &[Option<Region>], pending: &[bool], region: &Region) -> Option<usize> {
    slots
        .par_iter()
        .enumerate()
        .filter_map(|(idx, slot)| {
            let target = slot.as_ref()?;
            if pending[idx] || target.biome != region.biome {
                return None;
            }
            barrier_distance_sq(region, target).map(|d| (d, idx))
        })
        .min()
        .map(|(_, idx)| idx)
}

/// Fold every undersized, river-free region into its nearest same-biome
/// neighbour. Returns the surviving regions (creation order) and the number
/// of merges.
///
/// Candidates are handled in creation order. A region with no same-biome
/// target is kept as it is. When an absorbing region is itself still
/// undersized it is re-queued, so small clusters collapse together.
pub fn merge_small_regions(regions: Vec<Region>, min_area: usize) -> (Vec<Region>, usize) {
    let mut pending: Vec<bool> = regions.iter().map(|r| is_undersized(r, min_area)).collect();
    let candidates: Vec<usize> = (0..regions.len()).filter(|&i| pending[i]).collect();
    let mut slots: Vec<Option<Region>> = regions.into_iter().map(Some).collect();

    // Every merge removes a region, so this many merges is a hard ceiling.
    let mut merge_budget = slots.len();
    let mut merged = 0;

    for candidate in candidates {
        let mut work = vec![candidate];

        while let Some(idx) = work.pop() {
            pending[idx] = false;

            let Some(region) = slots[idx].take() else {
                continue;
            };
            if !is_undersized(&region, min_area) || merge_budget == 0 {
                slots[idx] = Some(region);
                continue;
            }

            match nearest_target(&slots, &pending, &region) {
                Some(target_idx) => {
                    if let Some(target) = slots[target_idx].as_mut() {
                        target.absorb(region);
                        merged += 1;
                        merge_budget -= 1;
                        if is_undersized(target, min_area) {
                            work.push(target_idx);
                        }
                    }
                }
                None => {
                    debug!(
                        biome = %region.biome,
                        cells = region.len(),
                        "no same-biome merge target, keeping region"
                    );
                    slots[idx] = Some(region);
                }
            }
        }
    }

    (slots.into_iter().flatten().collect(), merged)
}

/// Region index of every cell.
pub fn build_region_map(regions: &[Region], width: usize, height: usize) -> Grid<usize> {
    let mut map = Grid::new_with(width, height, usize::MAX);
    for (idx, region) in regions.iter().enumerate() {
        for &(x, y) in &region.cells {
            map.set(x, y, idx);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use Biome::*;

    fn grid_from(rows: &[&[Biome]]) -> Grid<Biome> {
        let height = rows.len();
        let width = rows[0].len();
        Grid::from_fn(width, height, |x, y| rows[y][x])
    }

    fn dry(width: usize, height: usize) -> Grid<f32> {
        Grid::new_with(width, height, 0.0f32)
    }

    fn assert_partition(regions: &[Region], width: usize, height: usize) {
        let mut seen = HashSet::new();
        for region in regions {
            for &cell in &region.cells {
                assert!(seen.insert(cell), "cell {:?} appears twice", cell);
            }
        }
        assert_eq!(seen.len(), width * height);
    }

    fn assert_barriers_subset(regions: &[Region]) {
        for region in regions {
            let cells: HashSet<_> = region.cells.iter().collect();
            for cell in &region.barrier_cells {
                assert!(cells.contains(cell));
            }
        }
    }

    fn checkerboard_stripes(width: usize, height: usize) -> Grid<Biome> {
        Grid::from_fn(width, height, |x, y| match (x / 3 + y / 2) % 3 {
            0 => Desert,
            1 => Swamp,
            _ => Tundra,
        })
    }

    #[test]
    fn test_diagonal_cells_connect() {
        let biomes = grid_from(&[
            &[Desert, Swamp],
            &[Swamp, Desert],
        ]);
        let regions = find_regions(&biomes, &dry(2, 2));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].biome, Desert);
        assert_eq!(regions[0].cells, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_band_count_does_not_change_output() {
        let biomes = checkerboard_stripes(17, 13);
        let rivers = dry(17, 13);
        let whole = find_regions_banded(&biomes, &rivers, 13);
        for band_rows in [1, 2, 3, 5, 8] {
            assert_eq!(find_regions_banded(&biomes, &rivers, band_rows), whole, "band_rows = {}", band_rows);
        }
    }

    #[test]
    fn test_component_spanning_seams() {
        // A U shape whose two arms only meet in the last row
        let biomes = grid_from(&[
            &[Swamp, Desert, Swamp],
            &[Swamp, Desert, Swamp],
            &[Swamp, Desert, Swamp],
            &[Swamp, Swamp, Swamp],
        ]);
        let regions = find_regions_banded(&biomes, &dry(3, 4), 1);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].biome, Swamp);
        assert_eq!(regions[0].len(), 9);
    }

    #[test]
    fn test_barrier_cells() {
        let mut biomes = Grid::new_with(5, 5, Grassland);
        biomes.set(2, 2, Lake);
        let regions = find_regions(&biomes, &dry(5, 5));

        let grass = &regions[0];
        // 16 edge cells plus the 8 around the lake = every grass cell
        assert_eq!(grass.barrier_cells.len(), 24);
        assert_eq!(regions[1].barrier_cells, vec![(2, 2)]);
        assert_barriers_subset(&regions);
    }

    #[test]
    fn test_interior_cell_is_not_barrier() {
        let biomes = Grid::new_with(5, 5, Grassland);
        let regions = find_regions(&biomes, &dry(5, 5));
        assert_eq!(regions.len(), 1);
        assert!(!regions[0].barrier_cells.contains(&(2, 2)));
        assert_eq!(regions[0].barrier_cells.len(), 16);
    }

    #[test]
    fn test_small_region_merges_into_nearest() {
        // Two desert blobs split by a swamp column; the single desert cell on the
        // right must join the large desert region on the left.
        let biomes = grid_from(&[
            &[Desert, Desert, Swamp, Swamp, Swamp],
            &[Desert, Desert, Swamp, Desert, Swamp],
            &[Desert, Desert, Swamp, Swamp, Swamp],
        ]);
        let seg = segment(&biomes, &dry(5, 3), &RegionParams { min_area: 3 });

        assert_eq!(seg.regions.len(), 2);
        let desert = seg.regions.iter().find(|r| r.biome == Desert).unwrap();
        assert_eq!(desert.len(), 7);
        assert!(desert.cells.contains(&(3, 1)));
        assert_partition(&seg.regions, 5, 3);
        assert_eq!(seg.stats.merged, 1);
    }

    #[test]
    fn test_river_region_is_exempt() {
        let biomes = grid_from(&[
            &[Desert, Desert, Swamp, Swamp, Swamp],
            &[Desert, Desert, Swamp, Desert, Swamp],
            &[Desert, Desert, Swamp, Swamp, Swamp],
        ]);
        let mut rivers = dry(5, 3);
        rivers.set(3, 1, 1.0);

        let seg = segment(&biomes, &rivers, &RegionParams { min_area: 3 });
        assert_eq!(seg.regions.len(), 3);
        assert_eq!(seg.stats.undersized, 1);
    }

    #[test]
    fn test_lonely_small_region_is_kept() {
        let mut biomes = Grid::new_with(6, 6, Grassland);
        biomes.set(4, 4, Mountain);
        let seg = segment(&biomes, &dry(6, 6), &RegionParams { min_area: 5 });

        assert_eq!(seg.regions.len(), 2);
        assert!(seg.regions.iter().any(|r| r.biome == Mountain && r.len() == 1));
        assert_partition(&seg.regions, 6, 6);
    }

    #[test]
    fn test_small_clusters_collapse_together() {
        // Three isolated single tundra cells and nothing else tundra:
        // they end up in one region of 3.
        let mut biomes = Grid::new_with(7, 7, Grassland);
        biomes.set(1, 1, Tundra);
        biomes.set(5, 1, Tundra);
        biomes.set(3, 5, Tundra);
        let seg = segment(&biomes, &dry(7, 7), &RegionParams { min_area: 10 });

        let tundra: Vec<_> = seg.regions.iter().filter(|r| r.biome == Tundra).collect();
        assert_eq!(tundra.len(), 1);
        assert_eq!(tundra[0].len(), 3);
        assert_partition(&seg.regions, 7, 7);
        assert_barriers_subset(&seg.regions);
    }

    #[test]
    fn test_equidistant_targets_pick_earliest() {
        // Desert cell at (2, 1) is equally close to the left and right desert columns.
        let biomes = grid_from(&[
            &[Desert, Swamp, Swamp, Swamp, Desert],
            &[Desert, Swamp, Desert, Swamp, Desert],
            &[Desert, Swamp, Swamp, Swamp, Desert],
        ]);
        let seg = segment(&biomes, &dry(5, 3), &RegionParams { min_area: 2 });

        let left = seg.regions.iter().find(|r| r.cells.contains(&(0, 0))).unwrap();
        assert!(left.cells.contains(&(2, 1)));
    }

    #[test]
    fn test_size_guarantee() {
        let biomes = checkerboard_stripes(24, 18);
        let min_area = 8;
        let seg = segment(&biomes, &dry(24, 18), &RegionParams { min_area });

        assert_partition(&seg.regions, 24, 18);
        assert_barriers_subset(&seg.regions);
        for region in &seg.regions {
            if region.len() < min_area {
                let others = seg.regions.iter().filter(|r| r.biome == region.biome).count();
                assert_eq!(others, 1, "undersized {:?} region has same-biome neighbours", region.biome);
            }
        }
    }

    #[test]
    fn test_region_map_matches_regions() {
        let biomes = checkerboard_stripes(9, 9);
        let seg = segment(&biomes, &dry(9, 9), &RegionParams { min_area: 4 });
        for (idx, region) in seg.regions.iter().enumerate() {
            for &(x, y) in &region.cells {
                assert_eq!(*seg.region_map.get(x, y), idx);
            }
        }
        assert!(seg.region_map.iter().all(|(_, _, &r)| r < seg.regions.len()));
    }

    #[test]
    fn test_tiny_grids() {
        let one = Grid::new_with(1, 1, Lake);
        let seg = segment(&one, &dry(1, 1), &RegionParams::default());
        assert_eq!(seg.regions.len(), 1);
        assert_eq!(seg.regions[0].barrier_cells, vec![(0, 0)]);

        let two = grid_from(&[&[Lake, Desert], &[Desert, Lake]]);
        let seg = segment(&two, &dry(2, 2), &RegionParams::default());
        assert_partition(&seg.regions, 2, 2);
        assert_eq!(seg.regions.len(), 2);
    }
}
