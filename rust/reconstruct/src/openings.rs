// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Door and window detection in wall fragments
//!
//! Wall vertices are projected into a 2D occupancy grid spanned by the wall's
//! horizontal axis and the height above the floor. Empty axis-aligned
//! rectangles are found with a greedy sweep: start at the first free cell,
//! expand right while free, then expand upward while the whole next row stays
//! free. Each rectangle's edges are then pulled out to the nearest occupied
//! samples, so the reported size does not depend on the cell size.
//!
//! The sweep only reports axis-aligned rectangles; occluded or L-shaped
//! gaps come back as several smaller pieces or not at all.

use crate::config::ClassifierConfig;
use crate::statistics::ScanStatistics;
use crate::surface::OpeningType;
use crate::types::{DetectedOpening, OpeningSource};
use nalgebra::{Point2, Point3, Vector2, Vector3};

const MAX_GRID_CELLS: usize = 4_000_000;
const INFERRED_CONFIDENCE: f64 = 0.75;

/// Tolerance added before flooring a coordinate into a cell index
const CELL_EPSILON: f64 = 1e-9;

/// Unit plan direction of a wall normal; `None` for (near) vertical vectors
pub fn plan_normal(normal: &Vector3<f64>) -> Option<Vector2<f64>> {
    Vector2::new(normal.x, normal.z).try_normalize(1e-9)
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    count: u32,
    min_t: f64,
    max_t: f64,
    min_y: f64,
    max_y: f64,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            count: 0,
            min_t: f64::INFINITY,
            max_t: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }
}

/// Rectangle of free cells, inclusive start, exclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapCells {
    pub col: usize,
    pub row: usize,
    pub cols: usize,
    pub rows: usize,
}

/// Free rectangle in wall coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    /// Along the wall axis
    pub left: f64,
    pub right: f64,
    /// Above the floor
    pub bottom: f64,
    pub top: f64,
}

impl Gap {
    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Occupancy of a wall's (along-axis, height) plane
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    cols: usize,
    rows: usize,
    cell_size: f64,
    min_t: f64,
    min_y: f64,
    max_t: f64,
    max_y: f64,
    cells: Vec<Cell>,
}

impl OccupancyGrid {
    /// Bin `(t, y)` samples into square cells.
    ///
    /// `None` for empty input, a non-positive cell size or an absurdly
    /// large extent.
    pub fn build(samples: &[(f64, f64)], cell_size: f64) -> Option<Self> {
        if samples.is_empty() || !(cell_size > 0.0) {
            return None;
        }

        let (mut min_t, mut max_t) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(t, y) in samples {
            min_t = min_t.min(t);
            max_t = max_t.max(t);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if !(min_t.is_finite() && max_t.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return None;
        }

        let cols = (((max_t - min_t) / cell_size).ceil() as usize).max(1);
        let rows = (((max_y - min_y) / cell_size).ceil() as usize).max(1);
        if cols.saturating_mul(rows) > MAX_GRID_CELLS {
            return None;
        }

        let mut grid = Self {
            cols,
            rows,
            cell_size,
            min_t,
            min_y,
            max_t,
            max_y,
            cells: vec![Cell::default(); cols * rows],
        };
        for &(t, y) in samples {
            let col = grid.index_of(t - min_t, cols);
            let row = grid.index_of(y - min_y, rows);
            let cell = &mut grid.cells[row * cols + col];
            cell.count += 1;
            cell.min_t = cell.min_t.min(t);
            cell.max_t = cell.max_t.max(t);
            cell.min_y = cell.min_y.min(y);
            cell.max_y = cell.max_y.max(y);
        }
        Some(grid)
    }

    fn index_of(&self, offset: f64, len: usize) -> usize {
        ((offset / self.cell_size + CELL_EPSILON).floor().max(0.0) as usize).min(len - 1)
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    fn cell(&self, col: usize, row: usize) -> &Cell {
        &self.cells[row * self.cols + col]
    }

    #[inline]
    pub fn is_occupied(&self, col: usize, row: usize) -> bool {
        self.cell(col, row).count > 0
    }

    /// Greedy search for free rectangles at least `min_cells` on each side
    pub fn find_gaps(&self, min_cells: usize) -> Vec<GapCells> {
        let mut consumed = vec![false; self.cells.len()];
        let free = |col: usize, row: usize, consumed: &[bool]| {
            !self.is_occupied(col, row) && !consumed[row * self.cols + col]
        };

        let mut gaps = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                if !free(col, row, &consumed) {
                    continue;
                }

                let mut end_col = col + 1;
                while end_col < self.cols && free(end_col, row, &consumed) {
                    end_col += 1;
                }

                let mut end_row = row + 1;
                while end_row < self.rows && (col..end_col).all(|c| free(c, end_row, &consumed)) {
                    end_row += 1;
                }

                for r in row..end_row {
                    for c in col..end_col {
                        consumed[r * self.cols + c] = true;
                    }
                }

                let gap = GapCells {
                    col,
                    row,
                    cols: end_col - col,
                    rows: end_row - row,
                };
                if gap.cols >= min_cells && gap.rows >= min_cells {
                    gaps.push(gap);
                }
            }
        }
        gaps
    }

    fn occupied_cells<'a>(
        &'a self,
        coords: impl Iterator<Item = (usize, usize)> + 'a,
    ) -> impl Iterator<Item = &'a Cell> + 'a {
        coords
            .map(move |(col, row)| self.cell(col, row))
            .filter(|cell| cell.count > 0)
    }

    /// Expand a cell rectangle to the nearest occupied samples around it
    pub fn refine(&self, gap: &GapCells) -> Gap {
        let end_col = gap.col + gap.cols;
        let end_row = gap.row + gap.rows;
        let step = self.cell_size;

        let left = (gap.col > 0)
            .then(|| {
                self.occupied_cells((gap.row..end_row).map(|r| (gap.col - 1, r)))
                    .map(|c| c.max_t)
                    .reduce(f64::max)
            })
            .flatten()
            .unwrap_or(self.min_t + gap.col as f64 * step);

        let right = (end_col < self.cols)
            .then(|| {
                self.occupied_cells((gap.row..end_row).map(|r| (end_col, r)))
                    .map(|c| c.min_t)
                    .reduce(f64::min)
            })
            .flatten()
            .unwrap_or((self.min_t + end_col as f64 * step).min(self.max_t));

        let bottom = (gap.row > 0)
            .then(|| {
                self.occupied_cells((gap.col..end_col).map(|c| (c, gap.row - 1)))
                    .map(|c| c.max_y)
                    .reduce(f64::max)
            })
            .flatten()
            .unwrap_or(self.min_y + gap.row as f64 * step);

        let top = (end_row < self.rows)
            .then(|| {
                self.occupied_cells((gap.col..end_col).map(|c| (c, end_row)))
                    .map(|c| c.min_y)
                    .reduce(f64::min)
            })
            .flatten()
            .unwrap_or((self.min_y + end_row as f64 * step).min(self.max_y));

        Gap {
            left,
            right,
            bottom,
            top,
        }
    }
}

/// Door/window rules for a free rectangle, heights relative to the floor
pub fn classify_gap(gap: &Gap, config: &ClassifierConfig) -> Option<OpeningType> {
    let (width, height) = (gap.width(), gap.height());
    let in_range = |v: f64, range: [f64; 2]| v >= range[0] && v <= range[1];

    if gap.bottom <= config.door_floor_tolerance
        && in_range(width, config.door_width)
        && in_range(height, config.door_height)
    {
        Some(OpeningType::Door)
    } else if gap.bottom >= config.window_min_sill
        && width >= config.window_min_size
        && height >= config.window_min_size
    {
        Some(OpeningType::Window)
    } else {
        None
    }
}

/// Find doors and windows in one wall fragment.
///
/// Heights are taken relative to the estimated floor, or the fragment's own
/// base while the floor is unknown. Every opening found is offered to the
/// statistics, which drop duplicates of already known ones. Returns all
/// openings found in this fragment.
pub fn detect_openings(
    source: OpeningSource,
    vertices: &[Point3<f64>],
    wall_normal: &Vector3<f64>,
    stats: &mut ScanStatistics,
    config: &ClassifierConfig,
) -> Vec<DetectedOpening> {
    let Some(facing) = plan_normal(wall_normal) else {
        return Vec::new();
    };
    if vertices.is_empty() {
        return Vec::new();
    }
    let axis = Vector2::new(facing.y, -facing.x);

    let floor = stats
        .floor_height()
        .unwrap_or_else(|| vertices.iter().map(|v| v.y).fold(f64::INFINITY, f64::min));

    let mut depth_sum = 0.0;
    let samples: Vec<(f64, f64)> = vertices
        .iter()
        .map(|v| {
            let p = Vector2::new(v.x, v.z);
            depth_sum += p.dot(&facing);
            (p.dot(&axis), v.y - floor)
        })
        .collect();
    let depth = depth_sum / vertices.len() as f64;

    let Some(grid) = OccupancyGrid::build(&samples, config.occupancy_cell_size) else {
        return Vec::new();
    };

    let mut openings = Vec::new();
    for cells in grid.find_gaps(config.min_gap_cells) {
        let gap = grid.refine(&cells);
        let Some(kind) = classify_gap(&gap, config) else {
            continue;
        };

        let center_t = (gap.left + gap.right) * 0.5;
        let plan = Point2::from(axis * center_t + facing * depth);
        let opening = DetectedOpening {
            kind,
            position: Point3::new(plan.x, floor, plan.y),
            width: gap.width(),
            bottom: gap.bottom,
            top: gap.top,
            wall_normal: Vector3::new(facing.x, 0.0, facing.y),
            confidence: INFERRED_CONFIDENCE,
            confirmed: false,
            source,
        };
        stats.record_opening(opening.clone());
        openings.push(opening);
    }
    openings
}
