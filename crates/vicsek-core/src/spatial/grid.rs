use super::NeighborLists;
use crate::geometry::Domain;

/// Largest number of cells along one side of the grid.
const MAX_CELLS_PER_SIDE: usize = 1024;

/// Relative widening of the cell side over the smallest radius, so a
/// neighbor at exactly that radius never lands two cells away through rounding.
const CELL_MARGIN: f64 = 1e-9;

/// Uniform periodic bucket grid, rebuilt every step by counting sort.
///
/// The cell side is at least the smallest query radius, so a particle with
/// radius `r` only has to inspect `ceil(r / cell_size)` cells in each
/// direction (the 3x3 block for ordinary particles).
#[derive(Clone, Debug, Default)]
pub struct CellGrid {
    cells_per_side: usize,
    cell_size: f64,
    cell_start: Vec<usize>,
    cell_items: Vec<usize>,
    particle_cells: Vec<[usize; 2]>,
    cursor: Vec<usize>,
}

impl CellGrid {
    pub fn cells_per_side(&self) -> usize {
        self.cells_per_side
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Bucket `positions` into cells whose side is at least `min_radius`.
    pub fn rebuild(&mut self, domain: &Domain, positions: &[[f64; 2]], min_radius: f64) {
        let length = domain.length();
        let per_side = if min_radius.is_finite() && min_radius > 0.0 {
            (length / (min_radius * (1.0 + CELL_MARGIN))).floor()
        } else {
            1.0
        };
        let n = (per_side as usize).clamp(1, MAX_CELLS_PER_SIDE);
        self.cells_per_side = n;
        self.cell_size = length / n as f64;

        let cell_size = self.cell_size;
        self.particle_cells.clear();
        self.particle_cells.extend(positions.iter().map(|p| {
            [
                Self::axis_cell(p[0], cell_size, n),
                Self::axis_cell(p[1], cell_size, n),
            ]
        }));

        let cell_count = n * n;
        self.cell_start.clear();
        self.cell_start.resize(cell_count + 1, 0);
        for &[cx, cy] in &self.particle_cells {
            self.cell_start[cy * n + cx + 1] += 1;
        }
        for c in 0..cell_count {
            self.cell_start[c + 1] += self.cell_start[c];
        }

        self.cell_items.clear();
        self.cell_items.resize(positions.len(), 0);
        self.cursor.clear();
        self.cursor.extend_from_slice(&self.cell_start[..cell_count]);
        for (index, &[cx, cy]) in self.particle_cells.iter().enumerate() {
            let cell = cy * n + cx;
            self.cell_items[self.cursor[cell]] = index;
            self.cursor[cell] += 1;
        }
    }

    fn axis_cell(coord: f64, cell_size: f64, cells_per_side: usize) -> usize {
        ((coord / cell_size) as usize).min(cells_per_side - 1)
    }

    /// Particle indices bucketed in cell `(cx, cy)`.
    pub fn cell(&self, cx: usize, cy: usize) -> &[usize] {
        let c = cy * self.cells_per_side + cx;
        &self.cell_items[self.cell_start[c]..self.cell_start[c + 1]]
    }

    /// Query every particle against the grid built by [`CellGrid::rebuild`].
    pub fn find(
        &self,
        domain: &Domain,
        positions: &[[f64; 2]],
        radii: &[f64],
        out: &mut NeighborLists,
    ) {
        out.clear();
        for (i, (&center, &radius)) in positions.iter().zip(radii).enumerate() {
            let r_sq = radius * radius;
            let reach = (radius / self.cell_size).ceil() as usize;
            let [cx, cy] = self.particle_cells[i];
            let (x_start, x_len) = self.axis_span(cx, reach);
            let (y_start, y_len) = self.axis_span(cy, reach);
            for ky in 0..y_len {
                let gy = (y_start + ky) % self.cells_per_side;
                for kx in 0..x_len {
                    let gx = (x_start + kx) % self.cells_per_side;
                    for &j in self.cell(gx, gy) {
                        if domain.distance_sq(center, positions[j]) <= r_sq {
                            out.push(j);
                        }
                    }
                }
            }
            out.close_set();
        }
    }

    /// First cell and number of distinct cells covering `center +/- reach`.
    fn axis_span(&self, center: usize, reach: usize) -> (usize, usize) {
        let n = self.cells_per_side;
        let width = reach.saturating_mul(2).saturating_add(1);
        if width >= n {
            (0, n)
        } else {
            ((center + n - reach) % n, width)
        }
    }
}
