//! Local color-affinity graph over the unknown region of a trimap
//!
//! Every `Unknown` pixel `p` is connected to each pixel `q` of the
//! `(2r+1)×(2r+1)` window around it (clipped at the image border). Known
//! neighbors stay in the list; they anchor the solve to their fixed alpha.
//!
//! ## Weights
//!
//! ```text
//! w(p, q) = exp(-‖I_p - I_q‖² / (2 σ²_pq))
//! σ²_pq   = max((σ²(p) + σ²(q)) / 2, variance_floor)
//! ```
//!
//! `I` is the color normalized to `[0, 1]` and `σ²(p)` is the per-channel
//! mean of the color variance inside the window around `p`, taken from
//! summed-area tables. A textured window tolerates larger color jumps than
//! a flat one; the floor keeps flat regions from dividing by zero.
//!
//! The expression is symmetric in `p` and `q` down to the last bit, and
//! neighbors are enumerated in raster order, so identical inputs always
//! produce an identical graph.

use image::{Pixel, Primitive, Rgb};
use imageproc::definitions::Image;
use itertools::iproduct;
use tracing::{debug, instrument};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::MattingError;
use crate::imageops_matting::summed_area_table::SummedAreaTable;
use crate::imageops_matting::trimap::{Trimap, TrimapLabel};
use crate::utils::{subpixel_max, validate_matching_dimensions};

/// Largest accepted window radius
///
/// Each unknown pixel gets up to `(2r+1)² - 1` edges, so the radius bounds
/// the cost of the graph and of every solver iteration. 16 gives a 33×33
/// window.
pub const MAX_WINDOW_RADIUS: u32 = 16;

/// One weighted connection from an unknown pixel to a neighbor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffinityEdge {
    /// Row-major pixel index of the neighbor
    pub neighbor: u32,
    /// Non-negative similarity weight
    pub weight: f64,
}

/// Adjacency lists of all unknown pixels
///
/// Rows are stored back to back: node `i` (the `i`-th unknown pixel in
/// raster order) owns `edges[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityGraph {
    width: u32,
    height: u32,
    nodes: Vec<u32>,
    offsets: Vec<usize>,
    edges: Vec<AffinityEdge>,
}

impl AffinityGraph {
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of unknown pixels (rows of the graph)
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Row-major pixel indices of the unknown pixels, in node order
    #[must_use]
    pub fn nodes(&self) -> &[u32] {
        &self.nodes
    }

    /// Neighbors of node `node`.
    ///
    /// # Panics
    ///
    /// Panics if `node >= self.node_count()`.
    #[must_use]
    pub fn neighbors(&self, node: usize) -> &[AffinityEdge] {
        &self.edges[self.offsets[node]..self.offsets[node + 1]]
    }

    /// Iterates `(pixel_index, neighbors)` for every node.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &[AffinityEdge])> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(move |(node, &pixel)| (pixel, self.neighbors(node)))
    }
}

/// Per-pixel normalized colors plus windowed variance
struct LocalStatistics {
    colors: Vec<[f64; 3]>,
    variance: Vec<f64>,
}

impl LocalStatistics {
    fn new<S>(image: &Image<Rgb<S>>, window_radius: u32) -> Self
    where
        Rgb<S>: Pixel<Subpixel = S>,
        S: Primitive,
    {
        let (width, height) = image.dimensions();
        let max_value = f64::from(subpixel_max::<S>());

        let colors: Vec<[f64; 3]> = image
            .pixels()
            .map(|pixel| {
                let channels = pixel.channels();
                std::array::from_fn(|c| channels[c].to_f64().unwrap_or(0.0) / max_value)
            })
            .collect();

        let sums: Vec<SummedAreaTable<f64>> = (0..3)
            .map(|c| SummedAreaTable::from_fn(width, height, |i| colors[i][c]))
            .collect();
        let square_sums: Vec<SummedAreaTable<f64>> = (0..3)
            .map(|c| SummedAreaTable::from_fn(width, height, |i| colors[i][c] * colors[i][c]))
            .collect();

        let radius = i64::from(window_radius);
        let variance = iproduct!(0..i64::from(height), 0..i64::from(width))
            .map(|(y, x)| {
                let (x1, y1, x2, y2) = (x - radius, y - radius, x + radius, y + radius);
                let count = ((x2.min(i64::from(width) - 1) - x1.max(0) + 1)
                    * (y2.min(i64::from(height) - 1) - y1.max(0) + 1)) as f64;

                let total: f64 = sums
                    .iter()
                    .zip(&square_sums)
                    .map(|(sum, square_sum)| {
                        let mean = sum.rectangle_sum(x1, y1, x2, y2) / count;
                        let square_mean = square_sum.rectangle_sum(x1, y1, x2, y2) / count;
                        // Var = E[I²] - E[I]², clipped against cancellation
                        mean.mul_add(-mean, square_mean).max(0.0)
                    })
                    .sum();
                total / 3.0
            })
            .collect();

        Self { colors, variance }
    }

    #[inline]
    fn weight(&self, p: usize, q: usize, variance_floor: f64) -> f64 {
        let [pr, pg, pb] = self.colors[p];
        let [qr, qg, qb] = self.colors[q];
        let distance = (pr - qr).powi(2) + (pg - qg).powi(2) + (pb - qb).powi(2);
        let sigma_sq = ((self.variance[p] + self.variance[q]) * 0.5).max(variance_floor);
        (-distance / (2.0 * sigma_sq)).exp()
    }
}

/// Builds the affinity graph for the unknown pixels of `trimap`.
///
/// # Arguments
///
/// * `image` - Original color image (any RGB subpixel type)
/// * `trimap` - Trimap of the same dimensions
/// * `window_radius` - Neighborhood radius; `1` gives a 3×3 window
/// * `variance_floor` - Lower bound for the local variance, must be positive
///
/// # Errors
///
/// * `MattingError::InvalidMaskShape` - When image and trimap dimensions differ
/// * `MattingError::ImageTooLarge` - When pixel indices do not fit in `u32`
#[instrument(skip_all, fields(window_radius = window_radius))]
pub fn build_affinities<S>(
    image: &Image<Rgb<S>>,
    trimap: &Trimap,
    window_radius: u32,
    variance_floor: f64,
) -> Result<AffinityGraph, MattingError>
where
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive,
{
    validate_matching_dimensions(image.dimensions(), trimap.dimensions())?;
    let (width, height) = image.dimensions();
    ensure_indexable(width, height)?;

    let nodes: Vec<u32> = trimap
        .labels()
        .enumerate()
        .filter(|(_, label)| *label == TrimapLabel::Unknown)
        .map(|(index, _)| u32::try_from(index))
        .collect::<Result<_, _>>()
        .map_err(|_| MattingError::ImageTooLarge { width, height })?;

    if nodes.is_empty() {
        return Ok(AffinityGraph {
            width,
            height,
            nodes,
            offsets: vec![0],
            edges: Vec::new(),
        });
    }

    let statistics = LocalStatistics::new(image, window_radius);
    let neighbors_of = |&pixel: &u32| {
        window_edges(
            &statistics,
            pixel,
            (width, height),
            window_radius,
            variance_floor,
        )
    };

    #[cfg(feature = "rayon")]
    let rows: Vec<Vec<AffinityEdge>> = nodes.par_iter().map(neighbors_of).collect();
    #[cfg(not(feature = "rayon"))]
    let rows: Vec<Vec<AffinityEdge>> = nodes.iter().map(neighbors_of).collect();

    let mut offsets = Vec::with_capacity(nodes.len() + 1);
    let mut edges = Vec::with_capacity(rows.iter().map(Vec::len).sum());
    offsets.push(0);
    for row in rows {
        edges.extend(row);
        offsets.push(edges.len());
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "affinity graph built");

    Ok(AffinityGraph {
        width,
        height,
        nodes,
        offsets,
        edges,
    })
}

/// Every row-major pixel index, neighbors included, must fit in `u32`.
fn ensure_indexable(width: u32, height: u32) -> Result<(), MattingError> {
    if u64::from(width) * u64::from(height) > u64::from(u32::MAX) + 1 {
        return Err(MattingError::ImageTooLarge { width, height });
    }
    Ok(())
}

fn window_edges(
    statistics: &LocalStatistics,
    pixel: u32,
    (width, height): (u32, u32),
    window_radius: u32,
    variance_floor: f64,
) -> Vec<AffinityEdge> {
    let (x, y) = (pixel % width, pixel / width);
    let x_range =
        x.saturating_sub(window_radius)..=x.saturating_add(window_radius).min(width - 1);
    let y_range =
        y.saturating_sub(window_radius)..=y.saturating_add(window_radius).min(height - 1);

    iproduct!(y_range, x_range)
        .filter(|&(ny, nx)| (nx, ny) != (x, y))
        .map(|(ny, nx)| {
            let neighbor = ny * width + nx;
            AffinityEdge {
                neighbor,
                weight: statistics.weight(pixel as usize, neighbor as usize, variance_floor),
            }
        })
        .collect()
}
