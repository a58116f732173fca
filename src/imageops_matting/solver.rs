//! Alpha solver for the unknown region of a trimap
//!
//! ## Linear system
//!
//! Each unknown pixel `i` contributes one equation:
//!
//! ```text
//! (Σ_j w_ij + λ) α_i - Σ_{j ∈ U} w_ij α_j = Σ_{j ∈ K} w_ij ᾱ_j + λ m_i
//! ```
//!
//! where `U` are the unknown neighbors, `K` the known ones with fixed alpha
//! `ᾱ_j ∈ {0, 1}`, `m_i` the coarse mask value and `λ` the prior weight.
//! The smoothness terms pull `α_i` toward the weighted average of its
//! neighbors; known neighbors act as anchors scaled by their affinity.
//!
//! With symmetric weights and `λ > 0` the matrix is symmetric and strictly
//! diagonally dominant, hence positive definite. The prior term also keeps
//! the system well-posed when no anchor is reachable (an all-unknown
//! trimap): the solution is then a smoothed copy of the coarse mask.
//!
//! ## Solver
//!
//! Jacobi-preconditioned conjugate gradient, warm-started from the coarse
//! mask. Iteration stops at relative residual `‖b - Aα‖ / ‖b‖ <= tolerance`
//! or after `max_iterations`. Hitting the cap is not an error: the latest
//! iterate is clamped to `[0, 1]` and returned with
//! [`SolveStatus::NotConverged`].
//!
//! Dot products are accumulated sequentially so results are reproducible
//! bit for bit; only the row-independent matrix-vector product is
//! parallelized when the `rayon` feature is enabled.

use image::Luma;
use imageproc::definitions::Image;
use tracing::{debug, instrument};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::MattingError;
use crate::imageops_matting::affinity::AffinityGraph;
use crate::imageops_matting::trimap::{Trimap, TrimapLabel};
use crate::utils::{clamp_unit, validate_matching_dimensions};

/// Iteration controls for [`solve`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    /// Relative residual at which the solve is considered converged
    pub tolerance: f64,
    /// Hard cap on conjugate gradient iterations
    pub max_iterations: usize,
    /// Weight `λ` of the pull toward the coarse mask; must be positive
    pub prior_weight: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
            prior_weight: 1e-3,
        }
    }
}

/// How the solve ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolveStatus {
    /// The trimap had no unknown pixels; nothing was solved
    NoUnknownPixels,
    /// Residual reached the tolerance
    Converged { iterations: usize, residual: f64 },
    /// Iteration cap reached (or the iteration broke down) first
    NotConverged { iterations: usize, residual: f64 },
}

impl SolveStatus {
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        !matches!(self, Self::NotConverged { .. })
    }
}

/// Complete alpha buffer plus solver diagnostics
#[derive(Debug, Clone)]
pub struct AlphaSolution {
    /// Alpha per pixel, in `[0, 1]`; exactly 1/0 on known pixels
    pub alpha: Image<Luma<f32>>,
    pub status: SolveStatus,
}

/// Symmetric sparse system over the unknown pixels (CSR, diagonal apart)
struct SparseSystem {
    diagonal: Vec<f64>,
    row_offsets: Vec<usize>,
    columns: Vec<u32>,
    values: Vec<f64>,
    rhs: Vec<f64>,
    initial: Vec<f64>,
}

impl SparseSystem {
    fn assemble(
        trimap: &Trimap,
        graph: &AffinityGraph,
        prior: &[f32],
        prior_weight: f64,
        slots: &[u32],
    ) -> Self {
        let unknowns = graph.node_count();
        let mut system = Self {
            diagonal: Vec::with_capacity(unknowns),
            row_offsets: Vec::with_capacity(unknowns + 1),
            columns: Vec::with_capacity(graph.edge_count()),
            values: Vec::with_capacity(graph.edge_count()),
            rhs: Vec::with_capacity(unknowns),
            initial: Vec::with_capacity(unknowns),
        };
        system.row_offsets.push(0);

        for (pixel, edges) in graph.rows() {
            let prior_alpha = f64::from(clamp_unit(prior[pixel as usize], 0.0));
            let mut diagonal = prior_weight;
            let mut rhs = prior_weight * prior_alpha;

            for edge in edges {
                let neighbor = edge.neighbor as usize;
                diagonal += edge.weight;
                match slots[neighbor] {
                    NO_SLOT => {
                        let anchor = fixed_alpha(trimap.label_at(neighbor), prior[neighbor]);
                        rhs += edge.weight * f64::from(anchor);
                    }
                    slot => {
                        system.columns.push(slot);
                        system.values.push(-edge.weight);
                    }
                }
            }

            system.diagonal.push(diagonal);
            system.rhs.push(rhs);
            system.initial.push(prior_alpha);
            system.row_offsets.push(system.columns.len());
        }

        system
    }

    fn len(&self) -> usize {
        self.diagonal.len()
    }

    fn row_product(&self, row: usize, x: &[f64]) -> f64 {
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        self.columns[range.clone()]
            .iter()
            .zip(&self.values[range])
            .fold(self.diagonal[row] * x[row], |sum, (&column, &value)| {
                value.mul_add(x[column as usize], sum)
            })
    }

    /// `out = A x`
    fn multiply(&self, x: &[f64], out: &mut [f64]) {
        #[cfg(feature = "rayon")]
        out.par_iter_mut()
            .enumerate()
            .for_each(|(row, value)| *value = self.row_product(row, x));

        #[cfg(not(feature = "rayon"))]
        out.iter_mut()
            .enumerate()
            .for_each(|(row, value)| *value = self.row_product(row, x));
    }
}

const NO_SLOT: u32 = u32::MAX;

/// Alpha of a pixel outside the system: fixed by its label, or the coarse
/// mask for an unknown pixel the graph does not cover.
fn fixed_alpha(label: TrimapLabel, prior: f32) -> f32 {
    label
        .known_alpha()
        .unwrap_or_else(|| clamp_unit(prior, 0.0))
}

/// Solves for alpha over the unknown pixels of `trimap`.
///
/// # Arguments
///
/// * `trimap` - Trimap fixing the known pixels
/// * `graph` - Affinity graph built from the same trimap
/// * `prior` - Coarse mask; warm start and weak data term for unknown pixels
/// * `params` - Tolerance, iteration cap and prior weight
///
/// # Errors
///
/// * `MattingError::InvalidMaskShape` - When graph or prior dimensions differ
///   from the trimap
#[instrument(skip_all, fields(unknown = graph.node_count()))]
pub fn solve(
    trimap: &Trimap,
    graph: &AffinityGraph,
    prior: &Image<Luma<f32>>,
    params: &SolverParams,
) -> Result<AlphaSolution, MattingError> {
    validate_matching_dimensions(trimap.dimensions(), graph.dimensions())?;
    validate_matching_dimensions(trimap.dimensions(), prior.dimensions())?;

    let (width, height) = trimap.dimensions();
    let prior = prior.as_raw();

    let mut slots = vec![NO_SLOT; prior.len()];
    for (slot, &pixel) in graph.nodes().iter().enumerate() {
        slots[pixel as usize] = slot as u32;
    }

    let (solution, status) = if graph.is_empty() {
        (Vec::new(), SolveStatus::NoUnknownPixels)
    } else {
        let system = SparseSystem::assemble(trimap, graph, prior, params.prior_weight, &slots);
        conjugate_gradient(&system, params)
    };

    let alpha = Image::from_fn(width, height, |x, y| {
        let index = y as usize * width as usize + x as usize;
        let value = match slots[index] {
            NO_SLOT => fixed_alpha(trimap.label_at(index), prior[index]),
            slot => {
                let fallback = clamp_unit(prior[index], 0.0);
                clamp_unit(solution[slot as usize] as f32, fallback)
            }
        };
        Luma([value])
    });

    debug!(?status, "alpha solved");
    Ok(AlphaSolution { alpha, status })
}

fn conjugate_gradient(system: &SparseSystem, params: &SolverParams) -> (Vec<f64>, SolveStatus) {
    let n = system.len();
    let mut x = system.initial.clone();

    let mut r = vec![0.0; n];
    system.multiply(&x, &mut r);
    r.iter_mut()
        .zip(&system.rhs)
        .for_each(|(residual, &b)| *residual = b - *residual);

    let rhs_norm = norm(&system.rhs);
    let scale = if rhs_norm > 0.0 { rhs_norm } else { 1.0 };
    let mut residual = norm(&r) / scale;
    if residual <= params.tolerance {
        return (
            x,
            SolveStatus::Converged {
                iterations: 0,
                residual,
            },
        );
    }

    let inverse_diagonal: Vec<f64> = system
        .diagonal
        .iter()
        .map(|&d| if d > 0.0 { d.recip() } else { 1.0 })
        .collect();

    let mut z: Vec<f64> = r.iter().zip(&inverse_diagonal).map(|(r, m)| r * m).collect();
    let mut p = z.clone();
    let mut rz = dot(&r, &z);
    let mut ap = vec![0.0; n];
    let mut iterations = 0;

    while iterations < params.max_iterations {
        system.multiply(&p, &mut ap);
        let curvature = dot(&p, &ap);
        if curvature <= 0.0 || !curvature.is_finite() {
            break;
        }

        let step = rz / curvature;
        x.iter_mut().zip(&p).for_each(|(x, &p)| *x = step.mul_add(p, *x));
        r.iter_mut().zip(&ap).for_each(|(r, &ap)| *r = (-step).mul_add(ap, *r));
        iterations += 1;

        residual = norm(&r) / scale;
        if residual <= params.tolerance {
            return (
                x,
                SolveStatus::Converged {
                    iterations,
                    residual,
                },
            );
        }

        z.iter_mut()
            .zip(&r)
            .zip(&inverse_diagonal)
            .for_each(|((z, &r), &m)| *z = r * m);
        let rz_next = dot(&r, &z);
        let beta = rz_next / rz;
        rz = rz_next;
        p.iter_mut().zip(&z).for_each(|(p, &z)| *p = beta.mul_add(*p, z));
    }

    (
        x,
        SolveStatus::NotConverged {
            iterations,
            residual,
        },
    )
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).fold(0.0, |sum, (&a, &b)| a.mul_add(b, sum))
}

#[inline]
fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
