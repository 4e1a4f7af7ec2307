//! Piecewise interpolants over a Delaunay triangulation.
//!
//! - Linear: barycentric blend of the three vertex values.
//! - Cubic: cubic Bézier triangle per face. Edge control points come from
//!   vertex gradients estimated by weighted least squares over each vertex's
//!   neighbours; the interior control point uses the quadratic-precision
//!   rule `b111 = E + (E - V) / 2`. Linear fields are reproduced exactly.
//!
//! All geometry is in the triangulation's normalized coordinates.

use nalgebra::{Matrix2, Vector2};

use super::triangulation::Triangulation;

/// Vertex values, one entry per interpolated component.
pub(crate) type Values = [f64; 2];

/// Per-vertex gradients for both components: `[component][d/dx, d/dy]`.
pub(crate) type Gradients = [[f64; 2]; 2];

pub(crate) fn linear(tri: &Triangulation, face: usize, w: [f64; 3], values: &[Values]) -> Values {
    let v = tri.triangles()[face];
    let mut out = [0.0; 2];
    for (c, slot) in out.iter_mut().enumerate() {
        *slot = (0..3).map(|k| w[k] * values[v[k]][c]).sum();
    }
    out
}

/// Estimate vertex gradients from neighbouring vertex values.
///
/// Vertices with fewer than two neighbours, or whose neighbours are all
/// collinear with them, get a zero gradient.
pub(crate) fn estimate_gradients(tri: &Triangulation, values: &[Values]) -> Vec<Gradients> {
    (0..values.len())
        .map(|i| {
            let neighbors = tri.neighbors(i);
            if neighbors.len() < 2 {
                return [[0.0; 2]; 2];
            }
            let pi = tri.point(i);
            let mut ata = Matrix2::<f64>::zeros();
            let mut atb = [Vector2::<f64>::zeros(); 2];
            for &j in neighbors {
                let pj = tri.point(j);
                let d = Vector2::new(pj[0] - pi[0], pj[1] - pi[1]);
                let dist2 = d.norm_squared();
                if dist2 == 0.0 {
                    continue;
                }
                let w = 1.0 / dist2;
                ata += w * d * d.transpose();
                for c in 0..2 {
                    atb[c] += w * (values[j][c] - values[i][c]) * d;
                }
            }
            // Relative conditioning check: both eigenvalues of a 2x2 SPD matrix
            // are bounded below by det / trace.
            let trace = ata.trace();
            if trace <= 0.0 || ata.determinant() / (trace * trace) < 1e-10 {
                return [[0.0; 2]; 2];
            }
            match ata.try_inverse() {
                Some(inv) => {
                    let g0 = inv * atb[0];
                    let g1 = inv * atb[1];
                    [[g0.x, g0.y], [g1.x, g1.y]]
                }
                None => [[0.0; 2]; 2],
            }
        })
        .collect()
}

pub(crate) fn cubic(
    tri: &Triangulation,
    face: usize,
    w: [f64; 3],
    values: &[Values],
    gradients: &[Gradients],
) -> Values {
    let v = tri.triangles()[face];
    let p = [tri.point(v[0]), tri.point(v[1]), tri.point(v[2])];
    let mut out = [0.0; 2];
    for (c, slot) in out.iter_mut().enumerate() {
        let f = [values[v[0]][c], values[v[1]][c], values[v[2]][c]];
        let g = [gradients[v[0]][c], gradients[v[1]][c], gradients[v[2]][c]];
        *slot = bezier_patch(p, f, g, w);
    }
    out
}

/// Evaluate a cubic Bézier triangle built from vertex values and gradients.
fn bezier_patch(p: [[f64; 2]; 3], f: [f64; 3], g: [[f64; 2]; 3], w: [f64; 3]) -> f64 {
    // Control point on edge i->j, one third of the way from vertex i.
    let edge = |i: usize, j: usize| -> f64 {
        let dx = p[j][0] - p[i][0];
        let dy = p[j][1] - p[i][1];
        f[i] + (g[i][0] * dx + g[i][1] * dy) / 3.0
    };
    let b210 = edge(0, 1);
    let b120 = edge(1, 0);
    let b201 = edge(0, 2);
    let b102 = edge(2, 0);
    let b021 = edge(1, 2);
    let b012 = edge(2, 1);

    let e = (b210 + b120 + b201 + b102 + b021 + b012) / 6.0;
    let vmean = (f[0] + f[1] + f[2]) / 3.0;
    let b111 = e + (e - vmean) / 2.0;

    let [u, v, t] = w;
    f[0] * u * u * u
        + f[1] * v * v * v
        + f[2] * t * t * t
        + 3.0 * b210 * u * u * v
        + 3.0 * b120 * u * v * v
        + 3.0 * b201 * u * u * t
        + 3.0 * b102 * u * t * t
        + 3.0 * b021 * v * v * t
        + 3.0 * b012 * v * t * t
        + 6.0 * b111 * u * v * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scattered(n: usize) -> Vec<[f64; 2]> {
        (0..n)
            .map(|i| {
                let k = i as f64;
                [(k * 0.754_877_666).fract(), (k * 0.569_840_291).fract()]
            })
            .collect()
    }

    #[test]
    fn gradients_of_linear_field_are_exact() {
        let pts = scattered(60);
        let tri = Triangulation::new(&pts);
        // Field in normalized coordinates so gradients are directly comparable.
        let values: Vec<Values> = (0..pts.len())
            .map(|i| {
                let q = tri.point(i);
                [1.0 + 2.0 * q[0] - 3.0 * q[1], -0.5 * q[0] + 0.25 * q[1]]
            })
            .collect();
        let grads = estimate_gradients(&tri, &values);
        for g in &grads {
            assert!((g[0][0] - 2.0).abs() < 1e-9 && (g[0][1] + 3.0).abs() < 1e-9);
            assert!((g[1][0] + 0.5).abs() < 1e-9 && (g[1][1] - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn bezier_patch_interpolates_vertices() {
        let p = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let f = [1.0, 2.0, 4.0];
        let g = [[0.3, -0.2], [1.0, 0.5], [-0.7, 0.1]];
        assert!((bezier_patch(p, f, g, [1.0, 0.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!((bezier_patch(p, f, g, [0.0, 1.0, 0.0]) - 2.0).abs() < 1e-12);
        assert!((bezier_patch(p, f, g, [0.0, 0.0, 1.0]) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn bezier_patch_reproduces_quadratic_with_exact_gradients() {
        // f(x, y) = x^2 + x*y - y^2 + x
        let field = |x: f64, y: f64| x * x + x * y - y * y + x;
        let grad = |x: f64, y: f64| [2.0 * x + y + 1.0, x - 2.0 * y];
        let p = [[0.1, 0.2], [0.9, 0.3], [0.4, 0.8]];
        let f = [field(0.1, 0.2), field(0.9, 0.3), field(0.4, 0.8)];
        let g = [grad(0.1, 0.2), grad(0.9, 0.3), grad(0.4, 0.8)];

        let w = [0.2, 0.5, 0.3];
        let x = w[0] * p[0][0] + w[1] * p[1][0] + w[2] * p[2][0];
        let y = w[0] * p[0][1] + w[1] * p[1][1] + w[2] * p[2][1];
        assert!((bezier_patch(p, f, g, w) - field(x, y)).abs() < 1e-12);
    }
}
