//! Delaunay triangulation of scattered 2-D points (Bowyer-Watson).
//!
//! Points are normalized to a unit box around their bounding-box center
//! before triangulating, so that absolute tolerances below are meaningful
//! for any input scale (tangent-plane radians here).

use std::collections::HashMap;

use tracing::debug;

/// Duplicate tolerance in normalized coordinates.
const DUPLICATE_EPS: f64 = 1e-12;
/// Barycentric tolerance for point location, in normalized units.
const LOCATE_EPS: f64 = 1e-10;
/// The vertex at infinity closing the hull with ghost triangles.
const GHOST: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Normalized vertex coordinates, indexed like the input points.
    points: Vec<[f64; 2]>,
    /// Counter-clockwise vertex triples.
    triangles: Vec<[usize; 3]>,
    /// Vertices sharing an edge with each vertex.
    neighbors: Vec<Vec<usize>>,
    center: [f64; 2],
    scale: f64,
}

impl Triangulation {
    /// Triangulate `points`. Indices in the result refer to positions in `points`.
    ///
    /// Fewer than three distinct, non-collinear points yield no triangles.
    pub fn new(points: &[[f64; 2]]) -> Self {
        let (center, scale) = normalization(points);
        let normalized: Vec<[f64; 2]> = points
            .iter()
            .map(|p| [(p[0] - center[0]) / scale, (p[1] - center[1]) / scale])
            .collect();

        let unique = unique_indices(&normalized);
        let triangles = if unique.len() < 3 {
            Vec::new()
        } else {
            bowyer_watson(&normalized, &unique)
        };

        let mut neighbors = vec![Vec::new(); normalized.len()];
        for tri in &triangles {
            for k in 0..3 {
                let a = tri[k];
                let b = tri[(k + 1) % 3];
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        debug!(
            "Triangulated {} points ({} unique) into {} triangles",
            points.len(),
            unique.len(),
            triangles.len()
        );

        Self {
            points: normalized,
            triangles,
            neighbors,
            center,
            scale,
        }
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Vertices connected to `vertex` by a triangle edge.
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.neighbors[vertex]
    }

    /// Vertex position in normalized coordinates.
    pub fn point(&self, vertex: usize) -> [f64; 2] {
        self.points[vertex]
    }

    /// Map an input-space point into normalized coordinates.
    pub fn normalize(&self, p: [f64; 2]) -> [f64; 2] {
        [(p[0] - self.center[0]) / self.scale, (p[1] - self.center[1]) / self.scale]
    }

    /// Find a triangle containing `p` (input coordinates).
    ///
    /// Returns the triangle index and the barycentric weights of `p` with
    /// respect to its vertices, or `None` outside the convex hull.
    pub fn locate(&self, p: [f64; 2]) -> Option<(usize, [f64; 3])> {
        let q = self.normalize(p);
        self.triangles.iter().enumerate().find_map(|(i, tri)| {
            let a = self.points[tri[0]];
            let b = self.points[tri[1]];
            let c = self.points[tri[2]];
            if q[0] < a[0].min(b[0]).min(c[0]) - LOCATE_EPS
                || q[0] > a[0].max(b[0]).max(c[0]) + LOCATE_EPS
                || q[1] < a[1].min(b[1]).min(c[1]) - LOCATE_EPS
                || q[1] > a[1].max(b[1]).max(c[1]) + LOCATE_EPS
            {
                return None;
            }
            let w = barycentric(a, b, c, q)?;
            if w.iter().all(|&x| x >= -LOCATE_EPS) {
                Some((i, w))
            } else {
                None
            }
        })
    }
}

fn normalization(points: &[[f64; 2]]) -> ([f64; 2], f64) {
    if points.is_empty() {
        return ([0.0, 0.0], 1.0);
    }
    let mut lo = [f64::INFINITY; 2];
    let mut hi = [f64::NEG_INFINITY; 2];
    for p in points {
        for k in 0..2 {
            lo[k] = lo[k].min(p[k]);
            hi[k] = hi[k].max(p[k]);
        }
    }
    let center = [0.5 * (lo[0] + hi[0]), 0.5 * (lo[1] + hi[1])];
    let extent = (hi[0] - lo[0]).max(hi[1] - lo[1]);
    let scale = if extent > 0.0 { extent } else { 1.0 };
    (center, scale)
}

/// Indices of points, skipping near-duplicates (first occurrence wins).
fn unique_indices(points: &[[f64; 2]]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        points[i][0]
            .total_cmp(&points[j][0])
            .then(points[i][1].total_cmp(&points[j][1]))
            .then(i.cmp(&j))
    });

    let mut keep: Vec<usize> = Vec::with_capacity(points.len());
    for &idx in &order {
        let p = points[idx];
        // Walk back over the run of points sharing this x (within tolerance).
        let is_dup = keep
            .iter()
            .rev()
            .take_while(|&&k| (points[k][0] - p[0]).abs() <= DUPLICATE_EPS)
            .any(|&k| (points[k][1] - p[1]).abs() <= DUPLICATE_EPS);
        if !is_dup {
            keep.push(idx);
        }
    }
    keep.sort_unstable();
    keep
}

/// Positive when `d` lies inside the circumcircle of the counter-clockwise
/// triangle `a, b, c`.
fn incircle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);
    (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        + (bdx * bdx + bdy * bdy) * (cdx * ady - adx * cdy)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady)
}

fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

pub(crate) fn barycentric(a: [f64; 2], b: [f64; 2], c: [f64; 2], p: [f64; 2]) -> Option<[f64; 3]> {
    let det = orient(a, b, c);
    if det.abs() < 1e-300 {
        return None;
    }
    let wa = orient(p, b, c) / det;
    let wb = orient(a, p, c) / det;
    Some([wa, wb, 1.0 - wa - wb])
}

/// Bowyer-Watson incremental insertion over the `order` subset of `points`.
///
/// The hull is closed by ghost triangles `[a, b, GHOST]`, one per hull edge
/// `b -> a`. A ghost conflicts with every point strictly outside its hull
/// edge, which is the limit of a circumcircle through the vertex at
/// infinity, so no finite super-triangle is needed and every hull edge
/// survives.
fn bowyer_watson(points: &[[f64; 2]], order: &[usize]) -> Vec<[usize; 3]> {
    let Some((seed, rest)) = seed_triangle(points, order) else {
        return Vec::new();
    };
    let mut mesh = Mesh::new(points);
    let [a, b, c] = seed;
    mesh.add([a, b, c]);
    mesh.add([b, a, GHOST]);
    mesh.add([c, b, GHOST]);
    mesh.add([a, c, GHOST]);

    for pi in rest {
        if !mesh.insert(pi) {
            debug!("Skipping vertex {} with no conflicting triangle", pi);
        }
    }

    mesh.tris
        .into_iter()
        .flatten()
        .filter(|v| v[2] != GHOST)
        .collect()
}

/// First counter-clockwise triangle of `order`, and the remaining vertices.
fn seed_triangle(points: &[[f64; 2]], order: &[usize]) -> Option<([usize; 3], Vec<usize>)> {
    let (&a, tail) = order.split_first()?;
    let (&b, _) = tail.split_first()?;
    let k = order
        .iter()
        .position(|&c| orient(points[a], points[b], points[c]) != 0.0)?;
    let c = order[k];
    let seed = if orient(points[a], points[b], points[c]) > 0.0 {
        [a, b, c]
    } else {
        [a, c, b]
    };
    let rest = order
        .iter()
        .copied()
        .filter(|&i| i != a && i != b && i != c)
        .collect();
    Some((seed, rest))
}

/// Triangles (real and ghost) with a directed-edge lookup.
struct Mesh<'a> {
    points: &'a [[f64; 2]],
    tris: Vec<Option<[usize; 3]>>,
    free: Vec<usize>,
    edges: HashMap<(usize, usize), usize>,
}

impl<'a> Mesh<'a> {
    fn new(points: &'a [[f64; 2]]) -> Self {
        Self {
            points,
            tris: Vec::new(),
            free: Vec::new(),
            edges: HashMap::new(),
        }
    }

    fn add(&mut self, v: [usize; 3]) {
        // Keep the ghost vertex last; rotation preserves orientation.
        let v = if v[0] == GHOST {
            [v[1], v[2], v[0]]
        } else if v[1] == GHOST {
            [v[2], v[0], v[1]]
        } else {
            v
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.tris[slot] = Some(v);
                slot
            }
            None => {
                self.tris.push(Some(v));
                self.tris.len() - 1
            }
        };
        for k in 0..3 {
            self.edges.insert((v[k], v[(k + 1) % 3]), slot);
        }
    }

    fn remove(&mut self, slot: usize) {
        if let Some(v) = self.tris[slot].take() {
            for k in 0..3 {
                self.edges.remove(&(v[k], v[(k + 1) % 3]));
            }
            self.free.push(slot);
        }
    }

    /// Whether `p` is inside the triangle, or strictly beyond a ghost's hull edge.
    fn contains(&self, v: [usize; 3], p: [f64; 2]) -> bool {
        let pts = self.points;
        if v[2] == GHOST {
            return orient(pts[v[0]], pts[v[1]], p) > 0.0;
        }
        (0..3).all(|k| orient(pts[v[k]], pts[v[(k + 1) % 3]], p) >= 0.0)
    }

    /// Whether `p` lies inside the (possibly infinite) circumcircle.
    fn conflicts(&self, v: [usize; 3], p: [f64; 2]) -> bool {
        let pts = self.points;
        if v[2] == GHOST {
            let (a, b) = (pts[v[0]], pts[v[1]]);
            let o = orient(a, b, p);
            if o != 0.0 {
                return o > 0.0;
            }
            // On the hull line: only the open segment is inside.
            let along = (p[0] - a[0]) * (b[0] - a[0]) + (p[1] - a[1]) * (b[1] - a[1]);
            let back = (p[0] - b[0]) * (a[0] - b[0]) + (p[1] - b[1]) * (a[1] - b[1]);
            return along > 0.0 && back > 0.0;
        }
        incircle(pts[v[0]], pts[v[1]], pts[v[2]], p) > 0.0
    }

    fn live(&self) -> impl Iterator<Item = (usize, [usize; 3])> + '_ {
        self.tris
            .iter()
            .enumerate()
            .filter_map(|(slot, t)| t.map(|v| (slot, v)))
    }

    /// Insert vertex `pi`. Returns `false` if no triangle conflicts with it.
    fn insert(&mut self, pi: usize) -> bool {
        let p = self.points[pi];
        let seed = self
            .live()
            .find(|&(_, v)| self.contains(v, p))
            .or_else(|| self.live().find(|&(_, v)| self.conflicts(v, p)))
            .map(|(slot, _)| slot);
        let Some(seed) = seed else {
            return false;
        };

        // Grow the cavity over conflicting neighbours.
        let mut cavity: Vec<usize> = vec![seed];
        let mut stack = vec![seed];
        while let Some(t) = stack.pop() {
            let Some(v) = self.tris[t] else { continue };
            for k in 0..3 {
                let (a, b) = (v[k], v[(k + 1) % 3]);
                if let Some(&across) = self.edges.get(&(b, a)) {
                    if cavity.contains(&across) {
                        continue;
                    }
                    if self.tris[across].is_some_and(|w| self.conflicts(w, p)) {
                        cavity.push(across);
                        stack.push(across);
                    }
                }
            }
        }

        // Rounding can leave `p` on or behind a cavity edge; absorb the
        // triangle across such an edge until the cavity is star-shaped.
        let boundary = loop {
            let mut boundary: Vec<(usize, usize)> = Vec::new();
            let mut grow = None;
            for &t in &cavity {
                let Some(v) = self.tris[t] else { continue };
                for k in 0..3 {
                    let (a, b) = (v[k], v[(k + 1) % 3]);
                    let across = self.edges.get(&(b, a)).copied();
                    if across.is_some_and(|o| cavity.contains(&o)) {
                        continue;
                    }
                    if a != GHOST
                        && b != GHOST
                        && orient(self.points[a], self.points[b], p) <= 0.0
                    {
                        if let Some(o) = across {
                            grow = Some(o);
                        }
                    }
                    boundary.push((a, b));
                }
            }
            match grow {
                Some(o) => cavity.push(o),
                None => break boundary,
            }
        };

        for t in cavity {
            self.remove(t);
        }
        for (a, b) in boundary {
            self.add([a, b, pi]);
        }
        true
    }
}
