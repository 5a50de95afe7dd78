//! Regions of interest drawn by the operator as closed polygons.

use crate::types::{Image, Mask, Shape, Vertex};

/// Distance within which a pixel centre counts as lying on an edge
const ON_EDGE: f64 = 1e-9;

/// Mask of pixels `(row, col)` whose point `(col, row)` lies inside or on the
/// boundary of the closed polygon through `vertices`. Fewer than three
/// vertices give an empty mask.
pub fn polygon_mask(shape: Shape, vertices: &[Vertex]) -> Mask {
    if vertices.len() < 3 {
        log::debug!("Polygon with {} vertices: empty ROI", vertices.len());
        return Mask::from_elem(shape, false)
    }
    Mask::from_shape_fn(shape, |(row, col)| contains(vertices, (col as f64, row as f64)))
}

/// Even-odd rule, with points on an edge counted as inside
pub fn contains(vertices: &[Vertex], point: Vertex) -> bool {
    let (x, y) = point;
    let n = vertices.len();
    let mut inside = false;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[(i + n - 1) % n];
        if on_segment((xi, yi), (xj, yj), point) { return true }
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }
    inside
}

fn on_segment(a: Vertex, b: Vertex, p: Vertex) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    let length = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
    if cross.abs() > ON_EDGE * length.max(1.0) { return false }
    let within = |v: f64, lo: f64, hi: f64| v >= lo.min(hi) - ON_EDGE && v <= lo.max(hi) + ON_EDGE;
    within(p.0, a.0, b.0) && within(p.1, a.1, b.1)
}

/// Sum of the pixels selected by `mask`
pub fn masked_sum(image: &Image, mask: &Mask) -> f64 {
    image.iter().zip(mask.iter())
        .filter_map(|(v, &inside)| inside.then_some(v))
        .sum()
}
