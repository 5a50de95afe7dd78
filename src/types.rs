use ndarray::Array2;

/// One planar window: rows are the image's y axis, columns its x axis.
pub type Image = Array2<f64>;

/// Pixel-wise region-of-interest membership, same shape as its `Image`.
pub type Mask = Array2<bool>;

/// Polygon vertex in image coordinates: `(x, y)` = `(column, row)`.
pub type Vertex = (f64, f64);

/// Row-major shape of a 2-d image
pub type Shape = (usize, usize);
