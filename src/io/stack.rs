//! Planar stacks on disk: a TOML header next to a raw `f32` data file.
//!
//! ```toml
//! rows = 128
//! columns = 128
//! planes = 6
//! acquisition_date = "20250612"
//! acquisition_time = "093512.000000"
//! acquisition_duration = 600000   # ms
//! data = "day1.raw"               # relative to the header
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::acquisition::{LoadError, PlanarStack};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub rows: usize,
    pub columns: usize,
    pub planes: usize,
    pub acquisition_date: Option<String>,
    pub acquisition_time: Option<String>,
    pub acquisition_duration: Option<f64>,
    /// Defaults to the header's path with extension `raw`
    pub data: Option<PathBuf>,
}

impl Header {
    fn data_path(&self, header_path: &Path) -> PathBuf {
        match &self.data {
            Some(data) => header_path.parent().unwrap_or(Path::new("")).join(data),
            None       => header_path.with_extension("raw"),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LoadError + '_ {
    move |source| LoadError::Io { path: path.to_path_buf(), source }
}

pub fn read(header_path: &Path) -> Result<PlanarStack, LoadError> {
    let text = fs::read_to_string(header_path).map_err(io_error(header_path))?;
    let header: Header = toml::from_str(&text)
        .map_err(|source| LoadError::Header { path: header_path.to_path_buf(), source })?;

    let data_path = header.data_path(header_path);
    let data = super::raw::read(&data_path).map_err(io_error(&data_path))?;

    let Header { rows, columns, planes: n_planes, .. } = header;
    let plane_size = rows * columns;
    let expected = plane_size * n_planes;
    if data.len() != expected {
        return Err(LoadError::DataLength { expected, found: data.len() })
    }
    let planes = data
        .chunks_exact(plane_size.max(1))
        .take(n_planes)
        .map(|chunk| Array2::from_shape_vec((rows, columns), chunk.to_vec())
             .map_err(|_| LoadError::DataLength { expected: plane_size, found: chunk.len() }))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Read {n_planes} planes of {rows}x{columns} from {}", data_path.display());
    Ok(PlanarStack {
        planes,
        acquisition_date:     header.acquisition_date,
        acquisition_time:     header.acquisition_time,
        acquisition_duration: header.acquisition_duration,
    })
}

/// Write `stack` as `header_path` plus a `.raw` file beside it.
pub fn write(stack: &PlanarStack, header_path: &Path) -> Result<(), LoadError> {
    let (rows, columns) = stack.planes.first().map_or((0, 0), |p| p.dim());
    let data_path = header_path.with_extension("raw");
    let header = Header {
        rows, columns,
        planes: stack.planes.len(),
        acquisition_date:     stack.acquisition_date.clone(),
        acquisition_time:     stack.acquisition_time.clone(),
        acquisition_duration: stack.acquisition_duration,
        data: data_path.file_name().map(PathBuf::from),
    };
    // Serializing a struct of plain fields cannot fail
    let text = toml::to_string(&header).unwrap_or_default();
    fs::write(header_path, text).map_err(io_error(header_path))?;
    super::raw::write(stack.planes.iter().flat_map(|p| p.iter().copied()), &data_path)
        .map_err(io_error(&data_path))
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn two_plane_stack() -> PlanarStack {
        PlanarStack {
            planes: vec![array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
                         array![[0.5, 0.0, 8.0], [9.0, 1.5, 2.0]]],
            acquisition_date:     Some("20250601".into()),
            acquisition_time:     Some("120000".into()),
            acquisition_duration: Some(300_000.0),
        }
    }

    #[test]
    fn stack_roundtrip() -> Result<(), LoadError> {
        let dir = tempfile::tempdir().map_err(io_error(Path::new("tmp")))?;
        let path = dir.path().join("day0.toml");
        let original = two_plane_stack();
        write(&original, &path)?;
        assert!(dir.path().join("day0.raw").exists());
        assert_eq!(read(&path)?, original);
        Ok(())
    }

    #[test]
    fn header_without_metadata_still_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.toml");
        fs::write(&path, "rows = 1\ncolumns = 2\nplanes = 2\n").unwrap();
        crate::io::raw::write([1.0, 2.0, 3.0, 4.0].into_iter(), &dir.path().join("bare.raw")).unwrap();
        let stack = read(&path).unwrap();
        assert_eq!(stack.planes, vec![array![[1.0, 2.0]], array![[3.0, 4.0]]]);
        assert_eq!(stack.acquisition_date, None);
    }

    #[test]
    fn data_length_must_match_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.toml");
        fs::write(&path, "rows = 2\ncolumns = 2\nplanes = 6\n").unwrap();
        crate::io::raw::write([0.0; 20].into_iter(), &dir.path().join("short.raw")).unwrap();
        assert!(matches!(read(&path), Err(LoadError::DataLength { expected: 24, found: 20 })));
    }

    #[test]
    fn unknown_header_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.toml");
        fs::write(&path, "rows = 1\ncolumns = 1\nplanes = 2\nmodality = \"NM\"\n").unwrap();
        assert!(matches!(read(&path), Err(LoadError::Header { .. })));
    }

    #[test]
    fn missing_header_file() {
        assert!(matches!(read(Path::new("/no/such/stack.toml")), Err(LoadError::Io { .. })));
    }
}
