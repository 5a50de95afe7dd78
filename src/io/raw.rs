/// Read / write pixel data as raw little-endian `f32`

use std::fs::File;
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::Path;

/// Pixel values are stored at single precision, widened to `f64` on reading.
pub fn write(data: impl Iterator<Item = f64>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&(datum as f32).to_le_bytes())?;
    }
    buf.flush()
}

pub fn read(path: &Path) -> std::io::Result<Vec<f64>> {
    let mut bytes = vec![];
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    if bytes.len() % 4 != 0 {
        use std::io::{Error, ErrorKind::InvalidData};
        return Err(Error::new(InvalidData, format!("{} bytes is not a whole number of f32s", bytes.len())));
    }
    Ok(bytes
       .chunks_exact(4)
       .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
       .collect())
}
