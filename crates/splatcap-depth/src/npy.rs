use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{error::DepthError, linear::DepthMap};

/// `\x93NUMPY` followed by format version 1.0.
pub const NPY_MAGIC: [u8; 8] = [0x93, b'N', b'U', b'M', b'P', b'Y', 0x01, 0x00];

/// Header block alignment.
pub const NPY_ALIGNMENT: usize = 64;

/// Build a version 1.0 header for a `height x width` C-order `f32` array.
///
/// The dictionary is padded with spaces and ends with a newline so the data
/// starts on a 64 byte boundary.
pub fn npy_header(width: usize, height: usize) -> Vec<u8> {
    let mut dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({height}, {width}), }}");

    // magic, version and the u16 length, plus the trailing newline
    let unpadded = NPY_MAGIC.len() + 2 + dict.len() + 1;
    let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
    dict.extend(std::iter::repeat(' ').take(padding));
    dict.push('\n');

    let mut header = Vec::with_capacity(NPY_MAGIC.len() + 2 + dict.len());
    header.extend_from_slice(&NPY_MAGIC);
    header.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    header.extend_from_slice(dict.as_bytes());
    header
}

/// Write a depth map as a `.npy` file.
pub fn write_depth_npy(file_path: impl AsRef<Path>, depth: &DepthMap) -> Result<(), DepthError> {
    if !depth.is_valid() {
        return Err(DepthError::InvalidDimensions {
            width: depth.width,
            height: depth.height,
            len: depth.data.len(),
        });
    }

    let mut writer = BufWriter::new(File::create(file_path)?);
    writer.write_all(&npy_header(depth.width, depth.height))?;
    for value in &depth.data {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{linearize_depth, DepthExportConfig};

    #[test]
    fn test_npy_header() {
        for (width, height) in [(1, 1), (640, 480), (1920, 1080), (12345, 67890)] {
            let header = npy_header(width, height);
            assert_eq!(header.len() % NPY_ALIGNMENT, 0);
            assert_eq!(&header[..8], &NPY_MAGIC);

            let dict_len = u16::from_le_bytes([header[8], header[9]]) as usize;
            assert_eq!(dict_len + 10, header.len());
            assert_eq!(header.last(), Some(&b'\n'));

            let dict = String::from_utf8_lossy(&header[10..]);
            assert!(dict.starts_with("{'descr': '<f4', 'fortran_order': False, 'shape': ("));
            assert!(dict.contains(&format!("({height}, {width})")));
        }
    }

    #[test]
    fn test_write_depth_npy() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let depth = linearize_depth(&[1.0; 6], 3, 2, &DepthExportConfig::default())?;

        let path = tmp_dir.path().join("depth.npy");
        write_depth_npy(&path, &depth)?;

        let header_len = npy_header(3, 2).len();
        let bytes = std::fs::read(&path)?;
        assert_eq!(bytes.len(), header_len + 6 * 4);
        assert_eq!(&bytes[header_len..header_len + 4], &depth.data[0].to_le_bytes());
        Ok(())
    }
}
