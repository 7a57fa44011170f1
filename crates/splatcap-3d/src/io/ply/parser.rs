use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{
    properties::{DynamicProperty, PlyDataType, PlyProperty, PlyPropertyDefinition, PlyType},
    PlyEncoding, PlyError, PlyPropertyTrait,
};
use crate::io::reserved_capacity;
use crate::pointcloud::{PointCloud, PointCloudPoint};

/// Summary of a PLY header.
#[derive(Debug, Clone, PartialEq)]
pub struct PlyInfo {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Body encoding.
    pub encoding: PlyEncoding,
    /// Vertex properties in file order.
    pub properties: Vec<PlyPropertyDefinition>,
    /// The vertices carry Gaussian splat attributes.
    pub is_gaussian: bool,
}

struct PlyHeader {
    pub vertex_count: usize,
    pub encoding: PlyEncoding,
    pub properties: Vec<PlyPropertyDefinition>,
    pub format: PlyType,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut vertex_count = None;
    let mut encoding = None;
    let mut is_ply = false;
    let mut in_vertex_element = false;
    let mut properties = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::InvalidHeader("missing end_header".to_string()));
        }
        let trimmed = line.trim();

        if trimmed == "ply" {
            is_ply = true;
            continue;
        }

        if trimmed == "end_header" {
            break;
        }

        let parts = trimmed.split_whitespace().collect::<Vec<_>>();
        match parts.as_slice() {
            ["format", "binary_little_endian", ..] => {
                encoding = Some(PlyEncoding::BinaryLittleEndian)
            }
            ["format", "ascii", ..] => encoding = Some(PlyEncoding::Ascii),
            ["format", other, ..] => return Err(PlyError::UnsupportedProperty(other.to_string())),
            ["element", "vertex", count] => {
                if vertex_count.is_some() || !properties.is_empty() {
                    return Err(PlyError::InvalidHeader("duplicate vertex element".to_string()));
                }
                vertex_count = Some(
                    count
                        .parse()
                        .map_err(|_| PlyError::InvalidHeader(trimmed.to_string()))?,
                );
                in_vertex_element = true;
            }
            ["element", ..] => {
                // only a leading vertex element can be read
                if vertex_count.is_none() {
                    return Err(PlyError::UnsupportedProperty(trimmed.to_string()));
                }
                in_vertex_element = false;
            }
            ["property", "list", ..] if in_vertex_element => {
                return Err(PlyError::UnsupportedProperty(trimmed.to_string()));
            }
            ["property", data_type, name] if in_vertex_element => {
                properties.push(PlyPropertyDefinition::new(
                    *name,
                    PlyDataType::parse(data_type)?,
                ));
            }
            _ => {}
        }
    }

    if !is_ply {
        return Err(PlyError::InvalidHeader("missing ply magic".to_string()));
    }

    let encoding =
        encoding.ok_or_else(|| PlyError::InvalidHeader("missing format line".to_string()))?;
    let vertex_count = vertex_count
        .ok_or_else(|| PlyError::InvalidHeader("missing vertex element".to_string()))?;
    let format = PlyType::detect_format(&properties);

    Ok(PlyHeader {
        vertex_count,
        encoding,
        properties,
        format,
    })
}

fn open_ply(path: impl AsRef<Path>) -> Result<(PlyHeader, BufReader<File>), PlyError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = parse_header(&mut reader)?;
    Ok((header, reader))
}

/// Decode every vertex, calling `f` once per record.
fn for_each_vertex<R: BufRead>(
    header: &PlyHeader,
    reader: &mut R,
    mut f: impl FnMut(&PlyProperty),
) -> Result<(), PlyError> {
    match header.encoding {
        PlyEncoding::BinaryLittleEndian => {
            let mut buffer = vec![0u8; header.format.size_of()];
            for _ in 0..header.vertex_count {
                reader.read_exact(&mut buffer).map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => PlyError::UnexpectedEof,
                    _ => PlyError::Io(e),
                })?;
                f(&header.format.deserialize(&buffer)?);
            }
        }
        PlyEncoding::Ascii => {
            let mut line = String::new();
            let mut read = 0;
            while read < header.vertex_count {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(PlyError::UnexpectedEof);
                }
                if line.trim().is_empty() {
                    continue;
                }
                let property = DynamicProperty::parse_from_ascii(&line, &header.properties)?;
                f(&PlyProperty::Dynamic(property));
                read += 1;
            }
        }
    }
    Ok(())
}

/// Read only the header of a PLY file.
pub fn read_ply_info(path: impl AsRef<Path>) -> Result<PlyInfo, PlyError> {
    let (header, _) = open_ply(path)?;
    Ok(PlyInfo {
        vertex_count: header.vertex_count,
        encoding: header.encoding,
        is_gaussian: header.format.is_gaussian(),
        properties: header.properties,
    })
}

/// Read the vertices of an ASCII or binary PLY file as points.
///
/// Properties are looked up by name, so any order and scalar type works.
/// Missing normals read as zero, missing colors as black and splat files yield
/// their DC color.
pub fn read_point_cloud(path: impl AsRef<Path>) -> Result<Vec<PointCloudPoint>, PlyError> {
    let (header, mut reader) = open_ply(path)?;
    let to_f32 = |v: [f64; 3]| v.map(|c| c as f32);

    let mut points = Vec::with_capacity(reserved_capacity(header.vertex_count as u64));
    for_each_vertex(&header, &mut reader, |property| {
        points.push(PointCloudPoint::new(
            to_f32(property.to_point()),
            to_f32(property.to_normal()),
            property.to_color(),
        ));
    })?;

    Ok(points)
}

/// Read a PLY file in binary format with automatic format detection.
pub fn read_ply_binary(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let (header, mut reader) = open_ply(path)?;
    if header.encoding != PlyEncoding::BinaryLittleEndian {
        return Err(PlyError::UnsupportedProperty(
            header.encoding.name().to_string(),
        ));
    }

    let capacity = reserved_capacity(header.vertex_count as u64);
    let mut points = Vec::with_capacity(capacity);
    let mut colors = Vec::with_capacity(capacity);
    let mut normals = Vec::with_capacity(capacity);

    for_each_vertex(&header, &mut reader, |property_entry| {
        points.push(property_entry.to_point());
        colors.push(property_entry.to_color());
        normals.push(property_entry.to_normal());
    })?;

    Ok(PointCloud::new(points, Some(colors), Some(normals)))
}

/// Splat files are not decoded, this reports how many vertices the file holds.
///
/// Returns [`PlyError::UnsupportedSplatRead`] for splat files and
/// [`PlyError::UnsupportedProperty`] for anything else.
pub fn read_gaussian_splats(
    path: impl AsRef<Path>,
) -> Result<Vec<crate::pointcloud::GaussianSplat>, PlyError> {
    let info = read_ply_info(path)?;
    if !info.is_gaussian {
        return Err(PlyError::UnsupportedProperty(
            "file has no Gaussian splat properties".to_string(),
        ));
    }
    Err(PlyError::UnsupportedSplatRead {
        vertex_count: info.vertex_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const XYZ_RGB_NORMALS_HEADER: &str = "ply\nformat binary_little_endian 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nproperty float nx\nproperty float ny\nproperty float nz\nend_header\n";

    #[test]
    fn test_parse_header_basic() -> Result<(), Box<dyn std::error::Error>> {
        let header_text = "ply\nformat binary_little_endian 1.0\ncomment made by hand\nelement vertex 10\nproperty float x\nproperty float y\nproperty float z\nend_header\n";
        let mut reader = std::io::BufReader::new(header_text.as_bytes());
        let header = parse_header(&mut reader)?;
        assert_eq!(header.vertex_count, 10);
        assert_eq!(header.encoding, PlyEncoding::BinaryLittleEndian);
        assert_eq!(header.properties.len(), 3);
        assert_eq!(header.properties[0].name, "x");
        assert_eq!(header.properties[0].data_type, PlyDataType::Float32);
        Ok(())
    }

    #[test]
    fn test_parse_header_ascii_with_faces() -> Result<(), Box<dyn std::error::Error>> {
        let header_text = "ply\nformat ascii 1.0\nelement vertex 3\nproperty double x\nproperty double y\nproperty double z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n";
        let mut reader = std::io::BufReader::new(header_text.as_bytes());
        let header = parse_header(&mut reader)?;
        assert_eq!(header.encoding, PlyEncoding::Ascii);
        assert_eq!(header.vertex_count, 3);
        assert_eq!(header.properties.len(), 3);
        Ok(())
    }

    #[test]
    fn test_parse_header_errors() {
        let cases = [
            "format ascii 1.0\nelement vertex 1\nend_header\n",
            "ply\nformat binary_big_endian 1.0\nelement vertex 1\nend_header\n",
            "ply\nformat ascii 1.0\nproperty float x\nend_header\n",
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty half x\nend_header\n",
            "ply\nformat ascii 1.0\nelement vertex 1\n",
        ];
        for case in cases {
            let mut reader = std::io::BufReader::new(case.as_bytes());
            assert!(parse_header(&mut reader).is_err(), "{case}");
        }
    }

    #[test]
    fn test_read_ply_binary_auto_detection() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(XYZ_RGB_NORMALS_HEADER.as_bytes())?;

        let mut data = Vec::new();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());
        data.extend_from_slice(&3.0f32.to_le_bytes());
        data.push(255);
        data.push(128);
        data.push(0);
        data.extend_from_slice(&0.0f32.to_le_bytes());
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&0.0f32.to_le_bytes());
        file.write_all(&data)?;

        let pointcloud = read_ply_binary(file.path())?;
        assert_eq!(pointcloud.len(), 1);
        assert_eq!(pointcloud.points()[0], [1.0, 2.0, 3.0]);
        assert_eq!(pointcloud.colors().map(|c| c[0]), Some([255, 128, 0]));
        assert_eq!(pointcloud.normals().map(|n| n[0]), Some([0.0, 1.0, 0.0]));

        let points = read_point_cloud(file.path())?;
        assert_eq!(points[0].normal, [0.0, 1.0, 0.0]);
        assert_eq!(points[0].color, [255, 128, 0]);
        Ok(())
    }

    #[test]
    fn test_read_ply_binary_dynamic_format() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        let header = "ply\nformat binary_little_endian 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nproperty float intensity\nend_header\n";
        file.write_all(header.as_bytes())?;

        let mut data = Vec::new();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());
        data.extend_from_slice(&3.0f32.to_le_bytes());
        data.extend_from_slice(&0.5f32.to_le_bytes());
        file.write_all(&data)?;

        let pointcloud = read_ply_binary(file.path())?;
        assert_eq!(pointcloud.len(), 1);
        assert_eq!(pointcloud.points()[0], [1.0, 2.0, 3.0]);
        assert_eq!(pointcloud.colors().map(|c| c[0]), Some([0, 0, 0]));
        assert_eq!(pointcloud.normals().map(|n| n[0]), Some([0.0, 0.0, 0.0]));
        Ok(())
    }

    #[test]
    fn test_read_truncated_binary() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(XYZ_RGB_NORMALS_HEADER.as_bytes())?;
        file.write_all(&[0u8; 10])?;

        assert!(matches!(
            read_point_cloud(file.path()),
            Err(PlyError::UnexpectedEof)
        ));
        Ok(())
    }

    #[test]
    fn test_read_oversized_vertex_count() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n",
            usize::MAX
        )?;
        assert!(matches!(
            read_point_cloud(file.path()),
            Err(PlyError::UnexpectedEof)
        ));

        let mut file = NamedTempFile::new()?;
        file.write_all(
            XYZ_RGB_NORMALS_HEADER
                .replace("element vertex 1", &format!("element vertex {}", usize::MAX))
                .as_bytes(),
        )?;
        file.write_all(&[0u8; 27])?;
        assert!(matches!(
            read_ply_binary(file.path()),
            Err(PlyError::UnexpectedEof)
        ));
        Ok(())
    }

    #[test]
    fn test_read_ascii_point_cloud() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 2\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nproperty float x\nproperty float y\nproperty float z\nend_header\n10 20 30 1.5 -2 3\n\n0 0 255 0 0 0\n"
        )?;

        let points = read_point_cloud(file.path())?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].position, [1.5, -2.0, 3.0]);
        assert_eq!(points[0].color, [10, 20, 30]);
        assert_eq!(points[1].color, [0, 0, 255]);
        assert_eq!(points[1].normal, [0.0, 0.0, 0.0]);

        assert!(read_ply_binary(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_read_ply_info() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(XYZ_RGB_NORMALS_HEADER.as_bytes())?;

        let info = read_ply_info(file.path())?;
        assert_eq!(info.vertex_count, 1);
        assert_eq!(info.encoding, PlyEncoding::BinaryLittleEndian);
        assert_eq!(info.properties.len(), 9);
        assert!(!info.is_gaussian);

        assert!(matches!(
            read_gaussian_splats(file.path()),
            Err(PlyError::UnsupportedProperty(_))
        ));
        Ok(())
    }
}
