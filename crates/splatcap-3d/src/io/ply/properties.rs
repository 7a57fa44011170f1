use std::sync::OnceLock;

use super::PlyError;
use crate::pointcloud::{sh_dc_to_color, GaussianSplat, PointCloudPoint, SH_REST_COUNT};

/// Vertex layouts understood by the reader and writer.
#[derive(Debug, PartialEq, Clone)]
pub enum PlyType {
    /// 3DGS layout: `x y z nx ny nz f_dc_0..2 f_rest_0..44 opacity scale_0..2 rot_0..3`.
    GaussianSplat,
    /// `x y z nx ny nz red green blue`
    PointCloud,
    /// Anything else, properties are looked up by name.
    Dynamic(Vec<PlyPropertyDefinition>),
}

/// A `property <type> <name>` header line.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyPropertyDefinition {
    /// Property name.
    pub name: String,
    /// Scalar type.
    pub data_type: PlyDataType,
}

impl PlyPropertyDefinition {
    /// Create a property definition.
    pub fn new(name: impl Into<String>, data_type: PlyDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Scalar property types.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlyDataType {
    /// `float`
    Float32,
    /// `double`
    Float64,
    /// `char`
    Int8,
    /// `uchar`
    UInt8,
    /// `short`
    Int16,
    /// `ushort`
    UInt16,
    /// `int`
    Int32,
    /// `uint`
    UInt32,
}

impl PlyDataType {
    /// Size in bytes of one value.
    pub fn size(&self) -> usize {
        match self {
            PlyDataType::Float32 | PlyDataType::Int32 | PlyDataType::UInt32 => 4,
            PlyDataType::Float64 => 8,
            PlyDataType::Int16 | PlyDataType::UInt16 => 2,
            PlyDataType::Int8 | PlyDataType::UInt8 => 1,
        }
    }

    /// Name used in header lines.
    pub fn name(&self) -> &'static str {
        match self {
            PlyDataType::Float32 => "float",
            PlyDataType::Float64 => "double",
            PlyDataType::Int8 => "char",
            PlyDataType::UInt8 => "uchar",
            PlyDataType::Int16 => "short",
            PlyDataType::UInt16 => "ushort",
            PlyDataType::Int32 => "int",
            PlyDataType::UInt32 => "uint",
        }
    }

    /// Parse a header type name, both the classic and the sized spelling.
    pub fn parse(type_str: &str) -> Result<Self, PlyError> {
        match type_str {
            "float" | "float32" => Ok(PlyDataType::Float32),
            "double" | "float64" => Ok(PlyDataType::Float64),
            "char" | "int8" => Ok(PlyDataType::Int8),
            "uchar" | "uint8" => Ok(PlyDataType::UInt8),
            "short" | "int16" => Ok(PlyDataType::Int16),
            "ushort" | "uint16" => Ok(PlyDataType::UInt16),
            "int" | "int32" => Ok(PlyDataType::Int32),
            "uint" | "uint32" => Ok(PlyDataType::UInt32),
            _ => Err(PlyError::UnsupportedProperty(type_str.to_string())),
        }
    }
}

/// Accessors shared by all vertex records.
pub trait PlyPropertyTrait {
    /// Position.
    fn to_point(&self) -> [f64; 3];
    /// RGB color.
    fn to_color(&self) -> [u8; 3];
    /// Normal.
    fn to_normal(&self) -> [f64; 3];
}

/// One point cloud vertex, 27 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, bincode::Encode, bincode::Decode)]
pub struct PointCloudRecord {
    /// x, y, z
    pub position: [f32; 3],
    /// nx, ny, nz
    pub normal: [f32; 3],
    /// red, green, blue
    pub color: [u8; 3],
}

impl From<&PointCloudPoint> for PointCloudRecord {
    fn from(point: &PointCloudPoint) -> Self {
        Self {
            position: point.position,
            normal: point.normal,
            color: point.color,
        }
    }
}

impl PointCloudRecord {
    /// Bytes of one binary record.
    pub const SIZE: usize = 3 * 4 + 3 * 4 + 3;
}

impl PlyPropertyTrait for PointCloudRecord {
    fn to_point(&self) -> [f64; 3] {
        self.position.map(|v| v as f64)
    }

    fn to_color(&self) -> [u8; 3] {
        self.color
    }

    fn to_normal(&self) -> [f64; 3] {
        self.normal.map(|v| v as f64)
    }
}

/// One Gaussian splat vertex, fields in file order.
#[derive(Debug, Clone, Copy, PartialEq, bincode::Encode, bincode::Decode)]
pub struct GaussianSplatRecord {
    /// x, y, z
    pub position: [f32; 3],
    /// nx, ny, nz
    pub normal: [f32; 3],
    /// f_dc_0..2
    pub f_dc: [f32; 3],
    /// f_rest_0..44
    pub f_rest: [f32; SH_REST_COUNT],
    /// opacity
    pub opacity: f32,
    /// scale_0..2
    pub scale: [f32; 3],
    /// rot_0..3
    pub rotation: [f32; 4],
}

impl From<&GaussianSplat> for GaussianSplatRecord {
    fn from(splat: &GaussianSplat) -> Self {
        Self {
            position: splat.position,
            normal: splat.normal,
            f_dc: splat.sh_dc,
            f_rest: splat.sh_rest,
            opacity: splat.opacity,
            scale: splat.scale,
            rotation: splat.rotation,
        }
    }
}

impl GaussianSplatRecord {
    /// Bytes of one binary record, 62 floats.
    pub const SIZE: usize = (3 + 3 + 3 + SH_REST_COUNT + 1 + 3 + 4) * 4;

    /// All values in file order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.position
            .iter()
            .chain(&self.normal)
            .chain(&self.f_dc)
            .chain(&self.f_rest)
            .chain(std::iter::once(&self.opacity))
            .chain(&self.scale)
            .chain(&self.rotation)
            .copied()
    }
}

impl PlyPropertyTrait for GaussianSplatRecord {
    fn to_point(&self) -> [f64; 3] {
        self.position.map(|v| v as f64)
    }

    fn to_color(&self) -> [u8; 3] {
        self.f_dc.map(sh_dc_to_color)
    }

    fn to_normal(&self) -> [f64; 3] {
        self.normal.map(|v| v as f64)
    }
}

/// Dynamic PLY property that can handle arbitrary schemas
#[derive(Debug)]
pub struct DynamicProperty {
    /// Values in header order.
    pub properties: Vec<(String, DynamicPropertyValue)>,
}

/// A single scalar value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DynamicPropertyValue {
    /// `float`
    Float32(f32),
    /// `double`
    Float64(f64),
    /// `char`
    Int8(i8),
    /// `uchar`
    UInt8(u8),
    /// `short`
    Int16(i16),
    /// `ushort`
    UInt16(u16),
    /// `int`
    Int32(i32),
    /// `uint`
    UInt32(u32),
}

impl DynamicPropertyValue {
    fn as_f64(&self) -> f64 {
        match *self {
            DynamicPropertyValue::Float32(v) => v as f64,
            DynamicPropertyValue::Float64(v) => v,
            DynamicPropertyValue::Int8(v) => v as f64,
            DynamicPropertyValue::UInt8(v) => v as f64,
            DynamicPropertyValue::Int16(v) => v as f64,
            DynamicPropertyValue::UInt16(v) => v as f64,
            DynamicPropertyValue::Int32(v) => v as f64,
            DynamicPropertyValue::UInt32(v) => v as f64,
        }
    }

    fn parse_ascii(token: &str, data_type: PlyDataType) -> Result<Self, PlyError> {
        Ok(match data_type {
            PlyDataType::Float32 => DynamicPropertyValue::Float32(parse_token(token)?),
            PlyDataType::Float64 => DynamicPropertyValue::Float64(parse_token(token)?),
            PlyDataType::Int8 => DynamicPropertyValue::Int8(parse_token(token)?),
            PlyDataType::UInt8 => DynamicPropertyValue::UInt8(parse_token(token)?),
            PlyDataType::Int16 => DynamicPropertyValue::Int16(parse_token(token)?),
            PlyDataType::UInt16 => DynamicPropertyValue::UInt16(parse_token(token)?),
            PlyDataType::Int32 => DynamicPropertyValue::Int32(parse_token(token)?),
            PlyDataType::UInt32 => DynamicPropertyValue::UInt32(parse_token(token)?),
        })
    }
}

fn parse_token<T: std::str::FromStr>(token: &str) -> Result<T, PlyError> {
    token
        .parse()
        .map_err(|_| PlyError::InvalidValue(token.to_string()))
}

fn le_bytes<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N], PlyError> {
    buffer
        .get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(PlyError::UnexpectedEof)
}

impl DynamicProperty {
    /// Decode one little-endian binary record.
    pub fn parse_from_buffer(
        buffer: &[u8],
        schema: &[PlyPropertyDefinition],
    ) -> Result<Self, PlyError> {
        let mut properties = Vec::with_capacity(schema.len());
        let mut offset = 0;

        for prop_def in schema {
            let value = match prop_def.data_type {
                PlyDataType::Float32 => {
                    DynamicPropertyValue::Float32(f32::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Float64 => {
                    DynamicPropertyValue::Float64(f64::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Int8 => {
                    DynamicPropertyValue::Int8(i8::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::UInt8 => {
                    DynamicPropertyValue::UInt8(u8::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Int16 => {
                    DynamicPropertyValue::Int16(i16::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::UInt16 => {
                    DynamicPropertyValue::UInt16(u16::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Int32 => {
                    DynamicPropertyValue::Int32(i32::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::UInt32 => {
                    DynamicPropertyValue::UInt32(u32::from_le_bytes(le_bytes(buffer, offset)?))
                }
            };

            properties.push((prop_def.name.clone(), value));
            offset += prop_def.data_type.size();
        }

        Ok(DynamicProperty { properties })
    }

    /// Parse one whitespace separated ASCII row.
    pub fn parse_from_ascii(line: &str, schema: &[PlyPropertyDefinition]) -> Result<Self, PlyError> {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.len() < schema.len() {
            return Err(PlyError::InvalidValue(line.to_string()));
        }

        let properties = schema
            .iter()
            .zip(tokens)
            .map(|(prop_def, token)| {
                Ok((
                    prop_def.name.clone(),
                    DynamicPropertyValue::parse_ascii(token, prop_def.data_type)?,
                ))
            })
            .collect::<Result<Vec<_>, PlyError>>()?;

        Ok(DynamicProperty { properties })
    }

    fn get(&self, name: &str) -> Option<&DynamicPropertyValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn get_float(&self, name: &str) -> f64 {
        self.get(name).map(|v| v.as_f64()).unwrap_or(0.0)
    }

    fn get_u8(&self, name: &str) -> u8 {
        self.get(name)
            .map(|v| match *v {
                DynamicPropertyValue::UInt8(v) => v,
                DynamicPropertyValue::Float32(v) => (v.clamp(0.0, 1.0) * 255.0).round() as u8,
                DynamicPropertyValue::Float64(v) => (v.clamp(0.0, 1.0) * 255.0).round() as u8,
                other => other.as_f64().clamp(0.0, 255.0) as u8,
            })
            .unwrap_or(0)
    }
}

impl PlyPropertyTrait for DynamicProperty {
    fn to_point(&self) -> [f64; 3] {
        [self.get_float("x"), self.get_float("y"), self.get_float("z")]
    }

    fn to_color(&self) -> [u8; 3] {
        if self.get("red").is_none() && self.get("f_dc_0").is_some() {
            return [
                sh_dc_to_color(self.get_float("f_dc_0") as f32),
                sh_dc_to_color(self.get_float("f_dc_1") as f32),
                sh_dc_to_color(self.get_float("f_dc_2") as f32),
            ];
        }
        [self.get_u8("red"), self.get_u8("green"), self.get_u8("blue")]
    }

    fn to_normal(&self) -> [f64; 3] {
        [self.get_float("nx"), self.get_float("ny"), self.get_float("nz")]
    }
}

/// A decoded vertex of any layout.
#[derive(Debug)]
pub enum PlyProperty {
    /// Splat record.
    GaussianSplat(Box<GaussianSplatRecord>),
    /// Point record.
    PointCloud(PointCloudRecord),
    /// Record of a dynamic layout.
    Dynamic(DynamicProperty),
}

pub(crate) fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

fn float_properties<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<PlyPropertyDefinition> {
    names
        .into_iter()
        .map(|name| PlyPropertyDefinition::new(name, PlyDataType::Float32))
        .collect()
}

fn point_cloud_properties() -> &'static [PlyPropertyDefinition] {
    static PROPS: OnceLock<Vec<PlyPropertyDefinition>> = OnceLock::new();
    PROPS.get_or_init(|| {
        let mut props = float_properties(["x", "y", "z", "nx", "ny", "nz"]);
        for name in ["red", "green", "blue"] {
            props.push(PlyPropertyDefinition::new(name, PlyDataType::UInt8));
        }
        props
    })
}

fn gaussian_splat_properties() -> &'static [PlyPropertyDefinition] {
    static PROPS: OnceLock<Vec<PlyPropertyDefinition>> = OnceLock::new();
    PROPS.get_or_init(|| {
        let names = ["x", "y", "z", "nx", "ny", "nz", "f_dc_0", "f_dc_1", "f_dc_2"]
            .into_iter()
            .map(String::from)
            .chain((0..SH_REST_COUNT).map(|i| format!("f_rest_{i}")))
            .chain(std::iter::once("opacity".to_string()))
            .chain((0..3).map(|i| format!("scale_{i}")))
            .chain((0..4).map(|i| format!("rot_{i}")))
            .collect::<Vec<_>>();
        float_properties(names.iter().map(String::as_str))
    })
}

impl PlyType {
    /// Decode one binary record.
    pub fn deserialize(&self, buffer: &[u8]) -> Result<PlyProperty, PlyError> {
        match self {
            PlyType::GaussianSplat => {
                let (property, _): (GaussianSplatRecord, usize) =
                    bincode::decode_from_slice(buffer, bincode_config())?;
                Ok(PlyProperty::GaussianSplat(Box::new(property)))
            }
            PlyType::PointCloud => {
                let (property, _): (PointCloudRecord, usize) =
                    bincode::decode_from_slice(buffer, bincode_config())?;
                Ok(PlyProperty::PointCloud(property))
            }
            PlyType::Dynamic(ref schema) => {
                let dynamic_property = DynamicProperty::parse_from_buffer(buffer, schema)?;
                Ok(PlyProperty::Dynamic(dynamic_property))
            }
        }
    }

    /// Bytes of one binary record.
    pub fn size_of(&self) -> usize {
        match self {
            PlyType::GaussianSplat => GaussianSplatRecord::SIZE,
            PlyType::PointCloud => PointCloudRecord::SIZE,
            PlyType::Dynamic(ref props) => props.iter().map(|p| p.data_type.size()).sum(),
        }
    }

    /// Header properties of this layout, in file order.
    pub fn properties(&self) -> &[PlyPropertyDefinition] {
        match self {
            PlyType::GaussianSplat => gaussian_splat_properties(),
            PlyType::PointCloud => point_cloud_properties(),
            PlyType::Dynamic(ref props) => props,
        }
    }

    /// Pick the fixed layout matching `properties` exactly, if any.
    pub fn detect_format(properties: &[PlyPropertyDefinition]) -> Self {
        if properties == point_cloud_properties() {
            PlyType::PointCloud
        } else if properties == gaussian_splat_properties() {
            PlyType::GaussianSplat
        } else {
            PlyType::Dynamic(properties.to_vec())
        }
    }

    /// True when the properties carry spherical harmonics and opacity.
    pub fn is_gaussian(&self) -> bool {
        match self {
            PlyType::GaussianSplat => true,
            PlyType::PointCloud => false,
            PlyType::Dynamic(props) => {
                let has = |name: &str| props.iter().any(|p| p.name == name);
                has("f_dc_0") && has("opacity")
            }
        }
    }
}

impl PlyPropertyTrait for PlyProperty {
    fn to_point(&self) -> [f64; 3] {
        match self {
            PlyProperty::GaussianSplat(property) => property.to_point(),
            PlyProperty::PointCloud(property) => property.to_point(),
            PlyProperty::Dynamic(property) => property.to_point(),
        }
    }

    fn to_color(&self) -> [u8; 3] {
        match self {
            PlyProperty::GaussianSplat(property) => property.to_color(),
            PlyProperty::PointCloud(property) => property.to_color(),
            PlyProperty::Dynamic(property) => property.to_color(),
        }
    }

    fn to_normal(&self) -> [f64; 3] {
        match self {
            PlyProperty::GaussianSplat(property) => property.to_normal(),
            PlyProperty::PointCloud(property) => property.to_normal(),
            PlyProperty::Dynamic(property) => property.to_normal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(PointCloudRecord::SIZE, 27);
        assert_eq!(GaussianSplatRecord::SIZE, 248);
        assert_eq!(PlyType::GaussianSplat.properties().len(), 62);
        assert_eq!(PlyType::PointCloud.size_of(), 27);

        let record = PointCloudRecord::from(&PointCloudPoint::default());
        let bytes = bincode::encode_to_vec(record, bincode_config())?;
        assert_eq!(bytes.len(), PointCloudRecord::SIZE);

        let record = GaussianSplatRecord::from(&GaussianSplat::default());
        let bytes = bincode::encode_to_vec(record, bincode_config())?;
        assert_eq!(bytes.len(), GaussianSplatRecord::SIZE);
        assert_eq!(record.values().count(), 62);

        Ok(())
    }

    #[test]
    fn test_format_detection() {
        let props = PlyType::PointCloud.properties().to_vec();
        assert_eq!(PlyType::detect_format(&props), PlyType::PointCloud);

        let props = PlyType::GaussianSplat.properties().to_vec();
        assert_eq!(PlyType::detect_format(&props), PlyType::GaussianSplat);

        // same names, different order
        let mut props = PlyType::PointCloud.properties().to_vec();
        props.swap(0, 1);
        assert!(matches!(PlyType::detect_format(&props), PlyType::Dynamic(_)));
    }

    #[test]
    fn test_data_type_parsing() {
        assert_eq!(PlyDataType::parse("float").ok(), Some(PlyDataType::Float32));
        assert_eq!(PlyDataType::parse("uint8").ok(), Some(PlyDataType::UInt8));
        assert_eq!(PlyDataType::parse("double").ok(), Some(PlyDataType::Float64));
        assert!(PlyDataType::parse("invalid").is_err());
        assert_eq!(PlyDataType::UInt16.name(), "ushort");
    }

    #[test]
    fn test_dynamic_property_by_name() -> Result<(), Box<dyn std::error::Error>> {
        let schema = vec![
            PlyPropertyDefinition::new("red", PlyDataType::UInt8),
            PlyPropertyDefinition::new("z", PlyDataType::Float64),
            PlyPropertyDefinition::new("x", PlyDataType::Int16),
        ];
        let mut buffer = vec![200u8];
        buffer.extend_from_slice(&2.5f64.to_le_bytes());
        buffer.extend_from_slice(&(-3i16).to_le_bytes());

        let property = DynamicProperty::parse_from_buffer(&buffer, &schema)?;
        assert_eq!(property.to_point(), [-3.0, 0.0, 2.5]);
        assert_eq!(property.to_color(), [200, 0, 0]);

        assert!(DynamicProperty::parse_from_buffer(&buffer[..5], &schema).is_err());

        let property = DynamicProperty::parse_from_ascii("12 1.5 -7", &schema)?;
        assert_eq!(property.to_point(), [-7.0, 0.0, 1.5]);
        assert_eq!(property.to_color(), [12, 0, 0]);

        assert!(DynamicProperty::parse_from_ascii("12 1.5", &schema).is_err());
        assert!(DynamicProperty::parse_from_ascii("300 1.5 2", &schema).is_err());
        Ok(())
    }
}
