mod parser;
mod properties;
mod writer;

pub use parser::*;
pub use properties::*;
pub use writer::*;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file
    #[error("Failed to read or write PLY file")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a binary record
    #[error("Failed to serialize PLY record")]
    Serialize(#[from] bincode::error::EncodeError),

    /// Failed to deserialize a binary record
    #[error("Failed to deserialize PLY record")]
    Deserialize(#[from] bincode::error::DecodeError),

    /// Unsupported PLY property or element
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),

    /// Malformed header
    #[error("Invalid PLY header: {0}")]
    InvalidHeader(String),

    /// A value in an ASCII body that does not parse
    #[error("Invalid PLY value: {0}")]
    InvalidValue(String),

    /// The body ended before all vertices were read
    #[error("Unexpected end of PLY data")]
    UnexpectedEof,

    /// Nothing to write
    #[error("Refusing to write a PLY file without vertices")]
    EmptyInput,

    /// Splat files can be inspected but not decoded into splats
    #[error("Reading Gaussian splats is not supported ({vertex_count} vertices in file)")]
    UnsupportedSplatRead {
        /// Number of vertices declared in the header.
        vertex_count: usize,
    },
}

/// Body encoding of a PLY file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlyEncoding {
    /// `binary_little_endian 1.0`
    #[default]
    BinaryLittleEndian,
    /// `ascii 1.0`
    Ascii,
}

impl PlyEncoding {
    /// Name used on the `format` header line.
    pub fn name(self) -> &'static str {
        match self {
            PlyEncoding::BinaryLittleEndian => "binary_little_endian",
            PlyEncoding::Ascii => "ascii",
        }
    }
}
