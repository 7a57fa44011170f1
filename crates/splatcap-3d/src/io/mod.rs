/// COLMAP sparse model reader and writer module.
pub mod colmap;

/// PLY point cloud and Gaussian splat module.
pub mod ply;

/// Most records reserved up front from a count stored in a file.
pub(crate) const MAX_RESERVED_RECORDS: usize = 1 << 16;

/// Capacity for a record count read from a file, which may be corrupt.
pub(crate) fn reserved_capacity(count: u64) -> usize {
    usize::try_from(count).map_or(MAX_RESERVED_RECORDS, |n| n.min(MAX_RESERVED_RECORDS))
}
