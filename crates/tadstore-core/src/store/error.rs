use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a model store: bad magic {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("unsupported store format version {found} (this build reads version {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("store file is corrupt: {0}")]
    Corrupt(String),

    #[error("directory checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("directory serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("region '{region_id}' is already indexed in resolution group {resolution}")]
    DuplicateRegion { resolution: u32, region_id: String },

    #[error("resolution group {0} does not exist in this store")]
    UnknownGroup(u32),

    #[error("region '{region_id}' is not indexed in resolution group {resolution}")]
    UnknownRegion { resolution: u32, region_id: String },

    #[error("no rows are staged for resolution group {0}; append a block before recording a region")]
    NothingStaged(u32),

    #[error("staged rows {staged_start}..{staged_end} do not match the range being recorded {given_start}..{given_end}")]
    MismatchedRows {
        staged_start: u64,
        staged_end: u64,
        given_start: u64,
        given_end: u64,
    },

    #[error("block rows are {found} slots wide but resolution group {resolution} stores {expected}")]
    MismatchedBlockWidth {
        resolution: u32,
        expected: u32,
        found: u32,
    },

    #[error("rows {start}..{end} are out of bounds for resolution group {resolution} ({total_rows} rows)")]
    RowsOutOfBounds {
        resolution: u32,
        start: u64,
        end: u64,
        total_rows: u64,
    },
}
