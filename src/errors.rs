use thiserror::Error;

/// Crate-wide error type. Variants are grouped informally into the four
/// kinds described by the format specification: usage errors (programmer
/// mistakes), data errors (malformed bytes), I/O errors, and not-found.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file already open: {0}")]
    AlreadyOpen(String),

    #[error("file not open")]
    NotOpen,

    #[error("file opened read-only")]
    ReadOnly,

    #[error("invalid order: {0} (must be >= 3)")]
    InvalidOrder(usize),

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("invalid object id")]
    InvalidObjectId,

    #[error("invalid pointer")]
    InvalidPointer,

    #[error("missing document id")]
    MissingDocumentId,

    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("unknown value tag: 0x{0:02x}")]
    UnknownTag(u8),

    #[error("invalid length field")]
    InvalidLength,

    #[error("string is not valid utf-8")]
    NonUtf8,

    #[error("integer outside safe-integer range")]
    IntegerOutOfSafeRange,

    #[error("pointer outside safe-integer range")]
    PointerOutOfSafeRange,

    #[error("corrupt metadata record")]
    CorruptMetadata,

    #[error("record at offset {0} is malformed: {1}")]
    Malformed(u64, String),

    #[error("path not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
