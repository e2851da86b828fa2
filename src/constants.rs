//! The closed set of wire type codes for the J value codec.
//!
//! This table is versionless by design (see the crate's Non-goals): a code
//! is either one of the kinds below or a decode error, there is no
//! forwards-compatible "unknown but skippable" kind.

/// Wire type codes (§3).
pub const NULL: u8 = 0;
pub const BOOLEAN: u8 = 1;
pub const INT: u8 = 2;
pub const DATE: u8 = 3;
pub const TIME: u8 = 4;
pub const DATETIME: u8 = 5;
pub const TIMESTAMP: u8 = 6;
pub const DURATION: u8 = 7;
pub const FLOAT: u8 = 8;
pub const STRING: u8 = 9;
pub const CAT: u8 = 10;
pub const SERIES: u8 = 11;
pub const ERR: u8 = 16;
pub const LIST: u8 = 13;
pub const DICT: u8 = 14;
pub const DATAFRAME: u8 = 15;
pub const FN: u8 = 17;

/// Number of payload bytes following the 4-byte type code for fixed-layout
/// kinds, minus one; `-1` marks a variable-length kind whose element size
/// must be read from its own length prefix instead. Used by the container
/// codec to advance over elements without fully decoding them first.
pub fn fixed_trailer(kind: u8) -> i32 {
    match kind {
        NULL => 7,
        BOOLEAN => 7,
        INT => 15,
        TIME => 15,
        DURATION => 15,
        FLOAT => 15,
        DATE => 7,
        _ => -1,
    }
}

/// True if `kind` is one of the codes in the registry.
pub fn is_known_kind(kind: u8) -> bool {
    matches!(
        kind,
        NULL | BOOLEAN
            | INT
            | DATE
            | TIME
            | DATETIME
            | TIMESTAMP
            | DURATION
            | FLOAT
            | STRING
            | CAT
            | SERIES
            | ERR
            | LIST
            | DICT
            | DATAFRAME
            | FN
    )
}

/// Above this estimated byte size, frame values are compressed (unless the
/// peer is local). Mirrors the original engine's 4MB heuristic.
pub const COMPRESSION_THRESHOLD: usize = 4_000_000;

/// Recommended max UTF-8 byte length for a timezone name (IANA zone names
/// fit comfortably within this).
pub const MAX_TZ_NAME_LEN: usize = 64;

/// Upper bound on the number of elements a single LIST or DICT may carry.
/// Guards the container decoder against hostile element counts before any
/// element has been read.
pub const MAX_CONTAINER_LEN: usize = 1 << 20;

/// Max UTF-8 byte length of a single DICT key.
pub const MAX_KEY_LEN: usize = 1 << 16;

/// Name of the environment variable the client consults for a password
/// when the caller supplies none (§6). The exact name is a deployment
/// choice; this crate picks one and documents it here.
pub const DEFAULT_PASSWORD_ENV: &str = "JSM_PASSWORD";

/// Literal 4-byte handshake tag the client sends before its credential.
pub const HANDSHAKE_TAG: &[u8; 4] = b"jsm:";

/// Round `n` up to the next multiple of 8.
pub const fn pad8(n: usize) -> usize {
    (n + 7) & !7
}
