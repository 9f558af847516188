//! Standard exit codes (BSD sysexits.h compatible)

/// Command line usage error, including invalid bucket and key names
pub const USAGE: i32 = 64;

/// Data format error, e.g. a stale revision on update
pub const DATAERR: i32 = 65;

/// Cannot open input: bucket or key not found
pub const NOINPUT: i32 = 66;

/// Service unavailable: server unreachable or timed out
pub const UNAVAILABLE: i32 = 69;

/// Internal software error
pub const SOFTWARE: i32 = 70;

/// Can't create: key or bucket already exists
pub const CANTCREAT: i32 = 73;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error
pub const CONFIG: i32 = 78;
