//! Temporary-file tokens and their mapping onto the temp directory.
//!
//! A token is the only handle a client ever sees for an uploaded image or
//! a compositing result, and it doubles as the file name. Input tokens look
//! like `<id>.<ext>`; output tokens keep the input's base name for
//! traceability and add a second random id: `<base>-<id>.gif`.
//!
//! [`resolve_path`] is the only way to turn a client-supplied token into a
//! filesystem path.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lowercase RFC 4648 base-32 alphabet used for random ids.
pub const ID_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Random bytes per id (encodes to 16 characters).
pub const ID_BYTES: usize = 10;

/// Extension forced onto every compositing output.
pub const OUTPUT_EXTENSION: &str = "gif";

/// Stand-in file name for tokens with no usable final component
/// (`""`, `"."`, `".."`, `"/"`).
const PLACEHOLDER_NAME: &str = "_";

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A freshly generated token. Never contains path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// A new input token: `<id>.<extension>`.
    pub fn new_input(extension: &str) -> Self {
        Self(format!("{}.{extension}", random_id()))
    }

    /// A new output token derived from `input`: `<input-base>-<id>.gif`.
    ///
    /// `input` may be untrusted; only its final path component is used.
    pub fn new_output(input: &str) -> Self {
        let base = stem(file_name(input));
        Self(format!("{base}-{}.{OUTPUT_EXTENSION}", random_id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token without its extension.
    pub fn stem(&self) -> &str {
        stem(&self.0)
    }

    /// The path this token names inside `temp_dir`.
    pub fn path_in(&self, temp_dir: &Path) -> PathBuf {
        resolve_path(temp_dir, &self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Map a (possibly hostile) token onto a path directly inside `temp_dir`.
///
/// Only the last component of `token` survives, so `../../etc/passwd`
/// resolves to `<temp_dir>/passwd`. Both `/` and `\` count as separators.
pub fn resolve_path(temp_dir: &Path, token: &str) -> PathBuf {
    temp_dir.join(file_name(token))
}

/// Final path component of `token`, never empty and never `.`/`..`.
pub fn file_name(token: &str) -> &str {
    let last = token
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    match last {
        "" | "." | ".." => PLACEHOLDER_NAME,
        name => name,
    }
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

// ---------------------------------------------------------------------------
// Random ids
// ---------------------------------------------------------------------------

/// A fresh random id: [`ID_BYTES`] bytes from the thread-local CSPRNG,
/// base-32 encoded without padding.
pub fn random_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::rng().fill(&mut bytes);
    encode_base32(&bytes)
}

fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in bytes {
        buffer = ((buffer << 8) | u32::from(byte)) & 0xfff;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(ID_ALPHABET[((buffer >> bits) & 0x1f) as usize]));
        }
    }

    if bits > 0 {
        out.push(char::from(ID_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize]));
    }

    out
}
