//! Text coercion for values bound into queries.
//!
//! IRC clients still send legacy single-byte text. Anything that is not valid
//! UTF-8 is reinterpreted as Windows-1252 rather than rejected, so a stray
//! smart quote never corrupts a stored row or fails a statement.

use std::borrow::Cow;

use tracing::warn;

/// Decode `bytes` as UTF-8, falling back to Windows-1252 for invalid input.
///
/// Valid input is borrowed unchanged.
pub fn repair_utf8(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(error) => {
            let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            warn!(
                valid_up_to = error.valid_up_to(),
                len = bytes.len(),
                "input was not valid UTF-8, reinterpreted as Windows-1252"
            );
            Cow::Owned(decoded.into_owned())
        },
    }
}
