//! Turns a buffered fragment class back into text.

use std::io::Read;

use flate2::read::GzDecoder;

use super::{FragmentField, ReassemblyDecodeError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Order `fragments` by sequence, join them, inflate and decode as UTF-8.
///
/// Payloads without the gzip magic header are taken as already inflated.
/// Sorting happens in place; the bytes themselves are left untouched so a
/// failed decode can be retried later.
pub(crate) fn decode_fragments(
    field: FragmentField,
    fragments: &mut [(u32, Vec<u8>)],
) -> Result<String, ReassemblyDecodeError> {
    fragments.sort_by_key(|(sequence, _)| *sequence);
    let joined = fragments
        .iter()
        .map(|(_, bytes)| bytes.as_slice())
        .collect::<Vec<_>>()
        .concat();

    let inflated = if joined.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        GzDecoder::new(joined.as_slice())
            .read_to_end(&mut out)
            .map_err(|source| ReassemblyDecodeError::Decompress { field, source })?;
        out
    } else {
        joined
    };

    String::from_utf8(inflated).map_err(|source| ReassemblyDecodeError::Utf8 { field, source })
}
