use percent_encoding::percent_decode_str;

use crate::api::FAMILY_PREFIX;

/// Extracts `{family}` from `/api/v1/family/{family}/...`.
/// Returns a percent-decoded owned [`String`].
pub fn family_id_from_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix(FAMILY_PREFIX)?.strip_prefix('/')?;
    let seg = rest.split('/').next()?;
    if seg.is_empty() {
        None
    } else {
        Some(percent_decode_str(seg).decode_utf8_lossy().to_string())
    }
}

/// Path segments below the family scope, e.g. `["logs", "12", "complete"]`.
pub fn family_relative_segments(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix(FAMILY_PREFIX)?.strip_prefix('/')?;
    let mut it = rest.split('/').filter(|s| !s.is_empty());
    it.next()?;
    Some(
        it.map(|seg| percent_decode_str(seg).decode_utf8_lossy().to_string())
            .collect(),
    )
}
