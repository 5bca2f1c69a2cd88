//! Best-effort payload rewriting.
//!
//! The outbound body is edited as raw bytes; it is never rebuilt from the
//! parsed payload, so fields the relay does not model pass through unchanged.

pub mod avatar;

use bytes::Bytes;
use tracing::info;

use crate::payload::EventPayload;

pub use avatar::AvatarRewriter;

/// Replace every occurrence of `from` in `haystack` with `to`.
///
/// Matches are found left to right without overlap. An empty `from` leaves
/// the input untouched.
pub fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || haystack.len() < from.len() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(at) = find(rest, from) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(to);
        rest = &rest[at + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

/// Offset of the first occurrence of a non-empty `needle`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let (&first, tail) = needle.split_first()?;
    let mut offset = 0;
    while haystack.len() - offset >= needle.len() {
        let candidate = haystack[offset..=haystack.len() - needle.len()]
            .iter()
            .position(|&b| b == first)?;
        let start = offset + candidate;
        if haystack[start + 1..start + needle.len()] == *tail {
            return Some(start);
        }
        offset = start + 1;
    }
    None
}

/// Swap the sender's avatar URL for its fingerprinted form everywhere in `raw`.
///
/// Returns `raw` unchanged when there is no avatar URL or fingerprinting fails.
pub async fn rewrite_avatar(rewriter: &AvatarRewriter, raw: Bytes, payload: &EventPayload) -> Bytes {
    let Some(original) = payload.avatar_url() else {
        return raw;
    };

    let Some(rewritten) = rewriter.fingerprint_url(original).await else {
        return raw;
    };

    let body = replace_all(&raw, original.as_bytes(), rewritten.as_bytes());
    info!(
        original_length = raw.len(),
        rewritten_length = body.len(),
        "avatar_rewritten"
    );
    Bytes::from(body)
}
