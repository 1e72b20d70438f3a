use crate::core::error::TorrentError;
use librqbit_core::magnet::Magnet;
use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Borrowed};

/// Deepest list/dict nesting accepted before handing bytes to the decoder.
const MAX_NESTING: usize = 64;

/// SHA-1 of the bencoded `info` dictionary, as 40 lowercase hex chars.
pub fn info_hash_from_content(content: &[u8]) -> Result<String, TorrentError> {
    check_nesting(content)?;
    let meta: TorrentMetaV1Borrowed = torrent_from_bytes(content)
        .map_err(|e| TorrentError::InvalidTorrent(e.to_string()))?;
    Ok(meta.info_hash.as_string())
}

/// Lowercase hex info hash from a magnet's `xt=urn:btih:` parameter, given
/// either as 40 hex or 32 base32 characters.
pub fn magnet_to_infohash(magnet: &str) -> Result<String, TorrentError> {
    let invalid = |reason: String| TorrentError::InvalidMagnet {
        magnet: magnet.to_string(),
        reason,
    };
    let parsed = Magnet::parse(magnet).map_err(|e| invalid(e.to_string()))?;
    let id = parsed
        .as_id20()
        .ok_or_else(|| invalid("no btih exact topic".to_string()))?;
    Ok(id.as_string())
}

// The decoder recurses per container, so hostile nesting is refused up front.
fn check_nesting(data: &[u8]) -> Result<(), TorrentError> {
    let too_deep = || TorrentError::InvalidTorrent(format!("nesting deeper than {}", MAX_NESTING));
    let truncated = |pos: usize| TorrentError::InvalidTorrent(format!("truncated value at byte {}", pos));
    let mut depth = 0usize;
    let mut pos = 0usize;
    while pos < data.len() {
        match data[pos] {
            b'd' | b'l' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(too_deep());
                }
                pos += 1;
            }
            b'e' => {
                depth = depth.saturating_sub(1);
                pos += 1;
            }
            b'i' => {
                let end = data[pos..].iter().position(|&b| b == b'e').ok_or_else(|| truncated(pos))?;
                pos += end + 1;
            }
            b'0'..=b'9' => {
                let colon = data[pos..].iter().position(|&b| b == b':').ok_or_else(|| truncated(pos))?;
                let len: usize = std::str::from_utf8(&data[pos..pos + colon])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| truncated(pos))?;
                pos = (pos + colon + 1).checked_add(len).ok_or_else(|| truncated(pos))?;
            }
            _ => return Err(truncated(pos)),
        }
    }
    Ok(())
}
