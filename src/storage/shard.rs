//! Shard encoding.
//!
//! Layout: 4-byte magic, little-endian format version, little-endian header
//! length, JSON header, JSON body. The header carries the name tables so
//! startup can rebuild the inverted maps without decoding full bodies. Any
//! magic or version mismatch reads as "missing" and the indexer regenerates
//! the shard.

use crate::error::{IndexError, IndexResult};
use crate::symbol::IndexedFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SHARD_MAGIC: [u8; 4] = *b"SIDX";
pub const SHARD_VERSION: u32 = 3;

const PREFIX_LEN: usize = 12;

/// Name tables read at startup without touching the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardHeader {
    pub uri: String,
    pub content_hash: String,
    pub symbol_names: Vec<String>,
    pub symbol_ids: Vec<String>,
    pub reference_names: Vec<String>,
}

impl ShardHeader {
    pub fn for_file(file: &IndexedFile) -> Self {
        let symbol_names: BTreeSet<String> =
            file.symbols.iter().map(|s| s.name.to_string()).collect();
        let reference_names: BTreeSet<String> = file
            .references
            .iter()
            .map(|r| r.symbol_name.to_string())
            .collect();
        Self {
            uri: file.uri.clone(),
            content_hash: file.content_hash.clone(),
            symbol_names: symbol_names.into_iter().collect(),
            symbol_ids: file.symbols.iter().map(|s| s.id.clone()).collect(),
            reference_names: reference_names.into_iter().collect(),
        }
    }
}

pub fn encode_shard(file: &IndexedFile) -> IndexResult<Vec<u8>> {
    let header = serde_json::to_vec(&ShardHeader::for_file(file))
        .map_err(|e| IndexError::General(format!("shard header encode failed: {e}")))?;
    let body = serde_json::to_vec(file)
        .map_err(|e| IndexError::General(format!("shard body encode failed: {e}")))?;

    let mut bytes = Vec::with_capacity(PREFIX_LEN + header.len() + body.len());
    bytes.extend_from_slice(&SHARD_MAGIC);
    bytes.extend_from_slice(&SHARD_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

fn checked_header_range(bytes: &[u8]) -> Option<(usize, usize)> {
    if bytes.len() < PREFIX_LEN || bytes[0..4] != SHARD_MAGIC {
        return None;
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
    if version != SHARD_VERSION {
        return None;
    }
    let header_len = u32::from_le_bytes(bytes[8..12].try_into().ok()?) as usize;
    let header_end = PREFIX_LEN.checked_add(header_len)?;
    if header_end > bytes.len() {
        return None;
    }
    Some((PREFIX_LEN, header_end))
}

/// Decode only the header. Returns None for missing, foreign, or
/// version-mismatched shards.
pub fn decode_shard_header(bytes: &[u8]) -> Option<ShardHeader> {
    let (start, end) = checked_header_range(bytes)?;
    serde_json::from_slice(&bytes[start..end]).ok()
}

/// Decode the full record. Returns None under the same conditions as
/// `decode_shard_header`.
pub fn decode_shard(bytes: &[u8]) -> Option<IndexedFile> {
    let (_, end) = checked_header_range(bytes)?;
    serde_json::from_slice(&bytes[end..]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::MetadataMap;
    use crate::types::{Location, Range, SymbolKind};

    fn sample_file() -> IndexedFile {
        IndexedFile {
            uri: "/w/a.ts".into(),
            content_hash: "abc".into(),
            mtime: 1234,
            symbols: vec![crate::symbol::Symbol {
                id: "00000000:foo".into(),
                name: "foo".into(),
                kind: SymbolKind::Function,
                location: Location::new("/w/a.ts", 0, 9),
                range: Range::new(0, 0, 0, 20),
                container_name: None,
                full_container_path: "".into(),
                is_static: false,
                parameters_count: Some(0),
                metadata: MetadataMap::new(),
            }],
            references: Vec::new(),
            imports: Vec::new(),
            re_exports: Vec::new(),
            last_indexed_at: 99,
            shard_version: SHARD_VERSION,
            metadata: MetadataMap::new(),
        }
    }

    #[test]
    fn test_round_trip() {
        let file = sample_file();
        let bytes = encode_shard(&file).unwrap();
        let decoded = decode_shard(&bytes).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_header_only_decode() {
        let bytes = encode_shard(&sample_file()).unwrap();
        let header = decode_shard_header(&bytes).unwrap();
        assert_eq!(header.uri, "/w/a.ts");
        assert_eq!(header.symbol_names, vec!["foo".to_string()]);
        assert_eq!(header.symbol_ids, vec!["00000000:foo".to_string()]);
        assert!(header.reference_names.is_empty());
    }

    #[test]
    fn test_version_mismatch_reads_as_missing() {
        let mut bytes = encode_shard(&sample_file()).unwrap();
        bytes[4..8].copy_from_slice(&(SHARD_VERSION + 1).to_le_bytes());
        assert!(decode_shard(&bytes).is_none());
        assert!(decode_shard_header(&bytes).is_none());
    }

    #[test]
    fn test_garbage_reads_as_missing() {
        assert!(decode_shard(b"not a shard").is_none());
        assert!(decode_shard(&[]).is_none());

        let mut bytes = encode_shard(&sample_file()).unwrap();
        bytes[0] = b'X';
        assert!(decode_shard(&bytes).is_none());
    }
}
