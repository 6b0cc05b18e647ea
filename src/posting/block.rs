//! Posting block codec (spec §4.2, §6): a small header plus a
//! delta-encoded docno list and, per document, a delta-encoded position
//! list with per-position lengths. One block covers a contiguous range
//! of docnos for a single term.

use crate::codec::{decode_uint, encode_uint};
use crate::errors::{CoreError, CoreResult};
use crate::types::{DocumentNumber, Position, Posting};

/// Encodes `postings` (already grouped, `docno` then `pos` ascending)
/// into one block. Document numbers are delta-encoded against the
/// previous document; positions are delta-encoded against the previous
/// position within the same document, each followed by its length.
pub fn encode_block(postings: &[Posting]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_uint(&mut out, postings.len() as u32);

    let mut last_doc = 0u64;
    let mut idx = 0usize;
    while idx < postings.len() {
        let docno = postings[idx].docno.get();
        let mut doc_postings = Vec::new();
        while idx < postings.len() && postings[idx].docno.get() == docno {
            doc_postings.push(postings[idx]);
            idx += 1;
        }
        encode_uint(&mut out, (docno - last_doc) as u32);
        last_doc = docno;
        encode_uint(&mut out, doc_postings.len() as u32);

        let mut last_pos = 0u32;
        for p in &doc_postings {
            encode_uint(&mut out, p.pos.get() - last_pos);
            last_pos = p.pos.get();
            encode_uint(&mut out, p.length);
        }
    }
    out
}

/// Decodes a block produced by [`encode_block`] back into a flat,
/// `(docno, pos)`-ordered posting list.
pub fn decode_block(buf: &[u8]) -> CoreResult<Vec<Posting>> {
    let mut offset = 0usize;
    let (total_docs, consumed) = decode_uint(&buf[offset..])?;
    offset += consumed;

    let mut out = Vec::new();
    let mut last_doc = 0u64;
    let mut docs_seen = 0u32;

    while offset < buf.len() {
        let (delta_doc, c1) = decode_uint(&buf[offset..])?;
        offset += c1;
        let docno = last_doc + delta_doc as u64;
        last_doc = docno;

        let (count, c2) = decode_uint(&buf[offset..])?;
        offset += c2;

        let mut last_pos = 0u32;
        for _ in 0..count {
            let (delta_pos, c3) = decode_uint(&buf[offset..])?;
            offset += c3;
            let pos = last_pos + delta_pos;
            last_pos = pos;

            let (length, c4) = decode_uint(&buf[offset..])?;
            offset += c4;

            out.push(
                Posting::new(
                    DocumentNumber::new(docno).map_err(CoreError::external)?,
                    Position::new(pos).map_err(CoreError::external)?,
                    length,
                )
                .map_err(CoreError::external)?,
            );
        }
        docs_seen += 1;
    }

    if docs_seen != total_docs {
        return Err(CoreError::invariant("posting block doc count mismatch"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::test_support::postings;

    #[test]
    fn encode_decode_roundtrip() {
        let data = postings(&[(1, 10), (1, 20), (3, 5), (3, 9), (7, 1)]);
        let encoded = encode_block(&data);
        let decoded = decode_block(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_block_roundtrips() {
        let encoded = encode_block(&[]);
        let decoded = decode_block(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}
