//! Block blob layout: `tx_count: u32 BE`, then `tx_count` entries of
//! `len: u32 BE` followed by `len` bytes of raw transaction.

use bytes::Buf;

use crate::transformations::TransformationError;

/// Split a block blob into its raw transactions, in block order.
pub fn decode_block_payload(
    block_id: i64,
    mut data: &[u8],
) -> Result<Vec<&[u8]>, TransformationError> {
    let count = read_u32(block_id, &mut data, "transaction count")?;
    let mut txs = Vec::with_capacity((count as usize).min(data.len() / 4));

    for index in 0..count {
        let len = read_u32(block_id, &mut data, "transaction length")? as usize;
        if len == 0 {
            return Err(TransformationError::DecodeError(format!(
                "block {}: transaction {} is empty",
                block_id, index
            )));
        }
        if data.remaining() < len {
            return Err(TransformationError::DecodeError(format!(
                "block {}: transaction {} needs {} bytes, {} left",
                block_id,
                index,
                len,
                data.remaining()
            )));
        }
        let (tx, rest) = data.split_at(len);
        txs.push(tx);
        data = rest;
    }

    if data.has_remaining() {
        return Err(TransformationError::DecodeError(format!(
            "block {}: {} trailing bytes after {} transactions",
            block_id,
            data.remaining(),
            count
        )));
    }

    Ok(txs)
}

fn read_u32(block_id: i64, data: &mut &[u8], what: &str) -> Result<u32, TransformationError> {
    if data.remaining() < 4 {
        return Err(TransformationError::DecodeError(format!(
            "block {}: truncated {}",
            block_id, what
        )));
    }
    Ok(data.get_u32())
}

/// Inverse of [`decode_block_payload`], used to build fixtures.
#[cfg(test)]
pub fn encode_block_payload(txs: &[&[u8]]) -> Vec<u8> {
    use bytes::BufMut;

    let mut out = Vec::new();
    out.put_u32(txs.len() as u32);
    for tx in txs {
        out.put_u32(tx.len() as u32);
        out.put_slice(tx);
    }
    out
}
