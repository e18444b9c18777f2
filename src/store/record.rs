//! On-disk record codec.
//!
//! Each entry is framed as `[u32 total_len][u32 key_len][key][u32 value_len]
//! [value]`, all integers little-endian, `total_len` inclusive of its own
//! four bytes. Framing is self-delimiting so recovery can stream records
//! without a separate manifest.

use crate::store::error::StoreError;

const LEN_FIELD: usize = 4;
const HEADER_LEN: usize = LEN_FIELD * 2;

/// Length in bytes a `(key, value)` pair would occupy once encoded, without
/// allocating the encoded form. Lets the writer decide on rotation before
/// producing any bytes.
pub fn encoded_len(key: &str, value: &str) -> u32 {
    (HEADER_LEN + LEN_FIELD + key.len() + value.len()) as u32
}

/// Encodes a `(key, value)` pair into its on-disk byte representation.
pub fn encode(key: &str, value: &str) -> Vec<u8> {
    let total_len = encoded_len(key, value);
    let mut buf = Vec::with_capacity(total_len as usize);
    buf.extend_from_slice(&total_len.to_le_bytes());
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    buf
}

/// Decodes one record from `buf`, which must hold exactly one full record
/// starting at its length prefix.
///
/// Fails with a caller-supplied `StoreError` constructor when any length
/// field would read past `buf`, or when `total_len` disagrees with the sum
/// of the inner fields.
pub fn decode(buf: &[u8], mut corrupt: impl FnMut(String) -> StoreError) -> Result<(String, String), StoreError> {
    if buf.len() < HEADER_LEN {
        return Err(corrupt("record shorter than header".to_string()));
    }
    let total_len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if total_len > buf.len() {
        return Err(corrupt(format!(
            "total_len {} exceeds available {} bytes",
            total_len,
            buf.len()
        )));
    }
    let key_len = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;
    let key_start = HEADER_LEN;
    let key_end = key_start
        .checked_add(key_len)
        .ok_or_else(|| corrupt("key_len overflow".to_string()))?;
    if key_end + LEN_FIELD > buf.len() {
        return Err(corrupt("key_len reads past record".to_string()));
    }
    let key = std::str::from_utf8(&buf[key_start..key_end])
        .map_err(|e| corrupt(format!("invalid UTF-8 key: {e}")))?
        .to_string();

    let value_len_start = key_end;
    let value_len =
        u32::from_le_bytes(buf[value_len_start..value_len_start + LEN_FIELD].try_into().unwrap())
            as usize;
    let value_start = value_len_start + LEN_FIELD;
    let value_end = value_start
        .checked_add(value_len)
        .ok_or_else(|| corrupt("value_len overflow".to_string()))?;
    if value_end > buf.len() {
        return Err(corrupt("value_len reads past record".to_string()));
    }
    if value_end != total_len {
        return Err(corrupt(format!(
            "total_len {} disagrees with computed record length {}",
            total_len, value_end
        )));
    }
    let value = std::str::from_utf8(&buf[value_start..value_end])
        .map_err(|e| corrupt(format!("invalid UTF-8 value: {e}")))?
        .to_string();

    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrupt(reason: String) -> StoreError {
        StoreError::CorruptRecord {
            path: "test".to_string(),
            reason,
        }
    }

    #[test]
    fn round_trips_simple_entry() {
        let buf = encode("alpha", "1");
        assert_eq!(buf.len(), encoded_len("alpha", "1") as usize);
        let (k, v) = decode(&buf, corrupt).unwrap();
        assert_eq!(k, "alpha");
        assert_eq!(v, "1");
    }

    #[test]
    fn round_trips_empty_value() {
        let buf = encode("k", "");
        let (k, v) = decode(&buf, corrupt).unwrap();
        assert_eq!(k, "k");
        assert_eq!(v, "");
    }

    #[test]
    fn round_trips_multibyte_utf8() {
        let buf = encode("键", "値段は高い");
        let (k, v) = decode(&buf, corrupt).unwrap();
        assert_eq!(k, "键");
        assert_eq!(v, "値段は高い");
    }

    #[test]
    fn rejects_truncated_header() {
        let err = decode(&[1, 0, 0], corrupt).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }

    #[test]
    fn rejects_total_len_past_slice() {
        let mut buf = encode("alpha", "beta");
        buf[0] = 0xff; // absurd total_len
        let err = decode(&buf, corrupt).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }

    #[test]
    fn rejects_inconsistent_total_len() {
        let mut buf = encode("alpha", "beta");
        let real_len = buf.len() as u32;
        buf[0..4].copy_from_slice(&(real_len - 1).to_le_bytes());
        let err = decode(&buf, corrupt).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }
}
