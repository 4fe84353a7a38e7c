use bytes::{BufMut, Bytes, BytesMut};

/// Frame boundary.
pub const END: u8 = 0xC0;

/// Escape marker; the next byte is a transposed `END` or `ESC`.
pub const ESC: u8 = 0xDB;

/// Transposed `END`, valid only after `ESC`.
pub const ESC_END: u8 = 0xDC;

/// Transposed `ESC`, valid only after `ESC`.
pub const ESC_ESC: u8 = 0xDD;

/// Encode a datagram into a standalone frame.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────────────────┬──────┐
/// │ END  │ payload, 0xC0 -> DB DC, 0xDB -> DB DD │ END  │
/// │ 0xC0 │                                      │ 0xC0 │
/// └──────┴──────────────────────────────────────┴──────┘
/// ```
///
/// Never fails; the result is exactly [`encoded_len`] bytes long.
pub fn encode(datagram: &[u8]) -> Bytes {
    let mut dst = BytesMut::new();
    encode_into(datagram, &mut dst);
    dst.freeze()
}

/// Append the frame for `datagram` to `dst`.
pub fn encode_into(datagram: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(datagram));
    dst.put_u8(END);

    // Copy runs of plain bytes in one go; only END/ESC need stuffing.
    let mut rest = datagram;
    while let Some(pos) = rest.iter().position(|&b| b == END || b == ESC) {
        dst.put_slice(&rest[..pos]);
        match rest[pos] {
            END => dst.put_slice(&[ESC, ESC_END]),
            _ => dst.put_slice(&[ESC, ESC_ESC]),
        }
        rest = &rest[pos + 1..];
    }
    dst.put_slice(rest);

    dst.put_u8(END);
}

/// Exact wire size of the frame for `datagram`.
pub fn encoded_len(datagram: &[u8]) -> usize {
    let stuffed = datagram.iter().filter(|&&b| b == END || b == ESC).count();
    datagram.len() + stuffed + 2
}
