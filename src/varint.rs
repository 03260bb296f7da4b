//! varint — беззнаковый LEB128 для u64 (7 бит данных на байт, младшая группа первой).
//!
//! Что здесь:
//! - encode_into(): дописать значение в Vec<u8> (append-only).
//! - encoded_len(): длина кодировки без записи.
//! - decode(): прочитать значение из buf[pos..end]. Никогда не читает байт с индексом >= end.
//!
//! decode() возвращает None при:
//! - обрыве последовательности (continuation-бит на последнем доступном байте);
//! - кодировке длиннее 10 байт;
//! - переполнении u64 (10-й байт несёт больше одного значащего бита).

use crate::consts::VARINT_MAX_LEN;

/// Дописать v в out. Возвращает число записанных байт.
pub fn encode_into(mut v: u64, out: &mut Vec<u8>) -> usize {
    let mut n = 0;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        n += 1;
        if v == 0 {
            out.push(byte);
            return n;
        }
        out.push(byte | 0x80);
    }
}

/// Число байт, которое займёт v.
#[inline]
pub fn encoded_len(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    if bits == 0 {
        1
    } else {
        (bits + 6) / 7
    }
}

/// Декодировать значение, начиная с buf[pos], не заходя за end.
///
/// Возвращает Some((value, next_pos)) или None, если байты в [pos, end) не образуют
/// корректного varint. end больше buf.len() обрезается до buf.len().
pub fn decode(buf: &[u8], pos: usize, end: usize) -> Option<(u64, usize)> {
    let end = end.min(buf.len());
    let mut value: u64 = 0;
    let mut cur = pos;
    for i in 0..VARINT_MAX_LEN {
        if cur >= end {
            return None;
        }
        let byte = buf[cur];
        cur += 1;
        let chunk = (byte & 0x7F) as u64;
        let shift = 7 * i as u32;
        // 10-й байт: в u64 остался ровно один бит.
        if i == VARINT_MAX_LEN - 1 && chunk > 1 {
            return None;
        }
        value |= chunk << shift;
        if byte & 0x80 == 0 {
            return Some((value, cur));
        }
    }
    None
}
