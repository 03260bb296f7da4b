//! Bitfield — упакованный вектор резидентности (1 бит на bucket).
//!
//! Бит i хранится в data[i / 8], разряд (i % 8), младший разряд первым.
//! Bitfield<'a> — это view: данные либо заимствованы у входного буфера снапшота,
//! либо у MincoreResult на стороне сборки.

use crate::consts::CANONICAL_PAGE_SIZE;

/// Длина упакованных данных для num_buckets бит: ceil(num_buckets / 8).
/// None, если не помещается в usize.
#[inline]
pub fn bitfield_data_len(num_buckets: u64) -> Option<usize> {
    let bytes = num_buckets / 8 + u64::from(num_buckets % 8 != 0);
    usize::try_from(bytes).ok()
}

/// Упаковать последовательность флагов в байты (LSB first).
pub fn pack_bits<I>(bits: I) -> Vec<u8>
where
    I: IntoIterator<Item = bool>,
{
    let mut out = Vec::new();
    for (i, bit) in bits.into_iter().enumerate() {
        if i % 8 == 0 {
            out.push(0);
        }
        if bit {
            if let Some(last) = out.last_mut() {
                *last |= 1 << (i % 8);
            }
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitfield<'a> {
    /// Байт на бит. 0 — каноническая страница (4096).
    pub bucket_size: u64,
    pub num_buckets: u64,
    pub data: &'a [u8],
}

impl<'a> Bitfield<'a> {
    pub fn new(bucket_size: u64, num_buckets: u64, data: &'a [u8]) -> Self {
        Self {
            bucket_size,
            num_buckets,
            data,
        }
    }

    /// Шаг в байтах, покрываемый одним битом.
    #[inline]
    pub fn stride(&self) -> u64 {
        if self.bucket_size == 0 {
            CANONICAL_PAGE_SIZE
        } else {
            self.bucket_size
        }
    }

    /// ceil(num_buckets / 8) — сколько байт должно быть в data.
    #[inline]
    pub fn data_size(&self) -> usize {
        bitfield_data_len(self.num_buckets).unwrap_or(usize::MAX)
    }

    /// Значение бита i. Биты за пределами data читаются как 0.
    #[inline]
    pub fn get_bit(&self, i: u64) -> bool {
        let byte = match usize::try_from(i / 8).ok().and_then(|idx| self.data.get(idx)) {
            Some(b) => *b,
            None => return false,
        };
        (byte >> (i % 8)) & 1 == 1
    }

    /// Количество установленных бит среди первых num_buckets.
    pub fn count_ones(&self) -> u64 {
        (0..self.num_buckets).filter(|&i| self.get_bit(i)).count() as u64
    }

    /// Число максимальных серий одинаковых бит (0 для пустого bitfield).
    pub fn runs(&self) -> u64 {
        let mut runs = 0u64;
        let mut prev: Option<bool> = None;
        for i in 0..self.num_buckets {
            let b = self.get_bit(i);
            if prev != Some(b) {
                runs += 1;
                prev = Some(b);
            }
        }
        runs
    }
}
