//! snapshot/parser — потоковый разбор записей снапшота.
//!
//! Parser<'a> — итератор по Element<'a> поверх &'a [u8]:
//! - элементы zero-copy (имя и bitfield указывают внутрь буфера);
//! - все смещения — usize с checked_add, сравнение с record_end/buf.len();
//! - любая ошибка формата терминальна: итератор отдаёт Err один раз и дальше None;
//! - после записи курсор ставится на объявленный конец записи, даже если в ней
//!   остались неизвестные хвостовые байты (совместимость с будущими полями).
//!
//! Смещение в ParseError отсчитывается от начала buf (включая заголовок,
//! если parser создан через Parser::at).

use log::debug;
use std::fmt;

use crate::bitfield::{bitfield_data_len, Bitfield};
use crate::consts::CANONICAL_PAGE_SIZE;
use crate::metrics::{record_parse_error, record_record_parsed};
use crate::varint;

use super::element::Element;

/// Какое из полей длины не удалось прочитать.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthField {
    Record,
    Filename,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    MalformedLength(LengthField),
    RecordOverrun,
    FilenameOverrun,
    BadFileSize,
    BadResidentPages,
    BadBucketSize,
    BadBucketCount,
    BitfieldOverrun,
}

impl ParseErrorKind {
    fn message(&self) -> &'static str {
        match self {
            ParseErrorKind::MalformedLength(LengthField::Record) => "bad record length",
            ParseErrorKind::MalformedLength(LengthField::Filename) => "bad filename length",
            ParseErrorKind::RecordOverrun => "declared record length extends beyond buffer",
            ParseErrorKind::FilenameOverrun => "declared filename length extends beyond record",
            ParseErrorKind::BadFileSize => "bad file size",
            ParseErrorKind::BadResidentPages => "bad resident pages",
            ParseErrorKind::BadBucketSize => "bad bucket size",
            ParseErrorKind::BadBucketCount => "bad bucket count",
            ParseErrorKind::BitfieldOverrun => "declared bucket count extends beyond record",
        }
    }
}

/// Ошибка разбора: вид + смещение (байт от начала буфера), где она обнаружена.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "snapshot parse error: {} (detected at byte {})",
            self.kind.message(),
            self.offset
        )
    }
}

impl std::error::Error for ParseError {}

pub struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Parser<'a> {
    /// Разбор записей с начала buf (без заголовка).
    pub fn new(buf: &'a [u8]) -> Self {
        Self::at(buf, 0)
    }

    /// Разбор записей, начиная со смещения start (обычно — сразу после заголовка).
    pub fn at(buf: &'a [u8], start: usize) -> Self {
        Self {
            buf,
            pos: start.min(buf.len()),
            done: false,
        }
    }

    /// Текущая позиция курсора (начало следующей записи).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Прочитать одну запись. Ok(None) — буфер исчерпан ровно на границе записи.
    fn next_element(&mut self) -> Result<Option<Element<'a>>, ParseError> {
        let buf = self.buf;
        let end = buf.len();
        let mut cur = self.pos;

        if cur == end {
            return Ok(None);
        }

        let err = |kind, offset| ParseError { kind, offset };

        let (record_len, next) = varint::decode(buf, cur, end)
            .ok_or_else(|| err(ParseErrorKind::MalformedLength(LengthField::Record), cur))?;
        cur = next;

        let record_end = usize::try_from(record_len)
            .ok()
            .and_then(|n| cur.checked_add(n))
            .filter(|&e| e <= end)
            .ok_or_else(|| err(ParseErrorKind::RecordOverrun, cur))?;

        let (filename_len, next) = varint::decode(buf, cur, record_end)
            .ok_or_else(|| err(ParseErrorKind::MalformedLength(LengthField::Filename), cur))?;
        cur = next;

        let filename_end = usize::try_from(filename_len)
            .ok()
            .and_then(|n| cur.checked_add(n))
            .filter(|&e| e <= record_end)
            .ok_or_else(|| err(ParseErrorKind::FilenameOverrun, cur))?;
        let filename = &buf[cur..filename_end];
        cur = filename_end;

        let mut field = |kind: ParseErrorKind| -> Result<u64, ParseError> {
            let (v, next) = varint::decode(buf, cur, record_end).ok_or_else(|| err(kind, cur))?;
            cur = next;
            Ok(v)
        };
        let file_size = field(ParseErrorKind::BadFileSize)?;
        let resident_pages = field(ParseErrorKind::BadResidentPages)?;
        let bucket_size = field(ParseErrorKind::BadBucketSize)?;
        let num_buckets = field(ParseErrorKind::BadBucketCount)?;

        let data_end = bitfield_data_len(num_buckets)
            .and_then(|n| cur.checked_add(n))
            .filter(|&e| e <= record_end)
            .ok_or_else(|| err(ParseErrorKind::BitfieldOverrun, cur))?;
        let data = &buf[cur..data_end];

        // Хвост записи после известных полей пропускаем без разбора.
        if data_end < record_end {
            debug!(
                "snapshot parser: skip {} trailing byte(s) in record at {}",
                record_end - data_end,
                self.pos
            );
        }
        self.pos = record_end;

        let bucket_size = if bucket_size == 0 {
            CANONICAL_PAGE_SIZE
        } else {
            bucket_size
        };

        Ok(Some(Element {
            filename,
            file_size,
            resident_pages,
            bitfield: Bitfield::new(bucket_size, num_buckets, data),
        }))
    }

    /// Прогнать handler по всем записям. Первая ошибка (формата или handler'а)
    /// останавливает обработку. Возвращает число обработанных записей.
    pub fn process<F>(self, mut handler: F) -> anyhow::Result<u64>
    where
        F: FnMut(&Element<'a>) -> anyhow::Result<()>,
    {
        let mut n = 0u64;
        for elem in self {
            handler(&elem?)?;
            n += 1;
        }
        Ok(n)
    }
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Element<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(e)) => {
                record_record_parsed();
                Some(Ok(e))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                record_parse_error();
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Parser<'_> {}
