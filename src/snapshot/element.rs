//! snapshot/element — одна запись снапшота (один файл).
//!
//! Element<'a> — только view: имя и bitfield заимствованы либо у входного буфера
//! (parser), либо у данных текущего файла (builder). Пережить буфер он не может.

use crate::bitfield::Bitfield;
use crate::util::display_text;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Element<'a> {
    /// Имя файла как есть (не обязательно UTF-8, без завершающего нуля).
    pub filename: &'a [u8],
    pub file_size: u64,
    /// Информационное поле: сколько страниц было резидентно при снимке.
    pub resident_pages: u64,
    pub bitfield: Bitfield<'a>,
}

impl<'a> Element<'a> {
    pub fn display_name(&self) -> String {
        display_text(self.filename)
    }
}
