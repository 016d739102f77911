//! Cell formats and layout of the Resumen sheet

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern};

/// Column widths in 1/256 of a character, one per resumen column
pub const COLUMN_WIDTHS: [u16; 10] = [2000, 2000, 3000, 2000, 2000, 2500, 2500, 2000, 3000, 2000];

const LIGHT_BLUE: u32 = 0xCCFFFF;

pub fn create_header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::Black)
        .set_background_color(Color::RGB(LIGHT_BLUE))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

pub fn create_data_format() -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::VerticalCenter)
}

pub fn create_date_format() -> Format {
    Format::new().set_num_format("yyyy-mm-dd hh:mm:ss")
}

/// Width in characters as rust_xlsxwriter expects it
pub fn column_width_chars(units: u16) -> f64 {
    f64::from(units) / 256.0
}
