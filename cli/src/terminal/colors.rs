use colored::Color;

pub const PRIMARY: Color = Color::TrueColor {
    r: 0x7d,
    g: 0xcf,
    b: 0xff,
};
pub const ACCENT: Color = Color::TrueColor {
    r: 0xff,
    g: 0xb8,
    b: 0x6c,
};
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;
pub const IPV4_ADDR: Color = Color::TrueColor {
    r: 0x9e,
    g: 0xce,
    b: 0x6a,
};
