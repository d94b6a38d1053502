//! Base-14 Helvetica fonts with WinAnsi encoding
//!
//! The forms are filled with the viewer-provided Helvetica family, so no
//! font program is embedded. Widths come from the Adobe font metrics and
//! are used for letter-spaced fields and for measuring text.

use lopdf::{dictionary, Dictionary, Object};

/// Standard (non-embedded) fonts supported for overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum StandardFont {
    Helvetica,
    #[default]
    HelveticaBold,
}

/// Advance widths for U+0020..=U+007E, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    333, 333, 584, 584, 584, 611, 975, // ':'..'@'
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    333, 278, 333, 584, 556, 333, // '['..'`'
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // 'a'..'m'
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // 'n'..'z'
    389, 280, 389, 584, // '{'..'~'
];

/// Width used for characters outside the table
const DEFAULT_WIDTH: u16 = 556;

impl StandardFont {
    /// PostScript name used in the font dictionary
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Page resource name for this font
    pub fn resource_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "HvF1",
            StandardFont::HelveticaBold => "HvF2",
        }
    }

    fn widths(self) -> &'static [u16; 95] {
        match self {
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        }
    }

    /// Advance width of a character in 1/1000 em
    pub fn char_width_units(self, c: char) -> u16 {
        let base = fold_latin(c);
        let code = base as u32;
        if (0x20..=0x7E).contains(&code) {
            return self.widths()[(code - 0x20) as usize];
        }
        match c {
            '¿' => 611,
            '¡' => 333,
            '°' => 400,
            'º' => 365,
            'ª' => 370,
            '·' => 278,
            '–' => 556,
            '—' => 1000,
            _ => DEFAULT_WIDTH,
        }
    }

    /// Advance width of a character in points at `size`
    pub fn char_width(self, c: char, size: f32) -> f64 {
        self.char_width_units(c) as f64 * size as f64 / 1000.0
    }

    /// Width of a string in points at `size`
    pub fn text_width(self, text: &str, size: f32) -> f64 {
        text.chars().map(|c| self.char_width(c, size)).sum()
    }

    /// Font dictionary object for a document
    pub fn to_font_dict(self) -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(self.base_font().as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        }
    }
}

/// Map accented Latin letters onto the base letter sharing their width
fn fold_latin(c: char) -> char {
    match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Encode text as WinAnsi bytes; unmappable characters become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            match code {
                0x20..=0x7E | 0xA0..=0xFF => code as u8,
                _ => match c {
                    '€' => 0x80,
                    '‚' => 0x82,
                    '„' => 0x84,
                    '…' => 0x85,
                    '‘' => 0x91,
                    '’' => 0x92,
                    '“' => 0x93,
                    '”' => 0x94,
                    '•' => 0x95,
                    '–' => 0x96,
                    '—' => 0x97,
                    '\t' | '\n' | '\r' => b' ',
                    _ => b'?',
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_wider_than_regular() {
        let text = "RAZON SOCIAL";
        assert!(
            StandardFont::HelveticaBold.text_width(text, 12.0)
                > StandardFont::Helvetica.text_width(text, 12.0)
        );
    }

    #[test]
    fn test_known_widths() {
        assert_eq!(StandardFont::HelveticaBold.char_width_units('A'), 722);
        assert_eq!(StandardFont::HelveticaBold.char_width_units(' '), 278);
        assert_eq!(StandardFont::Helvetica.char_width_units('i'), 222);
        assert_eq!(StandardFont::HelveticaBold.char_width_units('Ñ'), 722);
        assert_eq!(StandardFont::HelveticaBold.char_width_units('é'), 556);
    }

    #[test]
    fn test_width_scales_with_size() {
        let w10 = StandardFont::HelveticaBold.char_width('X', 10.0);
        let w20 = StandardFont::HelveticaBold.char_width('X', 20.0);
        assert!((w20 - 2.0 * w10).abs() < 1e-9);
        assert!((w10 - 6.67).abs() < 1e-9);
    }

    #[test]
    fn test_encode_spanish() {
        assert_eq!(encode_win_ansi("AÑO"), vec![b'A', 0xD1, b'O']);
        assert_eq!(encode_win_ansi("€"), vec![0x80]);
        assert_eq!(encode_win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn test_font_dict() {
        let dict = StandardFont::HelveticaBold.to_font_dict();
        assert_eq!(
            dict.get(b"BaseFont").unwrap().as_name().unwrap(),
            b"Helvetica-Bold"
        );
    }
}
