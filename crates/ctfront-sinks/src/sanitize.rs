//! Making team names safe to print.
//!
//! Names come straight from the scoring platform. Before a display Sink
//! prints one, terminal escape sequences, other control characters and
//! combining marks are removed, so a name can neither drive the terminal
//! nor smear diacritics across neighbouring rows.

use std::cmp::Ordering;

/// Sorted code point ranges of the combining marks (nonspacing, spacing
/// and enclosing) of the scripts in everyday use. Marks of historic scripts
/// outside the Basic Multilingual Plane are not listed.
const COMBINING_MARKS: &[(char, char)] = &[
    ('\u{0300}', '\u{036F}'),
    ('\u{0483}', '\u{0489}'),
    ('\u{0591}', '\u{05BD}'),
    ('\u{05BF}', '\u{05BF}'),
    ('\u{05C1}', '\u{05C2}'),
    ('\u{05C4}', '\u{05C5}'),
    ('\u{05C7}', '\u{05C7}'),
    ('\u{0610}', '\u{061A}'),
    ('\u{064B}', '\u{065F}'),
    ('\u{0670}', '\u{0670}'),
    ('\u{06D6}', '\u{06DC}'),
    ('\u{06DF}', '\u{06E4}'),
    ('\u{06E7}', '\u{06E8}'),
    ('\u{06EA}', '\u{06ED}'),
    ('\u{0711}', '\u{0711}'),
    ('\u{0730}', '\u{074A}'),
    ('\u{07A6}', '\u{07B0}'),
    ('\u{07EB}', '\u{07F3}'),
    ('\u{07FD}', '\u{07FD}'),
    ('\u{0816}', '\u{0819}'),
    ('\u{081B}', '\u{0823}'),
    ('\u{0825}', '\u{0827}'),
    ('\u{0829}', '\u{082D}'),
    ('\u{0859}', '\u{085B}'),
    ('\u{0898}', '\u{089F}'),
    ('\u{08CA}', '\u{08E1}'),
    ('\u{08E3}', '\u{0903}'),
    ('\u{093A}', '\u{093C}'),
    ('\u{093E}', '\u{094F}'),
    ('\u{0951}', '\u{0957}'),
    ('\u{0962}', '\u{0963}'),
    ('\u{0981}', '\u{0983}'),
    ('\u{09BC}', '\u{09BC}'),
    ('\u{09BE}', '\u{09C4}'),
    ('\u{09C7}', '\u{09C8}'),
    ('\u{09CB}', '\u{09CD}'),
    ('\u{09D7}', '\u{09D7}'),
    ('\u{09E2}', '\u{09E3}'),
    ('\u{09FE}', '\u{09FE}'),
    ('\u{0A01}', '\u{0A03}'),
    ('\u{0A3C}', '\u{0A3C}'),
    ('\u{0A3E}', '\u{0A42}'),
    ('\u{0A47}', '\u{0A48}'),
    ('\u{0A4B}', '\u{0A4D}'),
    ('\u{0A51}', '\u{0A51}'),
    ('\u{0A70}', '\u{0A71}'),
    ('\u{0A75}', '\u{0A75}'),
    ('\u{0A81}', '\u{0A83}'),
    ('\u{0ABC}', '\u{0ABC}'),
    ('\u{0ABE}', '\u{0AC5}'),
    ('\u{0AC7}', '\u{0AC9}'),
    ('\u{0ACB}', '\u{0ACD}'),
    ('\u{0AE2}', '\u{0AE3}'),
    ('\u{0AFA}', '\u{0AFF}'),
    ('\u{0B01}', '\u{0B03}'),
    ('\u{0B3C}', '\u{0B3C}'),
    ('\u{0B3E}', '\u{0B44}'),
    ('\u{0B47}', '\u{0B48}'),
    ('\u{0B4B}', '\u{0B4D}'),
    ('\u{0B55}', '\u{0B57}'),
    ('\u{0B62}', '\u{0B63}'),
    ('\u{0B82}', '\u{0B82}'),
    ('\u{0BBE}', '\u{0BC2}'),
    ('\u{0BC6}', '\u{0BC8}'),
    ('\u{0BCA}', '\u{0BCD}'),
    ('\u{0BD7}', '\u{0BD7}'),
    ('\u{0C00}', '\u{0C04}'),
    ('\u{0C3C}', '\u{0C3C}'),
    ('\u{0C3E}', '\u{0C44}'),
    ('\u{0C46}', '\u{0C48}'),
    ('\u{0C4A}', '\u{0C4D}'),
    ('\u{0C55}', '\u{0C56}'),
    ('\u{0C62}', '\u{0C63}'),
    ('\u{0C81}', '\u{0C83}'),
    ('\u{0CBC}', '\u{0CBC}'),
    ('\u{0CBE}', '\u{0CC4}'),
    ('\u{0CC6}', '\u{0CC8}'),
    ('\u{0CCA}', '\u{0CCD}'),
    ('\u{0CD5}', '\u{0CD6}'),
    ('\u{0CE2}', '\u{0CE3}'),
    ('\u{0CF3}', '\u{0CF3}'),
    ('\u{0D00}', '\u{0D03}'),
    ('\u{0D3B}', '\u{0D3C}'),
    ('\u{0D3E}', '\u{0D44}'),
    ('\u{0D46}', '\u{0D48}'),
    ('\u{0D4A}', '\u{0D4D}'),
    ('\u{0D57}', '\u{0D57}'),
    ('\u{0D62}', '\u{0D63}'),
    ('\u{0D81}', '\u{0D83}'),
    ('\u{0DCA}', '\u{0DCA}'),
    ('\u{0DCF}', '\u{0DD4}'),
    ('\u{0DD6}', '\u{0DD6}'),
    ('\u{0DD8}', '\u{0DDF}'),
    ('\u{0DF2}', '\u{0DF3}'),
    ('\u{0E31}', '\u{0E31}'),
    ('\u{0E34}', '\u{0E3A}'),
    ('\u{0E47}', '\u{0E4E}'),
    ('\u{0EB1}', '\u{0EB1}'),
    ('\u{0EB4}', '\u{0EBC}'),
    ('\u{0EC8}', '\u{0ECE}'),
    ('\u{0F18}', '\u{0F19}'),
    ('\u{0F35}', '\u{0F35}'),
    ('\u{0F37}', '\u{0F37}'),
    ('\u{0F39}', '\u{0F39}'),
    ('\u{0F3E}', '\u{0F3F}'),
    ('\u{0F71}', '\u{0F84}'),
    ('\u{0F86}', '\u{0F87}'),
    ('\u{0F8D}', '\u{0FBC}'),
    ('\u{0FC6}', '\u{0FC6}'),
    ('\u{102B}', '\u{103E}'),
    ('\u{1056}', '\u{1059}'),
    ('\u{105E}', '\u{1060}'),
    ('\u{1062}', '\u{1064}'),
    ('\u{1067}', '\u{106D}'),
    ('\u{1071}', '\u{1074}'),
    ('\u{1082}', '\u{108D}'),
    ('\u{108F}', '\u{108F}'),
    ('\u{109A}', '\u{109D}'),
    ('\u{135D}', '\u{135F}'),
    ('\u{1712}', '\u{1715}'),
    ('\u{1732}', '\u{1734}'),
    ('\u{1752}', '\u{1753}'),
    ('\u{1772}', '\u{1773}'),
    ('\u{17B4}', '\u{17D3}'),
    ('\u{17DD}', '\u{17DD}'),
    ('\u{180B}', '\u{180D}'),
    ('\u{180F}', '\u{180F}'),
    ('\u{18A9}', '\u{18A9}'),
    ('\u{1920}', '\u{193B}'),
    ('\u{1A17}', '\u{1A1B}'),
    ('\u{1A55}', '\u{1A7F}'),
    ('\u{1AB0}', '\u{1AFF}'),
    ('\u{1B00}', '\u{1B04}'),
    ('\u{1B34}', '\u{1B44}'),
    ('\u{1B6B}', '\u{1B73}'),
    ('\u{1B80}', '\u{1B82}'),
    ('\u{1BA1}', '\u{1BAD}'),
    ('\u{1BE6}', '\u{1BF3}'),
    ('\u{1C24}', '\u{1C37}'),
    ('\u{1CD0}', '\u{1CD2}'),
    ('\u{1CD4}', '\u{1CE8}'),
    ('\u{1CED}', '\u{1CED}'),
    ('\u{1CF4}', '\u{1CF4}'),
    ('\u{1CF7}', '\u{1CF9}'),
    ('\u{1DC0}', '\u{1DFF}'),
    ('\u{20D0}', '\u{20FF}'),
    ('\u{2CEF}', '\u{2CF1}'),
    ('\u{2D7F}', '\u{2D7F}'),
    ('\u{2DE0}', '\u{2DFF}'),
    ('\u{302A}', '\u{302F}'),
    ('\u{3099}', '\u{309A}'),
    ('\u{A66F}', '\u{A672}'),
    ('\u{A674}', '\u{A67D}'),
    ('\u{A69E}', '\u{A69F}'),
    ('\u{A6F0}', '\u{A6F1}'),
    ('\u{A802}', '\u{A802}'),
    ('\u{A806}', '\u{A806}'),
    ('\u{A80B}', '\u{A80B}'),
    ('\u{A823}', '\u{A827}'),
    ('\u{A82C}', '\u{A82C}'),
    ('\u{A880}', '\u{A881}'),
    ('\u{A8B4}', '\u{A8C5}'),
    ('\u{A8E0}', '\u{A8F1}'),
    ('\u{A8FF}', '\u{A8FF}'),
    ('\u{A926}', '\u{A92D}'),
    ('\u{A947}', '\u{A953}'),
    ('\u{A980}', '\u{A983}'),
    ('\u{A9B3}', '\u{A9C0}'),
    ('\u{A9E5}', '\u{A9E5}'),
    ('\u{AA29}', '\u{AA36}'),
    ('\u{AA43}', '\u{AA43}'),
    ('\u{AA4C}', '\u{AA4D}'),
    ('\u{AA7B}', '\u{AA7D}'),
    ('\u{AAB0}', '\u{AAB0}'),
    ('\u{AAB2}', '\u{AAB4}'),
    ('\u{AAB7}', '\u{AAB8}'),
    ('\u{AABE}', '\u{AABF}'),
    ('\u{AAC1}', '\u{AAC1}'),
    ('\u{AAEB}', '\u{AAEF}'),
    ('\u{AAF5}', '\u{AAF6}'),
    ('\u{ABE3}', '\u{ABEA}'),
    ('\u{ABEC}', '\u{ABED}'),
    ('\u{FB1E}', '\u{FB1E}'),
    ('\u{FE00}', '\u{FE0F}'),
    ('\u{FE20}', '\u{FE2F}'),
    ('\u{1D165}', '\u{1D169}'),
    ('\u{1D16D}', '\u{1D172}'),
    ('\u{1D17B}', '\u{1D182}'),
    ('\u{1D185}', '\u{1D18B}'),
    ('\u{1D1AA}', '\u{1D1AD}'),
    ('\u{E0100}', '\u{E01EF}'),
];

/// Whether `c` is a combining mark.
pub fn is_combining_mark(c: char) -> bool {
    COMBINING_MARKS
        .binary_search_by(|&(start, end)| {
            if end < c {
                Ordering::Less
            } else if start > c {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}

/// Strip escape sequences, control characters, and combining marks.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // CSI: ESC [ parameters final, where final is in '@'..='~'.
            if chars.next_if_eq(&'[').is_some() {
                for next in chars.by_ref() {
                    if ('@'..='~').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if c.is_control() || is_combining_mark(c) {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(sanitize("Hell's Shells"), "Hell's Shells");
        assert_eq!(sanitize("Rundfunk Röhmen"), "Rundfunk Röhmen");
        assert_eq!(sanitize("$(/bin/sh)"), "$(/bin/sh)");
    }

    #[test]
    fn escape_sequences_are_removed() {
        assert_eq!(sanitize("\u{1b}[12;31mANSIholes"), "ANSIholes");
        assert_eq!(sanitize("a\u{1b}[2Jb"), "ab");
        assert_eq!(sanitize("bell\u{7}\r\n"), "bell");
    }

    #[test]
    fn combining_marks_are_removed() {
        let zalgo = "h\u{334}\u{33f}a\u{335}\u{319}x\u{338}\u{35c}";
        assert_eq!(sanitize(zalgo), "hax");
        assert!(is_combining_mark('\u{301}'));
        assert!(!is_combining_mark('é'));
    }

    #[test]
    fn marks_outside_the_diacritic_blocks_are_removed() {
        // Devanagari vowel sign I and Thai mai han-akat.
        assert!(is_combining_mark('\u{93F}'));
        assert!(is_combining_mark('\u{E31}'));
        assert_eq!(sanitize("x\u{93F}\u{93F}\u{93F}y"), "xy");
        assert_eq!(sanitize("\u{E01}\u{E31}\u{E48}\u{E48}"), "\u{E01}");
        assert_eq!(sanitize("ка\u{1D167}\u{E0100}т"), "кат");
    }

    #[test]
    fn base_letters_of_those_scripts_survive() {
        assert_eq!(sanitize("\u{915}\u{916}"), "\u{915}\u{916}");
        assert!(!is_combining_mark('\u{E01}'));
        assert!(!is_combining_mark('\u{E50}'));
    }

    #[test]
    fn mark_table_is_sorted_and_disjoint() {
        assert!(COMBINING_MARKS.iter().all(|(start, end)| start <= end));
        assert!(COMBINING_MARKS.windows(2).all(|w| match w {
            [(_, end), (next, _)] => end < next,
            _ => false,
        }));
    }
}
