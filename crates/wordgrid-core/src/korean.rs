//! Hangul jamo decomposition and composition, ported from the original
//! service's `korean_utils` arithmetic over the Unicode Hangul block.

const HANGUL_BASE: u32 = 0xAC00;
const HANGUL_END: u32 = 0xD7A3;

pub const CHOSUNG: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];

pub const JUNGSUNG: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ',
    'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

/// Index 0 is "no final consonant"; real jongsung jamos start at index 1.
pub const JONGSUNG: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

pub fn is_hangul_syllable(ch: char) -> bool {
    let code = ch as u32;
    (HANGUL_BASE..=HANGUL_END).contains(&code)
}

pub fn is_chosung(ch: char) -> bool {
    CHOSUNG.contains(&ch)
}

pub fn is_jungsung(ch: char) -> bool {
    JUNGSUNG.contains(&ch)
}

pub fn is_jongsung(ch: char) -> bool {
    JONGSUNG.iter().flatten().any(|&j| j == ch)
}

/// `('한')` → `('ㅎ', 'ㅏ', Some('ㄴ'))`; non-Hangul input is returned as its
/// own "initial consonant" with empty vowel/final, matching the original's
/// permissive fallback.
pub fn decompose_syllable(ch: char) -> (char, char, Option<char>) {
    if !is_hangul_syllable(ch) {
        return (ch, '\0', None);
    }
    let code = ch as u32 - HANGUL_BASE;
    let jong_idx = (code % 28) as usize;
    let jung_idx = ((code - jong_idx as u32) / 28 % 21) as usize;
    let cho_idx = (((code - jong_idx as u32) / 28) / 21) as usize;
    (CHOSUNG[cho_idx], JUNGSUNG[jung_idx], JONGSUNG[jong_idx])
}

pub fn compose_syllable(cho: char, jung: char, jong: Option<char>) -> char {
    let (Some(cho_idx), Some(jung_idx)) = (
        CHOSUNG.iter().position(|&c| c == cho),
        JUNGSUNG.iter().position(|&c| c == jung),
    ) else {
        return cho;
    };
    let jong_idx = match jong {
        None => 0,
        Some(j) => JONGSUNG.iter().position(|&c| c == Some(j)).unwrap_or(0),
    };
    let code = HANGUL_BASE + (cho_idx as u32) * 21 * 28 + (jung_idx as u32) * 28 + jong_idx as u32;
    char::from_u32(code).unwrap_or(cho)
}

/// Decomposes a word into its jamo string: `사과` → `ㅅㅏㄱㅘ`.
pub fn decompose_word(word: &str) -> String {
    let mut out = String::new();
    for ch in word.chars() {
        if is_hangul_syllable(ch) {
            let (cho, jung, jong) = decompose_syllable(ch);
            out.push(cho);
            out.push(jung);
            if let Some(j) = jong {
                out.push(j);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Composes a jamo string back into syllables. Assumes valid syllable
/// patterns; non-conforming runs are passed through unchanged.
pub fn compose_word(jamos: &str) -> String {
    let chars: Vec<char> = jamos.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if is_chosung(chars[i]) {
            let cho = chars[i];
            if i + 1 < chars.len() && is_jungsung(chars[i + 1]) {
                let jung = chars[i + 1];
                let mut jong = None;
                let mut consumed = 2;
                if i + 2 < chars.len() && is_jongsung(chars[i + 2]) {
                    let starts_next_syllable =
                        i + 3 < chars.len() && is_jungsung(chars[i + 3]);
                    if !starts_next_syllable {
                        jong = Some(chars[i + 2]);
                        consumed = 3;
                    }
                }
                out.push(compose_syllable(cho, jung, jong));
                i += consumed;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// `(초성 + 중성 + 종성?)+`; each syllable needs at least a cho+jung pair.
pub fn is_valid_syllable_pattern(jamos: &str) -> bool {
    if jamos.is_empty() {
        return false;
    }
    let chars: Vec<char> = jamos.chars().collect();
    let mut i = 0;
    let mut syllables = 0;
    while i < chars.len() {
        if i >= chars.len() || !is_chosung(chars[i]) {
            return false;
        }
        i += 1;
        if i >= chars.len() || !is_jungsung(chars[i]) {
            return false;
        }
        i += 1;
        if i < chars.len() && is_jongsung(chars[i]) {
            let starts_next_syllable = i + 1 < chars.len() && is_jungsung(chars[i + 1]);
            if !starts_next_syllable {
                i += 1;
            }
        }
        syllables += 1;
    }
    syllables > 0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JamoType {
    Cho,
    Jung,
    Jong,
    Unknown,
}

pub fn jamo_type(jamo: char) -> JamoType {
    if is_chosung(jamo) {
        JamoType::Cho
    } else if is_jungsung(jamo) {
        JamoType::Jung
    } else if is_jongsung(jamo) {
        JamoType::Jong
    } else {
        JamoType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_then_compose_round_trips() {
        for word in ["한글", "사과", "가나다"] {
            let jamos = decompose_word(word);
            assert_eq!(compose_word(&jamos), word);
        }
    }

    #[test]
    fn decompose_matches_known_syllable() {
        assert_eq!(decompose_syllable('한'), ('ㅎ', 'ㅏ', Some('ㄴ')));
        assert_eq!(decompose_syllable('가'), ('ㄱ', 'ㅏ', None));
    }

    #[test]
    fn syllable_pattern_validation() {
        assert!(is_valid_syllable_pattern("ㅅㅏ"));
        assert!(is_valid_syllable_pattern("ㅅㅏㄱ"));
        assert!(is_valid_syllable_pattern("ㅅㅏㄱㅘ"));
        assert!(!is_valid_syllable_pattern("ㅅㄱ"));
        assert!(!is_valid_syllable_pattern("ㅏㅏ"));
        assert!(!is_valid_syllable_pattern(""));
    }
}
