use rand::Rng;

use crate::korean::{CHOSUNG, JONGSUNG, JUNGSUNG};
use crate::language::Language;

const BAG_SIZE: usize = 100;
const CHO_RATIO: f64 = 0.42;
const JUNG_RATIO: f64 = 0.46;
const REFILL_THRESHOLD: usize = 20;

/// English letter frequency, approximate percentages.
const ENGLISH_WEIGHTS: [(char, f64); 26] = [
    ('E', 12.02),
    ('T', 9.10),
    ('A', 8.12),
    ('O', 7.68),
    ('I', 7.31),
    ('N', 6.95),
    ('S', 6.28),
    ('R', 6.02),
    ('H', 5.92),
    ('D', 4.32),
    ('L', 3.98),
    ('U', 2.88),
    ('C', 2.71),
    ('M', 2.61),
    ('F', 2.30),
    ('Y', 2.11),
    ('W', 2.09),
    ('G', 2.03),
    ('P', 1.82),
    ('B', 1.49),
    ('V', 1.11),
    ('K', 0.69),
    ('X', 0.17),
    ('Q', 0.11),
    ('J', 0.10),
    ('Z', 0.07),
];

/// Minimal baked-in fallback used when no jamo-weight sidecar is loaded,
/// covering the five most frequent jamos per slot.
const KOREAN_CHO_FALLBACK: [(char, f64); 5] = [
    ('ㅇ', 10.9),
    ('ㄱ', 9.01),
    ('ㄴ', 6.45),
    ('ㄹ', 5.93),
    ('ㅅ', 5.29),
];
const KOREAN_JUNG_FALLBACK: [(char, f64); 5] = [
    ('ㅏ', 7.79),
    ('ㅣ', 5.4),
    ('ㅗ', 4.82),
    ('ㅜ', 4.54),
    ('ㅓ', 4.05),
];
const KOREAN_JONG_FALLBACK: [(char, f64); 4] =
    [('ㄴ', 4.0), ('ㅇ', 3.5), ('ㄹ', 3.0), ('ㄱ', 2.5)];

/// Weighted jamo tables for one language, either loaded from the JSON
/// sidecar or the baked-in fallback (§6 Tile frequency tables).
#[derive(Clone, Debug)]
pub struct KoreanWeights {
    pub chosung: Vec<(char, f64)>,
    pub jungsung: Vec<(char, f64)>,
    pub jongsung: Vec<(char, f64)>,
}

impl Default for KoreanWeights {
    fn default() -> Self {
        KoreanWeights {
            chosung: KOREAN_CHO_FALLBACK.to_vec(),
            jungsung: KOREAN_JUNG_FALLBACK.to_vec(),
            jongsung: KOREAN_JONG_FALLBACK.to_vec(),
        }
    }
}

impl KoreanWeights {
    /// Builds a complete table covering every jamo in the Hangul block,
    /// falling back to a small uniform weight for jamos the sidecar omits.
    pub fn full_uniform() -> Self {
        let uniform = 1.0;
        KoreanWeights {
            chosung: CHOSUNG.iter().map(|&c| (c, uniform)).collect(),
            jungsung: JUNGSUNG.iter().map(|&c| (c, uniform)).collect(),
            jongsung: JONGSUNG
                .iter()
                .flatten()
                .map(|&c| (c, uniform))
                .collect(),
        }
    }
}

fn weighted_pick(table: &[(char, f64)]) -> char {
    let total: f64 = table.iter().map(|(_, w)| *w).sum();
    let mut roll = rand::rng().random_range(0.0..total);
    for &(ch, w) in table {
        if roll < w {
            return ch;
        }
        roll -= w;
    }
    table.last().map(|(c, _)| *c).unwrap_or('?')
}

fn weighted_sample(table: &[(char, f64)], count: usize) -> Vec<char> {
    (0..count).map(|_| weighted_pick(table)).collect()
}

/// Shuffled queue of letters with weighted refill (§4.2). English draws are
/// single alphabet letters; Korean draws are raw jamos split 42/46/12 across
/// chosung/jungsung/jongsung.
#[derive(Debug)]
pub struct TileBag {
    language: Language,
    korean_weights: KoreanWeights,
    bag: Vec<char>,
}

impl TileBag {
    pub fn new(language: Language) -> Self {
        let mut bag = TileBag {
            language,
            korean_weights: KoreanWeights::default(),
            bag: Vec::new(),
        };
        bag.fill();
        bag
    }

    pub fn with_korean_weights(language: Language, korean_weights: KoreanWeights) -> Self {
        let mut bag = TileBag {
            language,
            korean_weights,
            bag: Vec::new(),
        };
        bag.fill();
        bag
    }

    fn fill(&mut self) {
        match self.language {
            Language::Ko => self.fill_korean(),
            Language::En => self.fill_english(),
        }
        self.shuffle();
    }

    fn fill_korean(&mut self) {
        let cho_count = (BAG_SIZE as f64 * CHO_RATIO) as usize;
        let jung_count = (BAG_SIZE as f64 * JUNG_RATIO) as usize;
        let jong_count = BAG_SIZE - cho_count - jung_count;
        self.bag
            .extend(weighted_sample(&self.korean_weights.chosung, cho_count));
        self.bag
            .extend(weighted_sample(&self.korean_weights.jungsung, jung_count));
        self.bag
            .extend(weighted_sample(&self.korean_weights.jongsung, jong_count));
    }

    fn fill_english(&mut self) {
        self.bag.extend(weighted_sample(&ENGLISH_WEIGHTS, BAG_SIZE));
    }

    fn shuffle(&mut self) {
        let mut rng = rand::rng();
        let len = self.bag.len();
        for i in (1..len).rev() {
            let j = rng.random_range(0..=i);
            self.bag.swap(i, j);
        }
    }

    /// Draws up to `count` tokens, refilling in front of the draw whenever
    /// the remaining bag dips below the refill threshold.
    pub fn draw(&mut self, count: usize) -> Vec<char> {
        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            if self.bag.len() < REFILL_THRESHOLD {
                self.fill();
            }
            match self.bag.pop() {
                Some(tile) => drawn.push(tile),
                None => break,
            }
        }
        drawn
    }

    /// Returns tokens to the bag and reshuffles; used by reroll.
    pub fn add_tiles(&mut self, tokens: impl IntoIterator<Item = char>) {
        self.bag.extend(tokens);
        self.shuffle();
    }

    pub fn peek_remaining(&self) -> usize {
        self.bag.len()
    }
}
