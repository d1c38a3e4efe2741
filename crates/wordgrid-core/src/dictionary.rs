use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::trie::BidirectionalTrie;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LookupResult {
    pub valid: bool,
    pub length: usize,
    pub score: i64,
}

#[derive(Debug, Default)]
struct LanguageDict {
    words: HashMap<String, (usize, i64)>,
    by_length: HashMap<usize, Vec<String>>,
    trie: BidirectionalTrie,
}

/// Process-wide word set, hydrated once at startup from persistence and
/// shared read-only afterward (§3 Ownership, §5 Shared resources).
#[derive(Debug, Default)]
pub struct Dictionary {
    en: LanguageDict,
    ko: LanguageDict,
}

/// One row pulled from the `dictionary` table: `(word, language, length, score)`.
pub struct DictionaryRow {
    pub word: String,
    pub language: Language,
    pub length: usize,
    pub score: i64,
}

impl Dictionary {
    pub fn hydrate(rows: Vec<DictionaryRow>) -> Self {
        let mut en_words = Vec::new();
        let mut ko_words = Vec::new();
        let mut dict = Dictionary::default();

        for row in rows {
            let target = match row.language {
                Language::En => &mut dict.en,
                Language::Ko => &mut dict.ko,
            };
            target
                .by_length
                .entry(row.length)
                .or_default()
                .push(row.word.clone());
            let bucket = match row.language {
                Language::En => &mut en_words,
                Language::Ko => &mut ko_words,
            };
            bucket.push(row.word.clone());
            target.words.insert(row.word, (row.length, row.score));
        }

        dict.en.trie = BidirectionalTrie::build(en_words.iter().map(String::as_str));
        dict.ko.trie = BidirectionalTrie::build(ko_words.iter().map(String::as_str));
        dict
    }

    fn lang(&self, language: Language) -> &LanguageDict {
        match language {
            Language::En => &self.en,
            Language::Ko => &self.ko,
        }
    }

    pub fn lookup(&self, word: &str, language: Language) -> LookupResult {
        match self.lang(language).words.get(word) {
            Some(&(length, score)) => LookupResult {
                valid: true,
                length,
                score,
            },
            None => LookupResult {
                valid: false,
                length: word.chars().count(),
                score: 0,
            },
        }
    }

    pub fn has_prefix(&self, prefix: &str, language: Language) -> bool {
        self.lang(language).trie.has_prefix(prefix)
    }

    pub fn has_suffix(&self, suffix: &str, language: Language) -> bool {
        self.lang(language).trie.has_suffix(suffix)
    }

    pub fn has_substring_at_edge(&self, s: &str, language: Language) -> bool {
        self.lang(language).trie.has_substring_at_edge(s)
    }

    /// Draws uniformly from words matching the length constraint; `None`
    /// (treated by callers as "no candidate") if nothing matches.
    pub fn random_word(
        &self,
        min_len: Option<usize>,
        max_len: Option<usize>,
        exact_len: Option<usize>,
        language: Language,
    ) -> Option<String> {
        let dict = self.lang(language);
        let candidates: Vec<&String> = if let Some(exact) = exact_len {
            dict.by_length.get(&exact).into_iter().flatten().collect()
        } else {
            let lo = min_len.unwrap_or(0);
            let hi = max_len.unwrap_or(usize::MAX);
            dict.by_length
                .iter()
                .filter(|(&len, _)| len >= lo && len <= hi)
                .flat_map(|(_, words)| words.iter())
                .collect()
        };
        if candidates.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..candidates.len());
        Some(candidates[idx].clone())
    }

    pub fn word_count(&self, language: Language) -> usize {
        self.lang(language).words.len()
    }
}
