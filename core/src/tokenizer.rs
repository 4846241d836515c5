use crate::document::Field;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)\d+(?:[.,]\d+)*|\p{L}[\p{L}\p{M}\p{N}_']*").expect("valid regex");
    static ref CHAPTER_NUMBER: Regex = Regex::new(r"^\d+(?:\.\d+)*$").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// A normalized term. `position` counts kept tokens only, so dropped stopwords leave
/// no gap; `surface` is the index of the word it came from in `surface(text)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
    pub surface: u32,
}

/// The single source of truth for what a term is.
///
/// `normalize` must be deterministic. Positions it emits are dense (0, 1, 2, ...) and
/// every `Token::surface` must index into `surface(text)` for the same text so snippets
/// can highlight indexed positions.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str, field: Field) -> Vec<Token>;

    /// Case-preserving words of `text`, used when rendering snippets.
    fn surface(&self, text: &str) -> Vec<String>;
}

/// Diacritics folding, lowercasing, stopword removal and Snowball stemming.
pub struct StemmingNormalizer {
    stemmer: Stemmer,
}

impl StemmingNormalizer {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { stemmer: Stemmer::create(algorithm) }
    }

    fn fold(word: &str) -> String {
        word.nfd().filter(|c| !is_combining_mark(*c)).collect::<String>().to_lowercase()
    }
}

impl Default for StemmingNormalizer {
    fn default() -> Self { Self::new(Algorithm::English) }
}

impl Normalizer for StemmingNormalizer {
    fn normalize(&self, text: &str, field: Field) -> Vec<Token> {
        let mut tokens = Vec::new();
        for (surface, mat) in WORD.find_iter(text).enumerate() {
            let word = Self::fold(mat.as_str());
            if STOPWORDS.contains(word.as_str()) { continue; }
            if field == Field::TableOfContents && CHAPTER_NUMBER.is_match(&word) { continue; }
            let term = self.stemmer.stem(&word).into_owned();
            let position = tokens.len() as u32;
            tokens.push(Token { term, position, surface: surface as u32 });
        }
        tokens
    }

    fn surface(&self, text: &str) -> Vec<String> {
        WORD.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }
}

/// Lowercased whitespace-separated words; nothing is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceNormalizer;

impl Normalizer for WhitespaceNormalizer {
    fn normalize(&self, text: &str, _field: Field) -> Vec<Token> {
        text.split_whitespace()
            .enumerate()
            .map(|(pos, word)| Token { term: word.to_lowercase(), position: pos as u32, surface: pos as u32 })
            .collect()
    }

    fn surface(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}
