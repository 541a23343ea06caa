//! Word and sentence counting for the professional summary.

pub const MIN_WORDS: usize = 40;
pub const MAX_WORDS: usize = 70;
pub const MIN_SENTENCES: usize = 2;
pub const MAX_SENTENCES: usize = 4;

/// Beyond these the summary is trimmed rather than just reported.
pub const CLAMP_WORDS: usize = 80;
pub const CLAMP_SENTENCES: usize = 5;
pub const CLAMP_KEEP_SENTENCES: usize = 3;

/// Splits text at `.`, `!` or `?` followed by whitespace or end of text, so
/// `node.js` and `3.5` do not end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMetrics {
    pub words: usize,
    pub sentences: usize,
}

impl TextMetrics {
    pub fn measure(items: &[String]) -> Self {
        Self {
            words: items.iter().map(|i| i.split_whitespace().count()).sum(),
            sentences: items.iter().map(|i| split_sentences(i).len()).sum(),
        }
    }

    pub fn needs_clamp(&self) -> bool {
        self.words > CLAMP_WORDS || self.sentences > CLAMP_SENTENCES
    }
}

/// Human-readable violations of the 40-70 word / 2-4 sentence target.
pub fn constraint_issues(items: &[String]) -> Vec<String> {
    if items.iter().all(|i| i.trim().is_empty()) {
        return vec!["Summary is empty".to_string()];
    }

    let metrics = TextMetrics::measure(items);
    let mut issues = Vec::new();
    if metrics.words < MIN_WORDS {
        issues.push(format!("Too few words: {} (minimum: {MIN_WORDS})", metrics.words));
    } else if metrics.words > MAX_WORDS {
        issues.push(format!("Too many words: {} (maximum: {MAX_WORDS})", metrics.words));
    }
    if metrics.sentences < MIN_SENTENCES {
        issues.push(format!(
            "Too few sentences: {} (minimum: {MIN_SENTENCES})",
            metrics.sentences
        ));
    } else if metrics.sentences > MAX_SENTENCES {
        issues.push(format!(
            "Too many sentences: {} (maximum: {MAX_SENTENCES})",
            metrics.sentences
        ));
    }
    issues
}

/// Keeps the first `keep` sentences, preserving the item layout: whole items
/// are kept while they fit and the item that crosses the limit is cut.
pub fn keep_first_sentences(items: &[String], keep: usize) -> Vec<String> {
    let mut kept = Vec::new();
    let mut remaining = keep;

    for item in items {
        if remaining == 0 {
            break;
        }
        let sentences = split_sentences(item);
        if sentences.is_empty() {
            continue;
        }
        if sentences.len() <= remaining {
            remaining -= sentences.len();
            kept.push(item.clone());
        } else {
            kept.push(sentences[..remaining].join(" "));
            remaining = 0;
        }
    }
    kept
}

/// Keeps whole sentences while the running word count stays within `limit`.
/// A first sentence that is longer than `limit` on its own is cut at the
/// limit and closed with a full stop.
pub fn keep_first_words(items: &[String], limit: usize) -> Vec<String> {
    let mut kept = Vec::new();
    let mut used = 0;

    'items: for item in items {
        let mut sentences = Vec::new();
        for sentence in split_sentences(item) {
            let words = sentence.split_whitespace().count();
            if used + words > limit {
                if used == 0 && sentences.is_empty() {
                    sentences.push(cut_at_words(&sentence, limit));
                }
                if !sentences.is_empty() {
                    kept.push(sentences.join(" "));
                }
                break 'items;
            }
            used += words;
            sentences.push(sentence);
        }
        if !sentences.is_empty() {
            kept.push(sentences.join(" "));
        }
    }
    kept
}

fn cut_at_words(sentence: &str, limit: usize) -> String {
    let cut = sentence
        .split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}.", cut.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

/// Cuts an overlong summary back to its opening sentences, then to the word
/// ceiling if those are still too long.
pub fn clamp_summary(items: &[String]) -> Vec<String> {
    let kept = keep_first_sentences(items, CLAMP_KEEP_SENTENCES);
    if TextMetrics::measure(&kept).words > CLAMP_WORDS {
        keep_first_words(&kept, CLAMP_WORDS)
    } else {
        kept
    }
}
