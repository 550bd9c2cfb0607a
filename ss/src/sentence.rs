//! Sentence/word document model (spec §3, §4.8 step 1). A file's bytes are
//! parsed as a sequence of sentences, each a non-empty sequence of
//! whitespace-delimited words; a sentence ends at `.`, `!`, or `?`
//! (the terminator stays attached to the last word, the way it appears in
//! the running text). Sentences and words are 1-indexed throughout the
//! rest of the Storage Server.

use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum SentenceError {
    #[error("word index out of range")]
    InvalidWordIndex,
    #[error("edit produced no words")]
    EmptyEdit,
}

/// One sentence: an ordered list of raw whitespace-delimited tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub words: Vec<String>,
}

impl Sentence {
    pub fn parse(text: &str) -> Self {
        Self { words: text.split_whitespace().map(str::to_string).collect() }
    }

    pub fn render(&self) -> String {
        self.words.join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Applies one `<word_index> <content>` edit (spec §4.8 step 4).
    /// `word_index` in `1..=M` replaces that word (and may expand it into
    /// several words if `content` itself has whitespace); `M+1` appends.
    pub fn apply_word_edit(&mut self, word_index: usize, content: &str) -> Result<(), SentenceError> {
        let m = self.words.len();
        if word_index == 0 || word_index > m + 1 {
            return Err(SentenceError::InvalidWordIndex);
        }
        let new_words: Vec<String> = content.split_whitespace().map(str::to_string).collect();
        if new_words.is_empty() {
            return Err(SentenceError::EmptyEdit);
        }
        if word_index == m + 1 {
            self.words.extend(new_words);
        } else {
            let idx = word_index - 1;
            self.words.splice(idx..=idx, new_words);
        }
        Ok(())
    }
}

/// A file's full parsed content: an ordered list of sentences.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub sentences: Vec<Sentence>,
}

impl Document {
    /// Splits `content` into sentences at `.`, `!`, `?`, keeping the
    /// terminator as the tail of the sentence's last word. A trailing
    /// fragment with no terminator (should not normally reach disk, but
    /// tolerated defensively) becomes one final sentence.
    pub fn parse(content: &str) -> Self {
        let mut sentences = Vec::new();
        let mut buf = String::new();
        for ch in content.chars() {
            buf.push(ch);
            if matches!(ch, '.' | '!' | '?') {
                let trimmed = buf.trim();
                if !trimmed.is_empty() {
                    sentences.push(Sentence::parse(trimmed));
                }
                buf.clear();
            }
        }
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            sentences.push(Sentence::parse(trimmed));
        }
        Self { sentences }
    }

    pub fn render(&self) -> String {
        self.sentences.iter().map(Sentence::render).collect::<Vec<_>>().join(" ")
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    pub fn word_count(&self) -> usize {
        self.sentences.iter().map(Sentence::word_count).sum()
    }

    pub fn char_count(&self) -> usize {
        self.render().chars().count()
    }

    /// `true` for any 1-based index up to and including "append a new
    /// sentence" (spec §8: "WRITE to sentence N+1 appends ... N+2 fails").
    pub fn sentence_index_valid(&self, index: usize) -> bool {
        index >= 1 && index <= self.sentences.len() + 1
    }

    /// The in-memory working copy a WRITE session edits: the existing
    /// sentence at `index`, or an empty one if `index` is one past the end.
    pub fn working_copy(&self, index: usize) -> Sentence {
        self.sentences.get(index - 1).cloned().unwrap_or_default()
    }

    /// Commits an edited sentence back into the document, either replacing
    /// an existing one or appending a new one.
    pub fn commit_sentence(&mut self, index: usize, sentence: Sentence) {
        if index <= self.sentences.len() {
            self.sentences[index - 1] = sentence;
        } else {
            self.sentences.push(sentence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_sentences_keeping_terminators() {
        let doc = Document::parse("Hello world. Second one! Third?");
        assert_eq!(doc.sentence_count(), 3);
        assert_eq!(doc.sentences[0].render(), "Hello world.");
        assert_eq!(doc.sentences[1].render(), "Second one!");
        assert_eq!(doc.sentences[2].render(), "Third?");
    }

    #[test]
    fn render_round_trips_parse() {
        let original = "Hello world. Second one!";
        let doc = Document::parse(original);
        assert_eq!(doc.render(), original);
    }

    #[test]
    fn word_edit_replaces_and_expands() {
        let mut s = Sentence::parse("Hello world.");
        s.apply_word_edit(2, "brave new world.").unwrap();
        assert_eq!(s.render(), "Hello brave new world.");
    }

    #[test]
    fn word_edit_appends_at_m_plus_1() {
        let mut s = Sentence::parse("Hello world.");
        s.apply_word_edit(3, "today.").unwrap();
        assert_eq!(s.render(), "Hello world. today.");
    }

    #[test]
    fn word_edit_rejects_zero_and_m_plus_2() {
        let mut s = Sentence::parse("Hello world.");
        assert_eq!(s.apply_word_edit(0, "x"), Err(SentenceError::InvalidWordIndex));
        assert_eq!(s.apply_word_edit(4, "x"), Err(SentenceError::InvalidWordIndex));
    }

    #[test]
    fn sentence_n_plus_1_is_a_valid_append_target() {
        let doc = Document::parse("Hello world.");
        assert!(doc.sentence_index_valid(2));
        assert!(!doc.sentence_index_valid(3));
    }

    #[test]
    fn commit_sentence_appends_past_the_end() {
        let mut doc = Document::parse("Hello world.");
        doc.commit_sentence(2, Sentence::parse("New sentence."));
        assert_eq!(doc.render(), "Hello world. New sentence.");
    }
}
