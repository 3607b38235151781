//! Sentence segmentation: cuts a running LLM fragment
//! stream into sentence-sized chunks as soon as a boundary is observed,
//! so downstream TTS can start speaking before the full reply has
//! finished generating.

const TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Accumulates LLM fragments and yields
/// complete sentences as they become available. The tail that has not
/// yet reached a terminator is held until either another fragment
/// completes it or [`SentenceAccumulator::finish`] flushes it at end of
/// stream.
#[derive(Debug, Default)]
pub struct SentenceAccumulator {
    emitted_len: usize,
    buffer: String,
}

impl SentenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next (monotonic) accumulated-so-far fragment from the
    /// agent stream and return any newly complete sentences.
    pub fn push(&mut self, accumulated: &str) -> Vec<String> {
        if accumulated.len() <= self.emitted_len {
            return Vec::new();
        }
        let new_text = &accumulated[self.emitted_len..];
        self.buffer.push_str(new_text);
        self.emitted_len = accumulated.len();
        self.drain_complete_sentences()
    }

    fn drain_complete_sentences(&mut self) -> Vec<String> {
        let mut sentences = Vec::new();
        loop {
            let Some(cut) = find_boundary(&self.buffer) else {
                break;
            };
            let sentence = self.buffer[..cut].trim().to_string();
            self.buffer.drain(..cut);
            self.buffer = self.buffer.trim_start().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
        }
        sentences
    }

    /// Flush whatever remains as a final sentence, if non-empty.
    pub fn finish(mut self) -> Option<String> {
        let remainder = self.buffer.trim().to_string();
        self.buffer.clear();
        if remainder.is_empty() {
            None
        } else {
            Some(remainder)
        }
    }
}

/// Find the byte offset just past the earliest sentence-terminating
/// punctuation in `text` (ASCII `.!?` or fullwidth `。！？`), skipping runs
/// of trailing terminators and closing quotes/brackets so `"Really?!"` and
/// `「真的？」` each cut once, not twice.
fn find_boundary(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for (i, c) in text.char_indices() {
        if TERMINATORS.contains(&c) {
            let mut end = i + c.len_utf8();
            while end < bytes.len() {
                let rest = &text[end..];
                let next = rest.chars().next().unwrap();
                if TERMINATORS.contains(&next)
                    || next == '"'
                    || next == '\''
                    || next == ')'
                    || next == '」'
                    || next == '』'
                    || next == '）'
                {
                    end += next.len_utf8();
                } else {
                    break;
                }
            }
            return Some(end);
        }
    }
    None
}
