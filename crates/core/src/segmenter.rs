const UNIT_TERMINATORS: [char; 4] = ['.', '?', '!', '\n'];

/// Splits streamed model text into speakable units.
///
/// A unit is released when the buffered text ends on sentence punctuation or
/// a newline and holds more than `min_len` characters once trimmed; shorter
/// fragments wait for the next chunk.
#[derive(Debug)]
pub struct UnitSegmenter {
    buffer: String,
    min_len: usize,
}

impl UnitSegmenter {
    pub fn new(min_len: usize) -> Self {
        Self {
            buffer: String::new(),
            min_len,
        }
    }

    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.buffer.push_str(chunk);
        let ready = self.buffer.ends_with(UNIT_TERMINATORS)
            && self.buffer.trim().chars().count() > self.min_len;
        if !ready {
            return None;
        }
        let unit = self.buffer.trim().to_string();
        self.buffer.clear();
        Some(unit)
    }

    /// Whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.buffer.trim().to_string();
        self.buffer.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(chunks: &[&str]) -> Vec<String> {
        let mut segmenter = UnitSegmenter::new(5);
        let mut units: Vec<String> = chunks.iter().filter_map(|c| segmenter.push(c)).collect();
        units.extend(segmenter.finish());
        units
    }

    #[test]
    fn splits_on_sentence_punctuation() {
        let units = segment(&["We have two", " rooms.", " The lounge", " is nicer!", " Want it?"]);
        assert_eq!(units, vec!["We have two rooms.", "The lounge is nicer!", "Want it?"]);
    }

    #[test]
    fn short_fragments_are_held_for_the_next_chunk() {
        let units = segment(&["Yes.", " I can help with that.\n"]);
        assert_eq!(units, vec!["Yes. I can help with that."]);
    }

    #[test]
    fn punctuation_inside_a_chunk_does_not_split() {
        let units = segment(&["Rooms cost 5600. Breakfast", " is included"]);
        assert_eq!(units, vec!["Rooms cost 5600. Breakfast is included"]);
    }

    #[test]
    fn finish_on_empty_buffer_yields_nothing() {
        let mut segmenter = UnitSegmenter::new(5);
        assert_eq!(segmenter.push("Sure thing."), Some("Sure thing.".to_string()));
        assert_eq!(segmenter.finish(), None);
        assert_eq!(segment(&["  \n"]), Vec::<String>::new());
    }
}
