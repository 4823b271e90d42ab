use crate::error::ChunkingError;

/// Separators tried in priority order: paragraph, line, word. When none fits
/// the window the text is cut at the character limit.
pub const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A chunk of text and where it starts (in characters) within the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start: usize,
}

/// Splits normalized text into overlapping windows of at most `max_size` characters
///
/// Every cut lands right after the highest-priority separator found in the
/// window `(start + overlap, start + max_size]`. The following chunk starts
/// `overlap` characters before that cut, so adjacent chunks share exactly
/// `overlap` characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if max_size == 0 {
            return Err(ChunkingError::InvalidChunkSize(
                "max_size must be greater than 0".to_string(),
            ));
        }
        if overlap >= max_size {
            return Err(ChunkingError::InvalidChunkSize(format!(
                "overlap ({}) must be smaller than max_size ({})",
                overlap, max_size
            )));
        }
        Ok(Self { max_size, overlap })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into chunk strings
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_spans(text).into_iter().map(|s| s.text).collect()
    }

    /// Split text into chunks, keeping each chunk's character offset
    pub fn split_spans(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // offsets[i] is the byte offset of character i; the last entry is text.len()
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        if total <= self.max_size {
            return vec![TextSpan {
                text: text.to_string(),
                start: 0,
            }];
        }

        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            if total - start <= self.max_size {
                spans.push(span(text, &offsets, start, total));
                break;
            }

            let cut = self.find_cut(text, &offsets, start);
            spans.push(span(text, &offsets, start, cut));
            start = cut - self.overlap;
        }

        spans
    }

    /// Character position (exclusive) at which the chunk starting at `start` ends
    fn find_cut(&self, text: &str, offsets: &[usize], start: usize) -> usize {
        let window_end = start + self.max_size;
        // Cuts at or before this point would not advance past the overlap
        let min_cut = start + self.overlap;
        let window = &text[offsets[min_cut]..offsets[window_end]];

        for separator in SEPARATORS {
            if let Some(pos) = window.rfind(separator) {
                let cut_byte = offsets[min_cut] + pos + separator.len();
                let cut = char_position(offsets, cut_byte);
                if cut > min_cut {
                    return cut;
                }
            }
        }

        window_end
    }
}

fn span(text: &str, offsets: &[usize], start: usize, end: usize) -> TextSpan {
    TextSpan {
        text: text[offsets[start]..offsets[end]].to_string(),
        start,
    }
}

fn char_position(offsets: &[usize], byte: usize) -> usize {
    // Separators are ASCII, so a cut always lands on a character boundary
    offsets.partition_point(|&o| o < byte)
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
        }
    }
}
