use quarry_store::Chunk;

/// Sentence-aware text splitter with overlap. Output chunks carry their
/// position within the source file as `sequence_index`.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl TextSplitter {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Split `text` into chunks attributed to `source`. Empty text yields no
    /// chunks.
    #[must_use]
    pub fn split(&self, text: &str, source: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let sentences = split_sentences(text);
        merge_sentences(&sentences, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk::new(content, source, i))
            .collect()
    }
}

/// Break text on paragraph boundaries and sentence endings followed by a
/// space. The trailing remainder is kept as its own sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        let boundary = match (c, chars.peek()) {
            ('\n', Some('\n')) => {
                current.push(chars.next().unwrap_or('\n'));
                true
            }
            ('.' | '?' | '!', Some(' ')) => true,
            _ => false,
        };

        if boundary && !current.trim().is_empty() {
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Merge sentences into chunks bounded by `chunk_size`, carrying up to
/// `chunk_overlap` characters of trailing sentences into the next chunk.
/// A single sentence longer than `chunk_size` becomes its own chunk rather
/// than being cut mid-sentence.
fn merge_sentences(sentences: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut window_start = 0;

    for (idx, sentence) in sentences.iter().enumerate() {
        if !current.is_empty() && current.len() + sentence.len() > chunk_size {
            chunks.push(std::mem::take(&mut current));

            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if overlap_len + sentences[i].len() > chunk_overlap {
                    break;
                }
                overlap_len += sentences[i].len();
                overlap_start = i;
            }
            for s in &sentences[overlap_start..idx] {
                current.push_str(s);
            }
            window_start = overlap_start;
        }

        current.push_str(sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
