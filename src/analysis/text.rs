const CHARS_PER_TOKEN: usize = 4;
const CHARS_PER_PAGE: usize = 3000;
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub page: usize,
}

pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut total = 0usize;

    for (position, ch) in text.chars().enumerate() {
        current.push(ch);
        current_len += 1;
        total = position + 1;

        if current_len >= chunk_size && matches!(ch, '.' | '!' | '?') {
            push_chunk(&mut chunks, &current, position / CHARS_PER_PAGE + 1);
            current.clear();
            current_len = 0;
        }
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, &current, total / CHARS_PER_PAGE + 1);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<TextChunk>, raw: &str, page: usize) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    chunks.push(TextChunk {
        index: chunks.len(),
        text: trimmed.to_string(),
        page,
    });
}

pub fn truncate_for_prompt(text: &str, max_tokens: usize) -> String {
    let limit = max_tokens * CHARS_PER_TOKEN;
    match text.char_indices().nth(limit) {
        Some((byte_offset, _)) => format!("{}...", &text[..byte_offset]),
        None => text.to_string(),
    }
}

pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
