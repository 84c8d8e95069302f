use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading regex"));
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*+]|\d+\.)\s+(.+)$").expect("list regex"));
static SENTENCE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?](\s+)").expect("sentence end regex"));

pub const DEFAULT_MAX_TOKENS: usize = 800;
pub const DEFAULT_TOKENIZER_MODEL: &str = "gpt-3.5-turbo";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Heading,
    Paragraph,
    List,
    Quote,
    Code,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub kind: ChunkKind,
    /// Heading level; zero for everything else.
    pub level: u8,
    /// Whitespace that separated this chunk from the previous one inside the same source chunk.
    /// Empty when the chunk starts a new structural unit.
    pub lead: String,
}

impl TextChunk {
    pub fn new(content: String, kind: ChunkKind, level: u8) -> Self {
        Self {
            content,
            kind,
            level,
            lead: String::new(),
        }
    }

    fn continuing(content: String, kind: ChunkKind, level: u8, lead: &str) -> Self {
        Self {
            lead: lead.to_string(),
            ..Self::new(content, kind, level)
        }
    }

    /// True for the tail pieces of a sentence-split chunk.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        !self.lead.is_empty()
    }

    /// Separator to put before this chunk when merging: a paragraph break for a fresh chunk,
    /// otherwise the sentence gap exactly as it was in the source.
    #[must_use]
    pub fn join_separator(&self) -> &str {
        if self.lead.is_empty() {
            "\n\n"
        } else {
            &self.lead
        }
    }
}

pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

/// BPE token counts via `tiktoken-rs`.
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCounter {
    /// Encoding for `model`, or `cl100k_base` when the model name is not recognized.
    pub fn for_model(model: &str) -> anyhow::Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => tiktoken_rs::cl100k_base().context("load cl100k_base encoding")?,
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Offline estimate: one token per ASCII word plus one per non-ASCII character.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut in_word = false;
        for c in text.chars() {
            if c.is_whitespace() {
                in_word = false;
            } else if !c.is_ascii() {
                tokens += 1;
                in_word = false;
            } else if !in_word {
                tokens += 1;
                in_word = true;
            }
        }
        tokens
    }
}

pub struct Chunker {
    max_tokens: usize,
    counter: Box<dyn TokenCounter>,
}

/// Accumulating lines for the structural pass.
struct Pending {
    lines: Vec<String>,
    kind: Option<ChunkKind>,
    level: u8,
}

impl Pending {
    fn flush_into(&mut self, out: &mut Vec<TextChunk>) {
        if self.lines.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.lines).join("\n");
        out.push(TextChunk::new(
            content,
            self.kind.unwrap_or(ChunkKind::Paragraph),
            self.level,
        ));
    }

    /// Flush when the incoming line starts a different kind of chunk.
    fn switch_to(&mut self, kind: ChunkKind, out: &mut Vec<TextChunk>) {
        if self.kind != Some(kind) {
            self.flush_into(out);
            self.kind = Some(kind);
            self.level = 0;
        }
    }
}

impl Chunker {
    pub fn new(max_tokens: usize, counter: Box<dyn TokenCounter>) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            counter,
        }
    }

    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Structural split followed by merge/split normalization.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.normalize(split_by_structure(text))
    }

    /// Greedy left-to-right merge. Oversized chunks are flushed alone and split at sentence
    /// boundaries; code chunks pass through whole and are never merged.
    pub fn normalize(&self, chunks: Vec<TextChunk>) -> Vec<TextChunk> {
        let mut out: Vec<TextChunk> = Vec::new();
        let mut acc: Option<TextChunk> = None;

        for chunk in chunks {
            if chunk.kind == ChunkKind::Code || self.count_tokens(&chunk.content) > self.max_tokens
            {
                out.extend(acc.take());
                out.extend(self.split_large(chunk));
                continue;
            }
            acc = match acc.take() {
                None => Some(chunk),
                Some(mut current) => {
                    let merged = format!("{}\n\n{}", current.content, chunk.content);
                    if self.count_tokens(&merged) <= self.max_tokens {
                        current.content = merged;
                        Some(current)
                    } else {
                        out.push(current);
                        Some(chunk)
                    }
                }
            };
        }
        out.extend(acc);
        out
    }

    /// Sentence-boundary split of one chunk. Sentences keep their original separators; a
    /// sentence that alone exceeds the budget becomes its own chunk.
    fn split_large(&self, chunk: TextChunk) -> Vec<TextChunk> {
        if chunk.kind == ChunkKind::Code || self.count_tokens(&chunk.content) <= self.max_tokens {
            return vec![chunk];
        }
        let mut out = Vec::new();
        let mut current = String::new();
        let mut lead = chunk.lead.clone();
        for (sentence, sep) in split_sentences(&chunk.content) {
            if current.is_empty() {
                current.push_str(sentence);
            } else {
                let candidate = format!("{current}{sep}{sentence}");
                if self.count_tokens(&candidate) > self.max_tokens {
                    let piece = std::mem::take(&mut current);
                    out.push(TextChunk::continuing(piece, chunk.kind, chunk.level, &lead));
                    lead = sep.to_string();
                    current.push_str(sentence);
                } else {
                    current = candidate;
                }
            }
        }
        if !current.is_empty() {
            out.push(TextChunk::continuing(current, chunk.kind, chunk.level, &lead));
        }
        if out.is_empty() {
            return vec![chunk];
        }
        out
    }
}

/// Sentences paired with the whitespace that preceded them (empty for the first).
fn split_sentences(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut sep = "";
    for caps in SENTENCE_END_RE.captures_iter(text) {
        let Some(ws) = caps.get(1) else { continue };
        out.push((&text[start..ws.start()], sep));
        sep = ws.as_str();
        start = ws.end();
    }
    if start < text.len() {
        out.push((&text[start..], sep));
    }
    out
}

/// Group consecutive lines by structural kind. Headings are single-line chunks, code fences
/// are swallowed whole, blank lines pad the open chunk.
pub fn split_by_structure(text: &str) -> Vec<TextChunk> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = Vec::new();
    let mut pending = Pending {
        lines: Vec::new(),
        kind: None,
        level: 0,
    };
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let stripped = line.trim();

        if stripped.starts_with("```") {
            pending.flush_into(&mut out);
            let mut code = vec![line];
            i += 1;
            while i < lines.len() {
                code.push(lines[i]);
                if lines[i].trim().starts_with("```") {
                    break;
                }
                i += 1;
            }
            out.push(TextChunk::new(code.join("\n"), ChunkKind::Code, 0));
            pending.kind = None;
            pending.level = 0;
            i += 1;
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            pending.flush_into(&mut out);
            pending.kind = Some(ChunkKind::Heading);
            pending.level = caps[1].len() as u8;
            pending.lines.push(line.to_string());
        } else if LIST_RE.is_match(line) {
            pending.switch_to(ChunkKind::List, &mut out);
            pending.lines.push(line.to_string());
        } else if line.starts_with('>') {
            pending.switch_to(ChunkKind::Quote, &mut out);
            pending.lines.push(line.to_string());
        } else if stripped.is_empty() {
            if !pending.lines.is_empty() {
                pending.lines.push(line.to_string());
            }
        } else {
            pending.switch_to(ChunkKind::Paragraph, &mut out);
            pending.lines.push(line.to_string());
        }
        i += 1;
    }
    pending.flush_into(&mut out);
    out
}
