//! Chunking engine: splits Markdown into semantically coherent
//! chunks, preserving code blocks and tables, and assigns a strategy
//! version to every chunk.

use chrono::Utc;
use lp_domain::{Chunk, ChunkMetadata, ContentType, TokenLevel};
use sha2::{Digest, Sha256};

/// `CHUNK_STRATEGY_VERSION`: bump the minor version for
/// backward-compatible heuristic tweaks, the major version for a change
/// that invalidates previously indexed chunks.
pub const CHUNK_STRATEGY_VERSION: &str = "markdown-v1.0";

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap_size: 200,
        }
    }
}

/// A chunk before embedding: text plus everything about it we know without
/// having called the embedding gateway yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub text: String,
    pub content_type: ContentType,
    pub position: u32,
}

/// One paragraph/block-level unit discovered while walking the document,
/// before size enforcement and min-size coalescing are applied.
#[derive(Debug, Clone)]
struct Block {
    text: String,
    content_type: ContentType,
    /// Code fences and tables are atomic: never split, never size-filtered
    /// away.
    atomic: bool,
}

pub struct ChunkingEngine {
    config: ChunkingConfig,
}

impl ChunkingEngine {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Splits `markdown` into ordered raw chunks. Same input + same engine
    /// config/version always yields the same chunk list.
    pub fn chunk(&self, markdown: &str) -> Vec<RawChunk> {
        let partitions = split_on_top_level_headings(markdown);

        let mut blocks = Vec::new();
        for partition in partitions {
            blocks.extend(preserve_blocks_pass(&partition));
        }

        let blocks = size_enforcement_pass(blocks, &self.config);
        let blocks = min_size_filter(blocks, self.config.min_chunk_size);

        blocks
            .into_iter()
            .enumerate()
            .map(|(i, b)| RawChunk {
                text: b.text,
                content_type: b.content_type,
                position: i as u32,
        })
            .collect()
    }

    /// Attaches the metadata envelope around a raw
    /// chunk's text, given the document/course identity it belongs to.
    pub fn attach_metadata(
        &self,
        raw: &RawChunk,
        course_code: &str,
        chapter_code: &str,
        source_file: &str,
        kb_version: i64,
    ) -> ChunkMetadata {
        let char_count = raw.text.chars().count() as u64;
        let estimated_tokens = char_count.div_ceil(2);
        ChunkMetadata {
            course_code: course_code.to_string(),
            chapter_code: chapter_code.to_string(),
            source_file: source_file.to_string(),
            position: raw.position,
            content_type: raw.content_type,
            char_count,
            estimated_tokens,
            token_level: TokenLevel::from_estimated_tokens(estimated_tokens),
            strategy_version: CHUNK_STRATEGY_VERSION.to_string(),
            indexed_at: Utc::now(),
            kb_version,
            summary_failed: false,
            original_code: None,
            db_course_id: None,
            db_chapter_id: None,
        }
    }

    /// Deterministic chunk id: hash of source_file ⊕ position ⊕ version.
    pub fn chunk_id(source_file: &str, position: u32, version: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_file.as_bytes());
        hasher.update(b"\0");
        hasher.update(position.to_le_bytes());
        hasher.update(b"\0");
        hasher.update(version.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn build_chunk(
        &self,
        raw: &RawChunk,
        embedding: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Chunk {
        Chunk {
            chunk_id: Self::chunk_id(&metadata.source_file, raw.position, &metadata.strategy_version),
            text: raw.text.clone(),
            embedding,
            metadata,
        }
    }
}

/// Step 1: partition at top-level `#` headings. Subordinate headings stay
/// with their parent partition's content.
fn split_on_top_level_headings(markdown: &str) -> Vec<String> {
    let mut partitions = Vec::new();
    let mut current = String::new();

    for line in markdown.lines() {
        let is_top_level_heading = line.starts_with("# ") || line == "#";
        if is_top_level_heading && !current.trim().is_empty() {
            partitions.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        partitions.push(current);
    }
    if partitions.is_empty() {
        partitions.push(markdown.to_string());
    }
    partitions
}

/// Step 2: walk a partition identifying code fences and tables. A short
/// (<200 char) paragraph immediately preceding a fence merges into it and
/// becomes `code_block`.
fn preserve_blocks_pass(partition: &str) -> Vec<Block> {
    const SHORT_PREAMBLE_THRESHOLD: usize = 200;

    let lines: Vec<&str> = partition.lines().collect();
    let mut blocks: Vec<Block> = Vec::new();
    let mut paragraph = String::new();
    let mut i = 0;

    let flush_paragraph = |paragraph: &mut String, blocks: &mut Vec<Block>| {
        let trimmed = paragraph.trim();
        if !trimmed.is_empty() {
            blocks.push(Block {
                    text: trimmed.to_string(),
                    content_type: ContentType::Paragraph,
                    atomic: false,
            });
        }
        paragraph.clear();
    };

    while i < lines.len() {
        let line = lines[i];

        if is_fence_start(line) {
            let fence_marker = fence_marker(line);
            let mut fence_lines = vec![line.to_string()];
            i += 1;
            while i < lines.len() && !is_fence_end(lines[i], &fence_marker) {
                fence_lines.push(lines[i].to_string());
                i += 1;
            }
            if i < lines.len() {
                fence_lines.push(lines[i].to_string());
                i += 1;
            }
            let fence_text = fence_lines.join("\n");

            let preamble = paragraph.trim().to_string();
            if !preamble.is_empty() && preamble.len() < SHORT_PREAMBLE_THRESHOLD {
                paragraph.clear();
                blocks.push(Block {
                        text: format!("{preamble}\n\n{fence_text}"),
                        content_type: ContentType::CodeBlock,
                        atomic: true,
                });
            } else {
                flush_paragraph(&mut paragraph, &mut blocks);
                blocks.push(Block {
                        text: fence_text,
                        content_type: ContentType::CodeBlock,
                        atomic: true,
                });
            }
            continue;
        }

        if is_table_row(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut table_lines = vec![line.to_string()];
            i += 1;
            while i < lines.len() && (is_table_row(lines[i]) || lines[i].trim().is_empty()) {
                if lines[i].trim().is_empty() {
                    break;
                }
                table_lines.push(lines[i].to_string());
                i += 1;
            }
            blocks.push(Block {
                    text: table_lines.join("\n"),
                    content_type: ContentType::Table,
                    atomic: true,
            });
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
        } else {
            paragraph.push_str(line);
            paragraph.push('\n');
        }
        i += 1;
    }
    flush_paragraph(&mut paragraph, &mut blocks);

    blocks
}

fn is_fence_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn fence_marker(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        "```".to_string()
    } else {
        "~~~".to_string()
    }
}

fn is_fence_end(line: &str, marker: &str) -> bool {
    line.trim_start().starts_with(marker)
}

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.ends_with('|') && t.len() > 1
}

/// Step 3: split oversized ordinary paragraph groups at paragraph
/// boundaries with overlap. Atomic blocks pass through untouched even if
/// they exceed `max_chunk_size`.
fn size_enforcement_pass(blocks: Vec<Block>, config: &ChunkingConfig) -> Vec<Block> {
    let mut out = Vec::new();
    for block in blocks {
        if block.atomic || block.text.len() <= config.max_chunk_size {
            out.push(block);
            continue;
        }

        let paragraphs: Vec<&str> = block.text.split("\n\n").collect();
        let mut current = String::new();
        for para in paragraphs {
            if !current.is_empty() && current.len() + para.len() + 2 > config.max_chunk_size {
                out.push(Block {
                        text: current.clone(),
                        content_type: block.content_type,
                        atomic: false,
                });
                let overlap_start = current.len().saturating_sub(config.overlap_size);
                current = current[overlap_start..].to_string();
                current.push_str("\n\n");
                current.push_str(para);
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(para);
            }
        }
        if !current.trim().is_empty() {
            out.push(Block {
                    text: current,
                    content_type: block.content_type,
                    atomic: false,
            });
        }
    }
    out
}

/// Step 4: coalesce undersized non-atomic groups with the next group.
fn min_size_filter(blocks: Vec<Block>, min_chunk_size: usize) -> Vec<Block> {
    let mut out: Vec<Block> = Vec::new();
    for block in blocks {
        if !block.atomic && block.text.len() < min_chunk_size {
            if let Some(last) = out.last_mut() {
                if !last.atomic {
                    last.text.push_str("\n\n");
                    last.text.push_str(&block.text);
                    continue;
                }
            }
            // No suitable predecessor yet: hold it and merge forward once
            // we see the next block.
            out.push(block);
        } else {
            out.push(block);
        }
    }

    // A second forward pass catches undersized trailing groups that had no
    // non-atomic predecessor: merge them into the following group instead.
    let mut merged: Vec<Block> = Vec::new();
    let mut pending: Option<Block> = None;
    for block in out {
        if let Some(mut p) = pending.take() {
            if !p.atomic && p.text.len() < min_chunk_size && !block.atomic {
                p.text.push_str("\n\n");
                p.text.push_str(&block.text);
                pending = Some(p);
                continue;
            } else {
                merged.push(p);
            }
        }
        pending = Some(block);
    }
    if let Some(p) = pending {
        merged.push(p);
    }
    merged
}
