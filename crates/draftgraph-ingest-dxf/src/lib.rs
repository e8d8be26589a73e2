//! DXF text ingestion for Draftgraph
//!
//! Lexes ASCII DXF drawings (alternating group-code / value lines) into the
//! pieces the graph builder consumes:
//! - HEADER: drawing version (`$ACADVER`)
//! - BLOCKS: block definitions with their member entities
//! - ENTITIES: top-level drawing entities
//!
//! Other sections (CLASSES, TABLES, OBJECTS, ...) are skipped. No geometry is
//! interpreted here; every pair is kept verbatim for the builder.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Group code carrying an entity handle.
pub const HANDLE_CODE: i32 = 5;
/// Group code carrying an entity layer.
pub const LAYER_CODE: i32 = 8;
/// Group code carrying a name (block names, INSERT block references).
pub const NAME_CODE: i32 = 2;

#[derive(Debug, Error)]
pub enum DxfError {
    #[error("invalid group code `{text}` at line {line}")]
    InvalidGroupCode { line: usize, text: String },

    #[error("group code at line {line} has no value line")]
    Truncated { line: usize },

    #[error("expected a section name after SECTION at line {line}, found group code {code}")]
    MissingSectionName { line: usize, code: i32 },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Parsed records
// ============================================================================

/// One group code / value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DxfPair {
    pub code: i32,
    pub value: String,
}

impl DxfPair {
    pub fn new(code: i32, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }
}

/// A drawing entity (LINE, CIRCLE, INSERT, DIMENSION, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DxfEntity {
    pub entity_type: String,
    pub handle: String,
    pub layer: String,
    /// Every pair of the entity in file order, including handle and layer.
    pub data: Vec<DxfPair>,
}

impl DxfEntity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Self::default()
        }
    }

    /// Append a pair, keeping `handle`/`layer` in sync with codes 5 and 8.
    pub fn push(&mut self, pair: DxfPair) {
        match pair.code {
            HANDLE_CODE => self.handle = pair.value.clone(),
            LAYER_CODE => self.layer = pair.value.clone(),
            _ => {}
        }
        self.data.push(pair);
    }

    /// First value stored under `code`.
    pub fn string(&self, code: i32) -> Option<&str> {
        self.data
            .iter()
            .find(|p| p.code == code)
            .map(|p| p.value.as_str())
    }

    pub fn double(&self, code: i32) -> Option<f64> {
        self.string(code)?.trim().parse().ok()
    }

    pub fn int(&self, code: i32) -> Option<i64> {
        self.string(code)?.trim().parse().ok()
    }
}

/// A block definition from the BLOCKS section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DxfBlock {
    pub name: String,
    pub handle: String,
    pub layer: String,
    /// Pairs of the BLOCK record itself (base point, flags, ...).
    pub header: Vec<DxfPair>,
    pub entities: Vec<DxfEntity>,
}

/// A parsed drawing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DxfFile {
    /// `$ACADVER` value, e.g. `AC1027`. Empty when the header omits it.
    pub version: String,
    pub entities: Vec<DxfEntity>,
    pub blocks: Vec<DxfBlock>,
}

impl DxfFile {
    /// Look up an entity by handle, searching top-level entities first and
    /// then block members.
    pub fn entity_by_handle(&self, handle: &str) -> Option<&DxfEntity> {
        if handle.is_empty() {
            return None;
        }
        self.entities
            .iter()
            .chain(self.blocks.iter().flat_map(|b| b.entities.iter()))
            .find(|e| e.handle == handle)
    }

    pub fn block_by_name(&self, name: &str) -> Option<&DxfBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone)]
struct Located {
    /// 1-based line of the group code.
    line: usize,
    pair: DxfPair,
}

fn lex_pairs(text: &str) -> Result<Vec<Located>, DxfError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut pairs = Vec::with_capacity(lines.len() / 2);
    let mut i = 0;

    while i < lines.len() {
        let code_text = lines[i].trim();
        if code_text.is_empty() && lines[i..].iter().all(|l| l.trim().is_empty()) {
            break;
        }

        let code: i32 = code_text.parse().map_err(|_| DxfError::InvalidGroupCode {
            line: i + 1,
            text: code_text.to_string(),
        })?;
        let Some(value) = lines.get(i + 1) else {
            return Err(DxfError::Truncated { line: i + 1 });
        };

        pairs.push(Located {
            line: i + 1,
            pair: DxfPair::new(code, value.trim()),
        });
        i += 2;
    }

    Ok(pairs)
}

struct Cursor<'a> {
    pairs: &'a [Located],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Located> {
        self.pairs.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Located> {
        let item = self.pairs.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    fn at_marker(&self, marker: &str) -> bool {
        self.peek()
            .is_some_and(|l| l.pair.code == 0 && l.pair.value == marker)
    }

    /// Consume pairs up to (not including) the next group code 0.
    fn take_until_code0(&mut self) -> Vec<DxfPair> {
        let mut out = Vec::new();
        while let Some(l) = self.peek() {
            if l.pair.code == 0 {
                break;
            }
            out.push(l.pair.clone());
            self.pos += 1;
        }
        out
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Parse a DXF drawing from raw bytes. Non-UTF-8 bytes are decoded lossily.
pub fn parse_dxf(input: &[u8]) -> Result<DxfFile, DxfError> {
    let text = String::from_utf8_lossy(input);
    let pairs = lex_pairs(&text)?;
    let mut cursor = Cursor {
        pairs: &pairs,
        pos: 0,
    };
    let mut file = DxfFile::default();

    while let Some(item) = cursor.next() {
        if item.pair.code != 0 {
            continue;
        }
        match item.pair.value.as_str() {
            "EOF" => break,
            "SECTION" => {
                let Some(name) = cursor.next() else {
                    return Err(DxfError::Truncated { line: item.line });
                };
                if name.pair.code != NAME_CODE {
                    return Err(DxfError::MissingSectionName {
                        line: name.line,
                        code: name.pair.code,
                    });
                }
                match name.pair.value.as_str() {
                    "HEADER" => parse_header(&mut cursor, &mut file),
                    "BLOCKS" => parse_blocks(&mut cursor, &mut file),
                    "ENTITIES" => parse_entities(&mut cursor, &mut file),
                    _ => skip_section(&mut cursor),
                }
            }
            _ => {}
        }
    }

    tracing::debug!(
        version = %file.version,
        entities = file.entities.len(),
        blocks = file.blocks.len(),
        "parsed DXF drawing"
    );
    Ok(file)
}

/// Read and parse a DXF file from disk.
pub fn parse_dxf_file(path: impl AsRef<Path>) -> Result<DxfFile, DxfError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| DxfError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dxf(&bytes)
}

fn skip_section(cursor: &mut Cursor<'_>) {
    while let Some(item) = cursor.next() {
        if item.pair.code == 0 && item.pair.value == "ENDSEC" {
            break;
        }
    }
}

fn parse_header(cursor: &mut Cursor<'_>, file: &mut DxfFile) {
    while let Some(item) = cursor.next() {
        let pair = &item.pair;
        if pair.code == 0 && pair.value == "ENDSEC" {
            break;
        }
        if pair.code == 9 && pair.value == "$ACADVER" {
            if let Some(version) = cursor.peek() {
                if version.pair.code != 9 && version.pair.code != 0 {
                    file.version = version.pair.value.clone();
                    cursor.pos += 1;
                }
            }
        }
    }
}

fn parse_entity(cursor: &mut Cursor<'_>, entity_type: &str) -> DxfEntity {
    let mut entity = DxfEntity::new(entity_type);
    for pair in cursor.take_until_code0() {
        entity.push(pair);
    }
    entity
}

fn parse_entities(cursor: &mut Cursor<'_>, file: &mut DxfFile) {
    while let Some(item) = cursor.next() {
        let pair = &item.pair;
        if pair.code != 0 {
            continue;
        }
        if pair.value == "ENDSEC" || pair.value == "EOF" {
            break;
        }
        file.entities.push(parse_entity(cursor, &pair.value));
    }
}

fn parse_blocks(cursor: &mut Cursor<'_>, file: &mut DxfFile) {
    while let Some(item) = cursor.next() {
        let pair = &item.pair;
        if pair.code != 0 {
            continue;
        }
        match pair.value.as_str() {
            "ENDSEC" | "EOF" => break,
            "BLOCK" => {
                let block = parse_block(cursor);
                if block.name.is_empty() {
                    tracing::warn!(line = item.line, "BLOCK record without a name");
                }
                file.blocks.push(block);
            }
            _ => {}
        }
    }
}

fn parse_block(cursor: &mut Cursor<'_>) -> DxfBlock {
    let mut block = DxfBlock::default();

    for pair in cursor.take_until_code0() {
        match pair.code {
            NAME_CODE => block.name = pair.value.clone(),
            HANDLE_CODE => block.handle = pair.value.clone(),
            LAYER_CODE => block.layer = pair.value.clone(),
            _ => {}
        }
        block.header.push(pair);
    }

    while let Some(item) = cursor.peek() {
        // A truncated BLOCKS section: leave ENDSEC for the caller.
        if cursor.at_marker("ENDSEC") || cursor.at_marker("EOF") {
            break;
        }
        cursor.pos += 1;
        if item.pair.value == "ENDBLK" {
            // ENDBLK carries its own handle/layer pairs; they belong to no entity.
            cursor.take_until_code0();
            break;
        }
        block
            .entities
            .push(parse_entity(cursor, &item.pair.value));
    }

    block
}
