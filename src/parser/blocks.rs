use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static DELIMITER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s+(/)?wp:([a-z][a-z0-9_-]*/)?([a-z][a-z0-9_-]*)\s+(\{.*\}\s+)?(/)?$").unwrap()
});

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const DEFAULT_NAMESPACE: &str = "core/";

/// One node of a parsed post: either a typed block or a freeform run of markup (`name == None`).
///
/// `inner_content` interleaves markup fragments with `None` placeholders, one per entry of
/// `inner_blocks`, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Block {
    #[serde(rename = "blockName")]
    pub name: Option<String>,
    pub attrs: Map<String, Value>,
    #[serde(rename = "innerBlocks")]
    pub inner_blocks: Vec<Block>,
    #[serde(rename = "innerHTML")]
    pub inner_html: String,
    #[serde(rename = "innerContent")]
    pub inner_content: Vec<Option<String>>,
}

impl Block {
    fn typed(name: String, attrs: Map<String, Value>) -> Self {
        Block {
            name: Some(name),
            attrs,
            inner_blocks: Vec::new(),
            inner_html: String::new(),
            inner_content: Vec::new(),
        }
    }

    fn freeform(html: &str) -> Self {
        Block {
            name: None,
            attrs: Map::new(),
            inner_blocks: Vec::new(),
            inner_html: html.to_string(),
            inner_content: vec![Some(html.to_string())],
        }
    }

    fn push_html(&mut self, html: &str) {
        if html.is_empty() {
            return;
        }
        self.inner_html.push_str(html);
        self.inner_content.push(Some(html.to_string()));
    }

    fn push_child(&mut self, child: Block) {
        self.inner_content.push(None);
        self.inner_blocks.push(child);
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    /// Concatenation of the markup fragments in `inner_content`, skipping placeholders.
    pub fn content_fragments(&self) -> String {
        self.inner_content.iter().flatten().map(String::as_str).collect()
    }
}

// Children are released through an explicit stack; trees may be arbitrarily deep.
impl Drop for Block {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.inner_blocks);
        while let Some(mut block) = pending.pop() {
            pending.append(&mut block.inner_blocks);
        }
    }
}

#[derive(Debug)]
enum Token {
    Opener { name: String, attrs: Map<String, Value> },
    Void { name: String, attrs: Map<String, Value> },
    Closer,
}

#[derive(Debug)]
struct Delimiter {
    token: Token,
    start: usize,
    end: usize,
}

/// Parse post content into its block tree. Never fails: anything that is not a block
/// delimiter is kept as markup.
pub fn parse_blocks(content: &str) -> Vec<Block> {
    let mut output = Vec::new();
    let mut stack: Vec<Block> = Vec::new();
    let mut offset = 0;
    let mut search_from = 0;

    while let Some(delim) = next_delimiter(content, search_from) {
        let leading = &content[offset..delim.start];
        search_from = delim.end;

        match delim.token {
            Token::Void { name, attrs } => {
                let block = Block::typed(name, attrs);
                match stack.last_mut() {
                    Some(parent) => {
                        parent.push_html(leading);
                        parent.push_child(block);
                    }
                    None => {
                        push_freeform(&mut output, leading);
                        output.push(block);
                    }
                }
            }
            Token::Opener { name, attrs } => {
                match stack.last_mut() {
                    Some(parent) => parent.push_html(leading),
                    None => push_freeform(&mut output, leading),
                }
                stack.push(Block::typed(name, attrs));
            }
            Token::Closer => {
                let Some(mut block) = stack.pop() else {
                    // Stray closer: leave it in the pending markup.
                    continue;
                };
                block.push_html(leading);
                match stack.last_mut() {
                    Some(parent) => parent.push_child(block),
                    None => output.push(block),
                }
            }
        }
        offset = delim.end;
    }

    let trailing = &content[offset..];
    if stack.is_empty() {
        push_freeform(&mut output, trailing);
        return output;
    }

    if let Some(top) = stack.last_mut() {
        top.push_html(trailing);
    }
    while let Some(block) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.push_child(block),
            None => output.push(block),
        }
    }
    output
}

fn push_freeform(output: &mut Vec<Block>, html: &str) {
    if !html.is_empty() {
        output.push(Block::freeform(html));
    }
}

/// Find the next block delimiter at or after `from`, skipping ordinary HTML comments.
fn next_delimiter(content: &str, from: usize) -> Option<Delimiter> {
    let mut cursor = from;
    loop {
        let start = cursor + content[cursor..].find(COMMENT_OPEN)?;
        let body_start = start + COMMENT_OPEN.len();
        let body_len = content[body_start..].find(COMMENT_CLOSE)?;
        let body = &content[body_start..body_start + body_len];
        let end = body_start + body_len + COMMENT_CLOSE.len();

        // An unterminated `<!--` leaves the next comment opener inside this body.
        if let Some(inner) = body.find(COMMENT_OPEN) {
            cursor = body_start + inner;
            continue;
        }

        if let Some(token) = classify_delimiter(body) {
            return Some(Delimiter { token, start, end });
        }
        cursor = end;
    }
}

fn classify_delimiter(body: &str) -> Option<Token> {
    let caps = DELIMITER_RE.captures(body)?;
    if caps.get(1).is_some() {
        return Some(Token::Closer);
    }

    let namespace = caps.get(2).map_or(DEFAULT_NAMESPACE, |m| m.as_str());
    let name = format!("{}{}", namespace, &caps[3]);
    let attrs = caps
        .get(4)
        .and_then(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok())
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    if caps.get(5).is_some() {
        Some(Token::Void { name, attrs })
    } else {
        Some(Token::Opener { name, attrs })
    }
}

/// Convert an already-parsed tree (`blockName`/`attrs`/`innerBlocks`/`innerHTML`/`innerContent`
/// objects) into blocks. Anything that is not an array yields no blocks; missing or mistyped
/// fields fall back to their defaults.
pub fn blocks_from_json(value: &Value) -> Vec<Block> {
    match value {
        Value::Array(items) => items.iter().map(block_from_json).collect(),
        _ => Vec::new(),
    }
}

fn block_from_json(value: &Value) -> Block {
    let Value::Object(obj) = value else {
        return Block::default();
    };

    let name = obj
        .get("blockName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let attrs = obj
        .get("attrs")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let inner_blocks = obj.get("innerBlocks").map(blocks_from_json).unwrap_or_default();
    let inner_html = obj
        .get("innerHTML")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let inner_content = obj
        .get("innerContent")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    Block {
        name,
        attrs,
        inner_blocks,
        inner_html,
        inner_content,
    }
}
