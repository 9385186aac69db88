//! BXM (binary XML) codec
//!
//! A compact big-endian tree encoding. Nodes are stored in a flat table in
//! breadth-first order so every node's children are contiguous.
//!
//! ```text
//! header      "BXM\0" | "XML\0", u32 flags, u16 node count, u16 data count, u32 string size
//! nodes       u16 child count, u16 first child, u16 attribute count, u16 data index
//! data        u16 name offset, u16 value offset (0xFFFF = absent)
//! strings     NUL-terminated, addressed by offset
//! ```
//!
//! A node's own tag and text live at `data[data_index]`, its attributes at
//! the following `attribute_count` entries.

use std::collections::{HashMap, VecDeque};

use byteorder::BigEndian;
use serde::Serialize;
use tracing::debug;

use crate::cursor::{ByteReader, ByteWriter};
use crate::traits::{
    HierarchicalParser, HumanReadable, ParseError, ParseOptions, ParseResult, Parser,
};

pub const BXM_MAGIC: &[u8; 4] = b"BXM\0";
pub const XML_MAGIC: &[u8; 4] = b"XML\0";

const HEADER_SIZE: usize = 16;
const NODE_INFO_SIZE: usize = 8;
const DATA_OFFSET_SIZE: usize = 4;
const NO_STRING: u16 = 0xFFFF;

/// A tagged node with string attributes and ordered children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BxmNode {
    pub tag: String,
    pub text: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<BxmNode>,
}

impl BxmNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: BxmNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First immediate child with `tag`
    pub fn find(&self, tag: &str) -> Option<&BxmNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Every immediate child with `tag`, in document order
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a BxmNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Number of nodes in this subtree, self included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(BxmNode::node_count).sum::<usize>()
    }

    fn write_indented(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, value));
        }
        match (&self.text, self.children.is_empty()) {
            (None, true) => out.push_str("/>\n"),
            (Some(text), true) => out.push_str(&format!(">{}</{}>\n", text, self.tag)),
            (text, false) => {
                out.push_str(">\n");
                if let Some(text) = text {
                    out.push_str(&"  ".repeat(depth + 1));
                    out.push_str(text);
                    out.push('\n');
                }
                for child in &self.children {
                    child.write_indented(depth + 1, out);
                }
                out.push_str(&"  ".repeat(depth));
                out.push_str(&format!("</{}>\n", self.tag));
            }
        }
    }
}

/// A decoded BXM document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BxmDocument {
    pub magic: [u8; 4],
    pub flags: u32,
    pub root: BxmNode,
}

#[derive(Debug, Clone, Copy)]
struct NodeInfo {
    child_count: u16,
    first_child: u16,
    attribute_count: u16,
    data_index: u16,
}

struct Tables<'a> {
    nodes: Vec<NodeInfo>,
    data: Vec<(u16, u16)>,
    strings: &'a [u8],
}

impl Tables<'_> {
    fn string(&self, offset: u16) -> ParseResult<Option<String>> {
        if offset == NO_STRING {
            return Ok(None);
        }
        let start = offset as usize;
        if start >= self.strings.len() {
            return Err(malformed(format!("string offset {} past table of {} bytes", start, self.strings.len())));
        }
        let mut reader = ByteReader::<BigEndian>::new(&self.strings[start..]);
        reader.read_null_terminated_string().map(Some)
    }

    fn data(&self, index: usize) -> ParseResult<(u16, u16)> {
        self.data
            .get(index)
            .copied()
            .ok_or_else(|| malformed(format!("data index {} out of {}", index, self.data.len())))
    }

    /// Build the subtree at `index`. `claimed` marks nodes already placed, so
    /// a node table that shares children between parents is rejected instead
    /// of being expanded as a graph.
    fn build(&self, index: usize, depth: u32, max_depth: u32, claimed: &mut [bool]) -> ParseResult<BxmNode> {
        if depth > max_depth {
            return Err(malformed(format!("nesting deeper than {}", max_depth)));
        }
        let info = self
            .nodes
            .get(index)
            .copied()
            .ok_or_else(|| malformed(format!("node index {} out of {}", index, self.nodes.len())))?;
        if std::mem::replace(&mut claimed[index], true) {
            return Err(malformed(format!("node {} has more than one parent", index)));
        }

        let (name, value) = self.data(info.data_index as usize)?;
        let mut node = BxmNode {
            tag: self.string(name)?.unwrap_or_default(),
            text: self.string(value)?,
            attributes: Vec::with_capacity(info.attribute_count as usize),
            children: Vec::with_capacity(info.child_count as usize),
        };
        for a in 0..info.attribute_count as usize {
            let (name, value) = self.data(info.data_index as usize + 1 + a)?;
            node.attributes.push((
                self.string(name)?.unwrap_or_default(),
                self.string(value)?.unwrap_or_default(),
            ));
        }
        for c in 0..info.child_count as usize {
            let child = info.first_child as usize + c;
            if child <= index {
                return Err(malformed(format!("node {} points back to node {}", index, child)));
            }
            node.children.push(self.build(child, depth + 1, max_depth, claimed)?);
        }
        Ok(node)
    }
}

fn malformed(message: impl Into<String>) -> ParseError {
    ParseError::InvalidStructure(format!("BXM: {}", message.into()))
}

impl BxmDocument {
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        Self::decode_with_options(data, &ParseOptions::default())
    }

    /// Decode a document. Every failure, truncation included, is a format error.
    pub fn decode_with_options(data: &[u8], options: &ParseOptions) -> ParseResult<Self> {
        let found = data.get(..4).unwrap_or(data);
        if found != BXM_MAGIC && found != XML_MAGIC {
            return Err(ParseError::InvalidMagic {
                format: "BXM",
                expected: BXM_MAGIC.to_vec(),
                found: found.to_vec(),
            });
        }

        Self::decode_body(data, options).map_err(|e| match e {
            ParseError::Truncated { offset, .. } => malformed(format!("stream ends early at offset {}", offset)),
            other => other,
        })
    }

    fn decode_body(data: &[u8], options: &ParseOptions) -> ParseResult<Self> {
        let mut reader = ByteReader::<BigEndian>::new(data);
        let magic = reader.read_array::<4>()?;
        let flags = reader.read_u32()?;
        let node_count = reader.read_u16()? as usize;
        let data_count = reader.read_u16()? as usize;
        let data_size = reader.read_u32()? as usize;

        if node_count == 0 {
            return Err(malformed("document has no nodes"));
        }

        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            nodes.push(NodeInfo {
                child_count: reader.read_u16()?,
                first_child: reader.read_u16()?,
                attribute_count: reader.read_u16()?,
                data_index: reader.read_u16()?,
            });
        }
        let mut offsets = Vec::with_capacity(data_count);
        for _ in 0..data_count {
            offsets.push((reader.read_u16()?, reader.read_u16()?));
        }
        let strings = reader.read_bytes(data_size)?;

        debug!(nodes = node_count, data = data_count, strings = data_size, "BXM tables read");

        let tables = Tables {
            nodes,
            data: offsets,
            strings,
        };
        let mut claimed = vec![false; tables.nodes.len()];
        let root = tables.build(0, 0, options.max_nesting_depth, &mut claimed)?;
        Ok(Self { magic, flags, root })
    }

    /// Encode with a breadth-first node table and a deduplicated string pool
    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        let mut order: Vec<&BxmNode> = Vec::new();
        let mut first_child: Vec<usize> = Vec::new();
        let mut queue = VecDeque::from([&self.root]);
        let mut next_index = 1;
        while let Some(node) = queue.pop_front() {
            order.push(node);
            first_child.push(next_index);
            next_index += node.children.len();
            queue.extend(node.children.iter());
        }

        let mut pool = StringPool::default();
        let mut data: Vec<(u16, u16)> = Vec::new();
        let mut infos = Vec::with_capacity(order.len());
        for (i, node) in order.iter().enumerate() {
            let data_index = to_u16(data.len(), "data entries")?;
            data.push((pool.intern(&node.tag)?, pool.intern_opt(node.text.as_deref())?));
            for (name, value) in &node.attributes {
                data.push((pool.intern(name)?, pool.intern(value)?));
            }
            infos.push(NodeInfo {
                child_count: to_u16(node.children.len(), "children")?,
                first_child: if node.children.is_empty() { 0 } else { to_u16(first_child[i], "nodes")? },
                attribute_count: to_u16(node.attributes.len(), "attributes")?,
                data_index,
            });
        }

        let size = HEADER_SIZE + infos.len() * NODE_INFO_SIZE + data.len() * DATA_OFFSET_SIZE + pool.bytes.len();
        let mut w = ByteWriter::<BigEndian>::with_capacity(size);
        w.write_bytes(&self.magic);
        w.write_u32(self.flags);
        w.write_u16(to_u16(infos.len(), "nodes")?);
        w.write_u16(to_u16(data.len(), "data entries")?);
        w.write_u32(pool.bytes.len() as u32);
        for info in &infos {
            w.write_u16(info.child_count);
            w.write_u16(info.first_child);
            w.write_u16(info.attribute_count);
            w.write_u16(info.data_index);
        }
        for (name, value) in &data {
            w.write_u16(*name);
            w.write_u16(*value);
        }
        w.write_bytes(&pool.bytes);
        Ok(w.into_inner())
    }
}

impl From<BxmNode> for BxmDocument {
    fn from(root: BxmNode) -> Self {
        Self {
            magic: *BXM_MAGIC,
            flags: 0,
            root,
        }
    }
}

fn to_u16(value: usize, what: &str) -> ParseResult<u16> {
    u16::try_from(value).map_err(|_| malformed(format!("too many {} ({})", what, value)))
}

#[derive(Default)]
struct StringPool {
    bytes: Vec<u8>,
    offsets: HashMap<String, u16>,
}

impl StringPool {
    fn intern(&mut self, text: &str) -> ParseResult<u16> {
        if let Some(&offset) = self.offsets.get(text) {
            return Ok(offset);
        }
        let offset = to_u16(self.bytes.len(), "string bytes")?;
        if offset == NO_STRING {
            return Err(malformed("string pool exceeds 64 KiB"));
        }
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(text.to_string(), offset);
        Ok(offset)
    }

    fn intern_opt(&mut self, text: Option<&str>) -> ParseResult<u16> {
        text.map_or(Ok(NO_STRING), |t| self.intern(t))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BxmParser;

impl BxmParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for BxmParser {
    type Output = BxmDocument;

    fn extensions(&self) -> &[&str] {
        &["bxm", "sop", "gad", "seq"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(BXM_MAGIC)
    }

    fn name(&self) -> &str {
        "BXM Binary XML Parser"
    }

    fn parse_bytes(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        BxmDocument::decode_with_options(data, options)
    }
}

impl HierarchicalParser for BxmParser {
    type Node = BxmNode;

    fn root<'a>(&self, parsed: &'a BxmDocument) -> &'a BxmNode {
        &parsed.root
    }

    fn children<'a>(&self, node: &'a BxmNode) -> Vec<&'a BxmNode> {
        node.children.iter().collect()
    }
}

impl HumanReadable for BxmDocument {
    fn to_readable_string(&self) -> String {
        let mut out = String::new();
        self.root.write_indented(0, &mut out);
        out
    }

    fn to_json(&self) -> serde_json::Value {
        fn node_json(node: &BxmNode) -> serde_json::Value {
            let attributes: serde_json::Map<String, serde_json::Value> = node
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            serde_json::json!({
                "tag": node.tag,
                "text": node.text,
                "attributes": attributes,
                "children": node.children.iter().map(node_json).collect::<Vec<_>>(),
            })
        }
        node_json(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq_tree() -> BxmNode {
        BxmNode::new("SeqRoot").with_child(
            BxmNode::new("AttackTrack")
                .with_child(BxmNode::new("Seq").with_attribute("StartTime", "0.5"))
                .with_child(BxmNode::new("Other"))
                .with_child(BxmNode::new("Seq").with_attribute("StartTime", "1.0")),
        )
    }

    #[test]
    fn test_minimal_tree_roundtrip() {
        let doc = BxmDocument::from(BxmNode::new("Root").with_attribute("Name", "value"));
        let decoded = BxmDocument::decode(&doc.encode().unwrap()).unwrap();
        assert_eq!(decoded.root.tag, "Root");
        assert_eq!(decoded.root.attribute("Name"), Some("value"));
    }

    #[test]
    fn test_nested_tree_preserves_order() {
        let doc = BxmDocument::from(seq_tree());
        let decoded = BxmDocument::decode(&doc.encode().unwrap()).unwrap();
        assert_eq!(decoded, doc);

        let track = decoded.root.find("AttackTrack").unwrap();
        let starts: Vec<_> = track.find_all("Seq").filter_map(|s| s.attribute("StartTime")).collect();
        assert_eq!(starts, vec!["0.5", "1.0"]);
        assert!(decoded.root.find("Seq").is_none());
    }

    #[test]
    fn test_strings_are_shared() {
        let doc = BxmDocument::from(seq_tree());
        let bytes = doc.encode().unwrap();
        let occurrences = bytes.windows(4).filter(|w| w == b"Seq\0").count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let err = BxmDocument::decode(b"BXN\0\0\0\0\0").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_truncated_stream_is_format_error() {
        let bytes = BxmDocument::from(seq_tree()).encode().unwrap();
        let err = BxmDocument::decode(&bytes[..bytes.len() - 6]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_child_cycle_rejected() {
        let mut bytes = BxmDocument::from(seq_tree()).encode().unwrap();
        // Point the second node's first child back at the root
        let second_node = HEADER_SIZE + NODE_INFO_SIZE;
        bytes[second_node + 2..second_node + 4].copy_from_slice(&0u16.to_be_bytes());
        assert!(BxmDocument::decode(&bytes).unwrap_err().is_format_error());
    }

    /// Raw big-endian table where every node is a `"n"` element
    fn raw_table(children: &[(u16, u16)]) -> Vec<u8> {
        let mut bytes = BXM_MAGIC.to_vec();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&(children.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        for &(count, first) in children {
            for field in [count, first, 0, 0] {
                bytes.extend_from_slice(&field.to_be_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&NO_STRING.to_be_bytes());
        bytes.extend_from_slice(b"n\0");
        bytes
    }

    #[test]
    fn test_raw_table_tree_decodes() {
        let doc = BxmDocument::decode(&raw_table(&[(2, 1), (1, 3), (0, 0), (0, 0)])).unwrap();
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(doc.root.children[0].children.len(), 1);
        assert_eq!(doc.root.children[0].children[0].tag, "n");
    }

    #[test]
    fn test_shared_children_rejected() {
        // Node 2 is claimed by both the root and node 1
        let err = BxmDocument::decode(&raw_table(&[(2, 1), (1, 2), (0, 0)])).unwrap_err();
        assert!(err.is_format_error());

        // Overlapping ranges down a chain would otherwise expand exponentially
        let chain: Vec<(u16, u16)> = (0..28u16).map(|i| ((27 - i).min(2), i + 1)).collect();
        let err = BxmDocument::decode(&raw_table(&chain)).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_depth_limit() {
        let mut node = BxmNode::new("leaf");
        for _ in 0..6 {
            node = BxmNode::new("n").with_child(node);
        }
        let bytes = BxmDocument::from(node).encode().unwrap();
        let shallow = ParseOptions {
            max_nesting_depth: 3,
            ..ParseOptions::default()
        };
        assert!(BxmDocument::decode_with_options(&bytes, &shallow).is_err());
        assert!(BxmDocument::decode(&bytes).is_ok());
    }

    #[test]
    fn test_readable_tree() {
        let text = BxmDocument::from(seq_tree()).to_readable_string();
        assert!(text.starts_with("<SeqRoot>\n  <AttackTrack>\n    <Seq StartTime=\"0.5\"/>"));
    }
}
