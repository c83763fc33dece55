//! Input AST and symbol-table shapes.
//!
//! The lexer/parser front-end is an external collaborator; it hands the
//! core pipeline a JSON-shaped tree and a JSON-shaped symbol table. This
//! module only defines the shapes we deserialize — it performs no parsing
//! of B source itself.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::span::Span;

/// One AST node. `root` may be a scalar (string/number) or an array of
/// child nodes, depending on `node`.
#[derive(Clone, Debug, Deserialize)]
pub struct Node {
    pub node: String,
    #[serde(default)]
    pub root: Json,
    #[serde(default)]
    pub left: Option<Box<Node>>,
    #[serde(default)]
    pub right: Option<Box<Node>>,
    #[serde(default)]
    pub left_column: Option<u32>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub end_column: u32,
}

impl Node {
    pub fn span(&self) -> Span {
        Span::new(self.line, self.column, self.end_column)
    }

    /// `root` as a list of child nodes (e.g. a block's statement list, or
    /// a function call's parameter list).
    pub fn root_list(&self) -> Vec<Node> {
        match &self.root {
            Json::Array(items) => items
                .iter()
                .filter_map(|v| serde_json::from_value::<Node>(v.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `root` as a single string, e.g. an identifier or operator token.
    pub fn root_str(&self) -> Option<&str> {
        self.root.as_str()
    }
}

/// One entry of the input symbol table: identifier -> declaration kind
/// plus source coordinates.
#[derive(Clone, Debug, Deserialize)]
pub struct SymbolEntry {
    #[serde(rename = "type")]
    pub kind: SymbolKind,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub end_column: u32,
    /// Optional signature fields for `function_definition` entries
    /// (parameter count, variadic flag). Stored as raw JSON since the
    /// front-end's signature shape is not otherwise specified.
    #[serde(flatten)]
    pub extra: HashMap<String, Json>,
}

impl SymbolEntry {
    pub fn span(&self) -> Span {
        Span::new(self.line, self.column, self.end_column)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    FunctionDefinition,
    VectorDefinition,
    Auto,
    Extrn,
}

/// The hoisted top-level symbol table the front-end collects before any
/// emission pass runs.
pub type HoistedSymbols = HashMap<String, SymbolEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_node() {
        let json = r#"{"node":"integer_literal","root":"42","line":1,"column":0,"end_column":2}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.node, "integer_literal");
        assert_eq!(node.root_str(), Some("42"));
        assert_eq!(node.span(), Span::new(1, 0, 2));
    }

    #[test]
    fn deserialize_nested_children() {
        let json = r#"{
            "node": "relation_expression",
            "root": "+",
            "left": {"node": "integer_literal", "root": "2", "line": 1, "column": 0, "end_column": 1},
            "right": {"node": "integer_literal", "root": "3", "line": 1, "column": 4, "end_column": 5},
            "line": 1, "column": 0, "end_column": 5
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert!(node.left.is_some());
        assert!(node.right.is_some());
    }

    #[test]
    fn deserialize_symbol_table() {
        let json = r#"{
            "main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4},
            "v": {"type": "vector_definition", "line": 5, "column": 0, "end_column": 1}
        }"#;
        let symbols: HoistedSymbols = serde_json::from_str(json).unwrap();
        assert_eq!(symbols["main"].kind, SymbolKind::FunctionDefinition);
        assert_eq!(symbols["v"].kind, SymbolKind::VectorDefinition);
    }

    #[test]
    fn root_list_from_array() {
        let json = r#"{
            "node": "statement",
            "root": [
                {"node": "integer_literal", "root": "1", "line": 1, "column": 0, "end_column": 1},
                {"node": "integer_literal", "root": "2", "line": 1, "column": 2, "end_column": 3}
            ],
            "line": 1, "column": 0, "end_column": 3
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.root_list().len(), 2);
    }
}
