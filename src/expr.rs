//! Expression Parser: AST node -> algebraic `Expression`.
//!
//! Each AST node kind the front-end can emit maps to one constructor of
//! `Expression`.

use std::rc::Rc;

use crate::ast::{HoistedSymbols, Node};
use crate::ast::SymbolKind;
use crate::error::CompileError;
use crate::span::Span;
use crate::symbol::SymbolTable;
use crate::value::{Literal, TypeLiteral, ValueKind};

/// Operators recognized by the binary-operator table, unary map, and the
/// increment/decrement and address-of special forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Assign,
    Index,
    Ternary,
    UNot,
    UOnesComplement,
    UIndirection,
    UMinus,
    UPlus,
    UAddrOf,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl Operator {
    /// The binary-operator token table.
    fn from_binary_token(tok: &str) -> Option<Operator> {
        Some(match tok {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Mod,
            "==" => Operator::Eq,
            "!=" => Operator::Neq,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "&&" => Operator::And,
            "||" => Operator::Or,
            "&" => Operator::BitAnd,
            "|" => Operator::BitOr,
            "^" => Operator::BitXor,
            "<<" => Operator::Shl,
            ">>" => Operator::Shr,
            _ => return None,
        })
    }

    /// The small unary operator token map.
    fn from_unary_token(tok: &str) -> Option<Operator> {
        Some(match tok {
            "!" => Operator::UNot,
            "~" => Operator::UOnesComplement,
            "*" => Operator::UIndirection,
            "-" => Operator::UMinus,
            "+" => Operator::UPlus,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::Assign => "=",
            Operator::Index => "[]",
            Operator::Ternary => "?:",
            Operator::UNot => "!",
            Operator::UOnesComplement => "~",
            Operator::UIndirection => "*",
            Operator::UMinus => "-",
            Operator::UPlus => "+",
            Operator::UAddrOf => "&",
            Operator::PreInc => "++_pre",
            Operator::PreDec => "--_pre",
            Operator::PostInc => "_post++",
            Operator::PostDec => "_post--",
        }
    }

    /// Whether this is a relational/equality comparison (used by the ITA
    /// builder's `CMP`/`JMP_E` lowering).
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Neq
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
        )
    }
}

/// An lvalue: a name paired with its (possibly still-inferred) type.
#[derive(Clone, Debug, PartialEq)]
pub struct LValue {
    pub name: String,
    pub ty: TypeLiteral,
}

/// The algebraic expression tree. Children are shared via `Rc` since common
/// sub-expressions may appear in more than one rvalue position after
/// folding; the tree is acyclic.
#[derive(Clone, Debug)]
pub enum Expression {
    Literal(Literal),
    LValue(LValue),
    Unary(Operator, Rc<Expression>),
    Relation(Operator, Vec<Rc<Expression>>),
    Function {
        callee: LValue,
        args: Vec<Rc<Expression>>,
    },
    Symbol {
        lvalue: LValue,
        def: Rc<Expression>,
    },
    Array(Vec<Literal>),
}

impl Expression {
    /// Structural shape tag, used by the expression round-trip invariant
    /// tests.
    pub fn shape(&self) -> &'static str {
        match self {
            Expression::Literal(_) => "literal",
            Expression::LValue(_) => "lvalue",
            Expression::Unary(..) => "unary",
            Expression::Relation(..) => "relation",
            Expression::Function { .. } => "function",
            Expression::Symbol { .. } => "symbol",
            Expression::Array(_) => "array",
        }
    }
}

/// Parses AST nodes into `Expression`s, consulting a local symbol table and
/// the hoisted (top-level) symbol table for identifier resolution.
pub struct ExpressionParser<'a> {
    pub symbols: &'a SymbolTable,
    pub hoisted: &'a HoistedSymbols,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(symbols: &'a SymbolTable, hoisted: &'a HoistedSymbols) -> Self {
        Self { symbols, hoisted }
    }

    pub fn parse(&self, node: &Node) -> Result<Expression, CompileError> {
        match node.node.as_str() {
            "constant_literal" => self.parse_constant_literal(node),
            "integer_literal" => self.parse_int_literal(node),
            "float_literal" => self.parse_float_literal(node),
            "double_literal" => self.parse_double_literal(node),
            "bool_literal" => self.parse_bool_literal(node),
            "string_literal" => self.parse_string_literal(node),
            "lvalue" => self.parse_lvalue(node),
            "vector_lvalue" => self.parse_vector_lvalue(node),
            "indirect_lvalue" => self.parse_indirect_lvalue(node),
            "function_expression" => self.parse_function_expression(node),
            "evaluated_expression" => self.parse_evaluated_expression(node),
            "relation_expression" => self.parse_relation_expression(node),
            "ternary_expression" => self.parse_ternary_expression(node),
            "assignment_expression" => self.parse_assignment_expression(node),
            "pre_inc_dec_expression" => self.parse_pre_inc_dec(node),
            "post_inc_dec_expression" => self.parse_post_inc_dec(node),
            "address_of_expression" => self.parse_address_of(node),
            other => {
                if let Some(op_str) = node.root_str() {
                    if let Some(op) = Operator::from_unary_token(op_str) {
                        return self.parse_generic_unary(node, op);
                    }
                }
                Err(CompileError::parse(
                    format!("unrecognized AST node kind '{}'", other),
                    other,
                )
                .with_span(node.span()))
            }
        }
    }

    fn parse_constant_literal(&self, node: &Node) -> Result<Expression, CompileError> {
        let raw = node.root_str().unwrap_or("");
        let unquoted = raw.trim_matches('\'');
        let literal = match unquoted.chars().next() {
            Some(c) => Literal::char(c),
            None => Literal::null(),
        };
        Ok(Expression::Literal(literal))
    }

    fn parse_int_literal(&self, node: &Node) -> Result<Expression, CompileError> {
        let raw = node.root_str().unwrap_or("0");
        let v: i64 = raw.parse().map_err(|_| {
            CompileError::parse(format!("malformed integer literal '{}'", raw), raw)
                .with_span(node.span())
        })?;
        Ok(Expression::Literal(Literal::int(v)))
    }

    fn parse_float_literal(&self, node: &Node) -> Result<Expression, CompileError> {
        let raw = node.root_str().unwrap_or("0");
        let v: f32 = raw.parse().map_err(|_| {
            CompileError::parse(format!("malformed float literal '{}'", raw), raw)
                .with_span(node.span())
        })?;
        Ok(Expression::Literal(Literal::float(v)))
    }

    fn parse_double_literal(&self, node: &Node) -> Result<Expression, CompileError> {
        let raw = node.root_str().unwrap_or("0");
        let v: f64 = raw.parse().map_err(|_| {
            CompileError::parse(format!("malformed double literal '{}'", raw), raw)
                .with_span(node.span())
        })?;
        Ok(Expression::Literal(Literal::double(v)))
    }

    fn parse_bool_literal(&self, node: &Node) -> Result<Expression, CompileError> {
        let raw = node.root_str().unwrap_or("false");
        Ok(Expression::Literal(Literal::bool(raw == "true" || raw == "1")))
    }

    fn parse_string_literal(&self, node: &Node) -> Result<Expression, CompileError> {
        let raw = node.root_str().unwrap_or("");
        let stripped = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(raw);
        Ok(Expression::Literal(Literal::string(unescape(stripped))))
    }

    fn parse_lvalue(&self, node: &Node) -> Result<Expression, CompileError> {
        let name = node
            .root_str()
            .ok_or_else(|| CompileError::parse("lvalue node missing name", "").with_span(node.span()))?;
        self.resolve_lvalue(name, node.span())
    }

    fn resolve_lvalue(&self, name: &str, span: Span) -> Result<Expression, CompileError> {
        if let Ok(lit) = self.symbols.get_symbol(name) {
            return Ok(Expression::LValue(LValue {
                name: name.to_string(),
                ty: lit.ty,
            }));
        }
        if self.symbols.is_pointer(name) {
            return Ok(Expression::LValue(LValue {
                name: name.to_string(),
                ty: TypeLiteral::Word,
            }));
        }
        match self.hoisted.get(name) {
            Some(entry) if entry.kind == SymbolKind::FunctionDefinition => {
                Ok(Expression::LValue(LValue {
                    name: name.to_string(),
                    ty: TypeLiteral::Word,
                }))
            }
            Some(_) => Ok(Expression::LValue(LValue {
                name: name.to_string(),
                ty: TypeLiteral::Word,
            })),
            None => Err(CompileError::parse(
                "identifier not declared with auto or extrn",
                name,
            )
            .with_span(span)),
        }
    }

    fn parse_vector_lvalue(&self, node: &Node) -> Result<Expression, CompileError> {
        let left = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("vector_lvalue missing base", "").with_span(node.span()))?;
        let base = self.parse(left)?;
        let index = node
            .right
            .as_ref()
            .ok_or_else(|| CompileError::parse("vector_lvalue missing index", "").with_span(node.span()))?;
        let index_expr = self.parse(index)?;
        Ok(Expression::Relation(
            Operator::Index,
            vec![Rc::new(base), Rc::new(index_expr)],
        ))
    }

    fn parse_indirect_lvalue(&self, node: &Node) -> Result<Expression, CompileError> {
        let child = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("indirect_lvalue missing operand", "").with_span(node.span()))?;
        let inner = self.parse(child)?;
        Ok(Expression::Unary(Operator::UIndirection, Rc::new(inner)))
    }

    fn parse_function_expression(&self, node: &Node) -> Result<Expression, CompileError> {
        let left = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("function_expression missing callee", "").with_span(node.span()))?;
        let name = left
            .root_str()
            .ok_or_else(|| CompileError::parse("function callee missing name", "").with_span(left.span()))?;
        let callee = LValue {
            name: name.to_string(),
            ty: TypeLiteral::Word,
        };
        let args = match &node.right {
            None => Vec::new(),
            Some(r) => {
                let list = r.root_list();
                if list.is_empty() {
                    if r.node == "null" || r.root_str() == Some("null") {
                        Vec::new()
                    } else {
                        vec![Rc::new(self.parse(r)?)]
                    }
                } else {
                    list.iter()
                        .map(|n| self.parse(n).map(Rc::new))
                        .collect::<Result<Vec<_>, _>>()?
                }
            }
        };
        Ok(Expression::Function { callee, args })
    }

    fn parse_evaluated_expression(&self, node: &Node) -> Result<Expression, CompileError> {
        let left = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("evaluated_expression missing child", "").with_span(node.span()))?;
        self.parse(left)
    }

    fn parse_relation_expression(&self, node: &Node) -> Result<Expression, CompileError> {
        if let Some(right) = &node.right {
            if right.node == "ternary_expression" {
                return self.parse_ternary_expression(right);
            }
        }
        let op_str = node
            .root_str()
            .ok_or_else(|| CompileError::parse("relation_expression missing operator", "").with_span(node.span()))?;
        let op = Operator::from_binary_token(op_str).ok_or_else(|| {
            CompileError::parse(format!("unknown binary operator '{}'", op_str), op_str)
                .with_span(node.span())
        })?;
        let left = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("relation_expression missing left", "").with_span(node.span()))?;
        let right = node
            .right
            .as_ref()
            .ok_or_else(|| CompileError::parse("relation_expression missing right", "").with_span(node.span()))?;
        let lhs = self.parse(left)?;
        let rhs = self.parse(right)?;
        Ok(Expression::Relation(op, vec![Rc::new(lhs), Rc::new(rhs)]))
    }

    fn parse_ternary_expression(&self, node: &Node) -> Result<Expression, CompileError> {
        let children = node.root_list();
        if children.len() < 3 {
            return Err(CompileError::parse(
                "ternary_expression requires condition, true-branch, false-branch",
                "",
            )
            .with_span(node.span()));
        }
        let cond = self.parse(&children[0])?;
        let true_branch = self.parse(&children[1])?;
        let false_branch = self.parse(&children[2])?;
        Ok(Expression::Relation(
            Operator::Ternary,
            vec![
                Rc::new(cond),
                Rc::new(Expression::Literal(Literal::string("?:"))),
                Rc::new(true_branch),
                Rc::new(false_branch),
            ],
        ))
    }

    fn parse_assignment_expression(&self, node: &Node) -> Result<Expression, CompileError> {
        let left = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("assignment_expression missing target", "").with_span(node.span()))?;
        let right = node
            .right
            .as_ref()
            .ok_or_else(|| CompileError::parse("assignment_expression missing value", "").with_span(node.span()))?;

        if left.node == "assignment_expression" {
            // Pointer-indirection assignment: `*k = 10`.
            let synthesized = Node {
                node: "indirect_lvalue".to_string(),
                root: serde_json::Value::Null,
                left: left.left.clone(),
                right: None,
                left_column: left.left_column,
                line: left.line,
                column: left.column,
                end_column: left.end_column,
            };
            let target = self.parse_indirect_lvalue(&synthesized)?;
            let rhs = self.parse(right)?;
            return Ok(Expression::Relation(
                Operator::Assign,
                vec![Rc::new(target), Rc::new(rhs)],
            ));
        }

        match left.node.as_str() {
            "lvalue" | "vector_lvalue" | "indirect_lvalue" => {}
            _ => {
                return Err(CompileError::parse(
                    "assignment target must be a valid lvalue",
                    left.root_str().unwrap_or(""),
                )
                .with_span(left.span()))
            }
        }
        let target = self.parse(left)?;
        let rhs = self.parse(right)?;
        Ok(Expression::Relation(
            Operator::Assign,
            vec![Rc::new(target), Rc::new(rhs)],
        ))
    }

    fn parse_pre_inc_dec(&self, node: &Node) -> Result<Expression, CompileError> {
        let child = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("pre_inc_dec_expression missing operand", "").with_span(node.span()))?;
        let inner = self.parse(child)?;
        let op = if node.root_str() == Some("--") {
            Operator::PreDec
        } else {
            Operator::PreInc
        };
        Ok(Expression::Unary(op, Rc::new(inner)))
    }

    fn parse_post_inc_dec(&self, node: &Node) -> Result<Expression, CompileError> {
        let child = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("post_inc_dec_expression missing operand", "").with_span(node.span()))?;
        let inner = self.parse(child)?;
        let op = if node.root_str() == Some("--") {
            Operator::PostDec
        } else {
            Operator::PostInc
        };
        Ok(Expression::Unary(op, Rc::new(inner)))
    }

    fn parse_address_of(&self, node: &Node) -> Result<Expression, CompileError> {
        if node.root_str() != Some("&") {
            return Err(CompileError::parse(
                "address_of_expression requires operator '&'",
                node.root_str().unwrap_or(""),
            )
            .with_span(node.span()));
        }
        let child = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("address_of_expression missing operand", "").with_span(node.span()))?;
        let inner = self.parse(child)?;
        Ok(Expression::Unary(Operator::UAddrOf, Rc::new(inner)))
    }

    fn parse_generic_unary(&self, node: &Node, op: Operator) -> Result<Expression, CompileError> {
        let child = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::parse("unary node missing operand", "").with_span(node.span()))?;
        let inner = self.parse(child)?;
        Ok(Expression::Unary(op, Rc::new(inner)))
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
