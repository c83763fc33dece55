use crate::ast::{HoistedSymbols, Node};
use crate::error::{CompileError, CompileResult};
use crate::expr::{Expression, ExpressionParser, Operator};
use crate::ita::{make_quadruple, make_temporary, Branch, Instruction, Instructions, Quadruple};
use crate::symbol::SymbolTable;
use crate::value::Literal;

/// Walks hoisted function and vector definitions once, emitting a flat
/// quadruple sequence per definition.
pub struct ItaBuilder<'a> {
    hoisted: &'a HoistedSymbols,
    instructions: Instructions,
    branch: Branch,
    temp_counter: u32,
    label_counter: u32,
    locals: SymbolTable,
}

impl<'a> ItaBuilder<'a> {
    pub fn new(hoisted: &'a HoistedSymbols) -> Self {
        Self {
            hoisted,
            instructions: Instructions::new(),
            branch: Branch::new(),
            temp_counter: 0,
            label_counter: 1,
            locals: SymbolTable::new(),
        }
    }

    pub fn build_program(&mut self, definitions: &[Node]) -> CompileResult<Instructions> {
        for def in definitions {
            match def.node.as_str() {
                "function_definition" => self.build_function_definition(def)?,
                "vector_definition" => self.build_vector_definition(def)?,
                other => {
                    return Err(CompileError::ir(
                        format!("unexpected top-level definition '{}'", other),
                        other,
                    )
                    .with_span(def.span()))
                }
            }
        }
        Ok(std::mem::take(&mut self.instructions))
    }

    fn emit(&mut self, q: Quadruple) {
        self.instructions.push(q);
    }

    fn fresh_temp(&mut self) -> String {
        let t = make_temporary(self.temp_counter);
        self.temp_counter += 1;
        t
    }

    fn fresh_label(&mut self) -> String {
        self.label_counter += 1;
        format!("_L{}", self.label_counter)
    }

    fn build_function_definition(&mut self, node: &Node) -> CompileResult<()> {
        let name = node
            .left
            .as_ref()
            .and_then(|n| n.root_str())
            .ok_or_else(|| CompileError::ir("function_definition missing name", "").with_span(node.span()))?
            .to_string();

        self.temp_counter = 0;
        self.label_counter = 1;
        self.locals = SymbolTable::new();
        self.branch = Branch::new();
        self.branch.set_root_branch("_L1");

        // Parameters are carried in `root` as a list of lvalue nodes; seed
        // them as locals before the body is walked.
        let param_names: Vec<String> = node
            .root_list()
            .iter()
            .filter_map(|p| p.root_str().map(|s| s.to_string()))
            .collect();
        for param_name in &param_names {
            self.locals.set_symbol(param_name, Literal::word());
        }

        self.emit(make_quadruple(Instruction::FuncStart, name.clone(), "", ""));
        for param_name in &param_names {
            self.emit(make_quadruple(Instruction::Locl, param_name.clone(), "param", ""));
        }

        if let Some(body) = &node.right {
            self.build_block(body)?;
        }

        self.emit(make_quadruple(Instruction::Label, "_L1", "", ""));
        self.emit(make_quadruple(Instruction::Leave, "", "", ""));
        self.emit(make_quadruple(Instruction::FuncEnd, name, "", ""));
        Ok(())
    }

    fn build_vector_definition(&mut self, node: &Node) -> CompileResult<()> {
        let name = node
            .left
            .as_ref()
            .and_then(|n| n.root_str())
            .ok_or_else(|| CompileError::ir("vector_definition missing name", "").with_span(node.span()))?
            .to_string();
        self.emit(make_quadruple(Instruction::Globl, name.clone(), "", ""));

        if let Some(initializers) = &node.right {
            let parser = ExpressionParser::new(&self.locals, self.hoisted);
            for (index, element) in initializers.root_list().iter().enumerate() {
                let value = parser.parse(element)?;
                let operand = self.lower_expression(&value)?;
                self.emit(make_quadruple(
                    Instruction::Mov,
                    format!("{}[{}]", name, index),
                    operand,
                    "",
                ));
            }
        }
        Ok(())
    }

    fn build_block(&mut self, node: &Node) -> CompileResult<()> {
        for stmt in node.root_list() {
            self.build_statement(&stmt)?;
        }
        Ok(())
    }

    fn build_statement(&mut self, node: &Node) -> CompileResult<()> {
        match node.node.as_str() {
            "block_statement" | "block" => self.build_block(node),
            "auto_statement" => self.build_auto_statement(node),
            "extrn_statement" => self.build_extrn_statement(node),
            "if_statement" => self.build_if_statement(node),
            "while_statement" => self.build_while_statement(node),
            "switch_statement" | "case_statement" => self.build_switch_statement(node),
            "label_statement" => self.build_label_statement(node),
            "goto_statement" => self.build_goto_statement(node),
            "return_statement" => self.build_return_statement(node),
            "rvalue_statement" | "expression_statement" => self.build_rvalue_statement(node),
            other => Err(CompileError::ir(
                format!("unrecognized statement kind '{}'", other),
                other,
            )
            .with_span(node.span())),
        }
    }

    /// A declared name is either a plain `lvalue` (scalar local) or an
    /// `indirect_lvalue` wrapping one (`*p`, a pointer local).
    fn build_auto_statement(&mut self, node: &Node) -> CompileResult<()> {
        for decl in node.root_list() {
            if decl.node == "indirect_lvalue" {
                let inner = decl
                    .left
                    .as_ref()
                    .and_then(|n| n.root_str())
                    .ok_or_else(|| CompileError::ir("auto pointer declaration missing name", "").with_span(decl.span()))?;
                self.locals.set_symbol(inner, Literal::word());
                self.locals.set_pointer(inner, Vec::new());
                self.emit(make_quadruple(Instruction::Locl, inner, "pointer", ""));
            } else if let Some(name) = decl.root_str() {
                self.locals.set_symbol(name, Literal::word());
                self.emit(make_quadruple(Instruction::Locl, name, "", ""));
            }
        }
        Ok(())
    }

    fn build_extrn_statement(&mut self, node: &Node) -> CompileResult<()> {
        for decl in node.root_list() {
            if let Some(name) = decl.root_str() {
                self.emit(make_quadruple(Instruction::Globl, name, "extrn", ""));
            }
        }
        Ok(())
    }

    fn build_if_statement(&mut self, node: &Node) -> CompileResult<()> {
        let cond = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::ir("if_statement missing condition", "").with_span(node.span()))?;
        let body = node
            .right
            .as_ref()
            .ok_or_else(|| CompileError::ir("if_statement missing body", "").with_span(node.span()))?;

        let parser = ExpressionParser::new(&self.locals, self.hoisted);
        let cond_expr = parser.parse(cond)?;
        let cond_operand = self.lower_expression(&cond_expr)?;

        let else_label = self.fresh_label();
        self.branch.push(else_label.clone());
        self.branch.increment_branch_level();

        self.emit(make_quadruple(Instruction::Cmp, cond_operand, "0", ""));
        self.emit(make_quadruple(Instruction::JmpE, else_label.clone(), "", ""));
        self.build_statement(body)?;
        self.emit(make_quadruple(Instruction::Label, else_label, "", ""));

        self.branch.pop();
        self.branch.decrement_branch_level();
        Ok(())
    }

    fn build_while_statement(&mut self, node: &Node) -> CompileResult<()> {
        let cond = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::ir("while_statement missing condition", "").with_span(node.span()))?;
        let body = node
            .right
            .as_ref()
            .ok_or_else(|| CompileError::ir("while_statement missing body", "").with_span(node.span()))?;

        let top_label = self.fresh_label();
        let end_label = self.fresh_label();
        self.branch.push(end_label.clone());
        self.branch.increment_branch_level();

        self.emit(make_quadruple(Instruction::Label, top_label.clone(), "", ""));
        let parser = ExpressionParser::new(&self.locals, self.hoisted);
        let cond_expr = parser.parse(cond)?;
        let cond_operand = self.lower_expression(&cond_expr)?;
        self.emit(make_quadruple(Instruction::Cmp, cond_operand, "0", ""));
        self.emit(make_quadruple(Instruction::JmpE, end_label.clone(), "", ""));
        self.build_statement(body)?;
        self.emit(make_quadruple(Instruction::Goto, top_label, "", ""));
        self.emit(make_quadruple(Instruction::Label, end_label, "", ""));

        self.branch.pop();
        self.branch.decrement_branch_level();
        Ok(())
    }

    fn build_switch_statement(&mut self, node: &Node) -> CompileResult<()> {
        let subject = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::ir("switch_statement missing subject", "").with_span(node.span()))?;
        let parser = ExpressionParser::new(&self.locals, self.hoisted);
        let subject_expr = parser.parse(subject)?;
        let subject_operand = self.lower_expression(&subject_expr)?;

        let end_label = self.fresh_label();
        self.branch.push(end_label.clone());
        self.branch.increment_branch_level();

        for case in node.root_list() {
            let case_value = case
                .left
                .as_ref()
                .and_then(|n| n.root_str())
                .unwrap_or("");
            let next_label = self.fresh_label();
            self.emit(make_quadruple(
                Instruction::Cmp,
                subject_operand.clone(),
                case_value,
                "",
            ));
            self.emit(make_quadruple(Instruction::JmpE, next_label.clone(), "", ""));
            if let Some(body) = &case.right {
                self.build_statement(body)?;
            }
            self.emit(make_quadruple(Instruction::Goto, end_label.clone(), "", ""));
            self.emit(make_quadruple(Instruction::Label, next_label, "", ""));
        }

        self.emit(make_quadruple(Instruction::Label, end_label, "", ""));
        self.branch.pop();
        self.branch.decrement_branch_level();
        Ok(())
    }

    fn build_label_statement(&mut self, node: &Node) -> CompileResult<()> {
        let name = node
            .root_str()
            .ok_or_else(|| CompileError::ir("label_statement missing name", "").with_span(node.span()))?;
        self.emit(make_quadruple(Instruction::Label, name, "", ""));
        Ok(())
    }

    fn build_goto_statement(&mut self, node: &Node) -> CompileResult<()> {
        let name = node
            .root_str()
            .ok_or_else(|| CompileError::ir("goto_statement missing target", "").with_span(node.span()))?;
        self.emit(make_quadruple(Instruction::Goto, name, "", ""));
        Ok(())
    }

    fn build_return_statement(&mut self, node: &Node) -> CompileResult<()> {
        match &node.left {
            Some(expr_node) => {
                let parser = ExpressionParser::new(&self.locals, self.hoisted);
                let expr = parser.parse(expr_node)?;
                let operand = self.lower_expression(&expr)?;
                self.emit(make_quadruple(Instruction::Return, operand, "", ""));
            }
            None => {
                self.emit(make_quadruple(Instruction::Return, "", "", ""));
            }
        }
        let root_label = self
            .branch
            .root_branch()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "_L1".to_string());
        self.emit(make_quadruple(Instruction::Goto, root_label, "", ""));
        Ok(())
    }

    fn build_rvalue_statement(&mut self, node: &Node) -> CompileResult<()> {
        let inner = node
            .left
            .as_ref()
            .ok_or_else(|| CompileError::ir("rvalue_statement missing expression", "").with_span(node.span()))?;
        let parser = ExpressionParser::new(&self.locals, self.hoisted);
        let expr = parser.parse(inner)?;
        self.lower_expression(&expr)?;
        Ok(())
    }

    /// Lower an `Expression` into quadruples, returning the operand string
    /// (a temporary name, an lvalue name, or a literal operand) that holds
    /// its result.
    fn lower_expression(&mut self, expr: &Expression) -> CompileResult<String> {
        match expr {
            Expression::Literal(lit) => Ok(lit.to_operand_string()),
            Expression::LValue(lv) => Ok(lv.name.clone()),
            Expression::Array(_) => Err(CompileError::ir("array literal used as rvalue", "")),
            Expression::Unary(op, inner) => self.lower_unary(*op, inner),
            Expression::Relation(op, children) if *op == Operator::Assign => {
                self.lower_assignment(&children[0], &children[1])
            }
            Expression::Relation(op, children) if *op == Operator::Index => {
                let base = self.lower_expression(&children[0])?;
                let index = self.lower_expression(&children[1])?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), base, index));
                Ok(temp)
            }
            Expression::Relation(op, children) if *op == Operator::Ternary => {
                let cond = self.lower_expression(&children[0])?;
                let else_label = self.fresh_label();
                let end_label = self.fresh_label();
                let result = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Cmp, cond, "0", ""));
                self.emit(make_quadruple(Instruction::JmpE, else_label.clone(), "", ""));
                let true_val = self.lower_expression(&children[2])?;
                self.emit(make_quadruple(Instruction::Mov, result.clone(), true_val, ""));
                self.emit(make_quadruple(Instruction::Goto, end_label.clone(), "", ""));
                self.emit(make_quadruple(Instruction::Label, else_label, "", ""));
                let false_val = self.lower_expression(&children[3])?;
                self.emit(make_quadruple(Instruction::Mov, result.clone(), false_val, ""));
                self.emit(make_quadruple(Instruction::Label, end_label, "", ""));
                Ok(result)
            }
            Expression::Relation(op, children) if op.is_comparison() => {
                let lhs = self.lower_expression(&children[0])?;
                let rhs = self.lower_expression(&children[1])?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Cmp, lhs, rhs, op.as_str()));
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), "_flags", ""));
                Ok(temp)
            }
            Expression::Relation(op, children) => {
                if let (Expression::Literal(a), Expression::Literal(b)) = (children[0].as_ref(), children[1].as_ref()) {
                    if let Some(folded) = a.fold_binary(op.as_str(), b) {
                        return Ok(folded.to_operand_string());
                    }
                }
                let lhs = self.lower_expression(&children[0])?;
                let rhs = self.lower_expression(&children[1])?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), lhs, format!("{} {}", op.as_str(), rhs)));
                Ok(temp)
            }
            Expression::Function { callee, args } => {
                for arg in args.iter().rev() {
                    let value = self.lower_expression(arg)?;
                    self.emit(make_quadruple(Instruction::Push, value, "", ""));
                }
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Call, callee.name.clone(), args.len().to_string(), ""));
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), "_retval", ""));
                Ok(temp)
            }
            Expression::Symbol { lvalue, def } => {
                let value = self.lower_expression(def)?;
                self.emit(make_quadruple(Instruction::Mov, lvalue.name.clone(), value, ""));
                Ok(lvalue.name.clone())
            }
        }
    }

    fn lower_assignment(&mut self, target: &Expression, value: &Expression) -> CompileResult<String> {
        let rhs = self.lower_expression(value)?;
        match target {
            Expression::LValue(lv) => {
                self.emit(make_quadruple(Instruction::Mov, lv.name.clone(), rhs.clone(), ""));
                Ok(lv.name.clone())
            }
            Expression::Unary(Operator::UIndirection, inner) => {
                let addr = self.lower_expression(inner)?;
                self.emit(make_quadruple(Instruction::Mov, format!("*{}", addr), rhs.clone(), ""));
                Ok(rhs)
            }
            Expression::Relation(Operator::Index, children) => {
                let base = self.lower_expression(&children[0])?;
                let index = self.lower_expression(&children[1])?;
                self.emit(make_quadruple(Instruction::Mov, format!("{}[{}]", base, index), rhs.clone(), ""));
                Ok(rhs)
            }
            _ => Err(CompileError::ir("assignment target is not an lvalue", "")),
        }
    }

    fn lower_unary(&mut self, op: Operator, inner: &Expression) -> CompileResult<String> {
        match op {
            Operator::PreInc | Operator::PreDec => {
                let name = self.lower_expression(inner)?;
                let delta = if op == Operator::PreInc { "1" } else { "-1" };
                self.emit(make_quadruple(Instruction::Mov, name.clone(), name.clone(), delta));
                Ok(name)
            }
            Operator::PostInc | Operator::PostDec => {
                let name = self.lower_expression(inner)?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), name.clone(), ""));
                let delta = if op == Operator::PostInc { "1" } else { "-1" };
                self.emit(make_quadruple(Instruction::Mov, name, temp.clone(), delta));
                Ok(temp)
            }
            Operator::UAddrOf => {
                let name = self.lower_expression(inner)?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), format!("&{}", name), ""));
                Ok(temp)
            }
            Operator::UIndirection => {
                let addr = self.lower_expression(inner)?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), format!("*{}", addr), ""));
                Ok(temp)
            }
            _ => {
                let value = self.lower_expression(inner)?;
                let temp = self.fresh_temp();
                self.emit(make_quadruple(Instruction::Mov, temp.clone(), format!("{}{}", op.as_str(), value), ""));
                Ok(temp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SymbolEntry;
    use std::collections::HashMap;

    fn node(kind: &str) -> Node {
        Node {
            node: kind.to_string(),
            root: serde_json::Value::Null,
            left: None,
            right: None,
            left_column: None,
            line: 1,
            column: 0,
            end_column: 1,
        }
    }

    fn lvalue(name: &str) -> Node {
        let mut n = node("lvalue");
        n.root = serde_json::Value::String(name.to_string());
        n
    }

    fn int_literal(v: &str) -> Node {
        let mut n = node("integer_literal");
        n.root = serde_json::Value::String(v.to_string());
        n
    }

    #[test]
    fn empty_function_gets_start_end_and_epilogue_label() {
        let hoisted = HoistedSymbols::new();
        let mut builder = ItaBuilder::new(&hoisted);
        let mut func = node("function_definition");
        func.left = Some(Box::new(lvalue("main")));
        func.right = Some(Box::new(node("block_statement")));
        let instrs = builder.build_program(&[func]).unwrap();
        assert_eq!(instrs[0].op, Instruction::FuncStart);
        assert_eq!(instrs[0].s1, "main");
        assert!(instrs.iter().any(|q| q.op == Instruction::Label && q.s1 == "_L1"));
        assert_eq!(instrs.last().unwrap().op, Instruction::FuncEnd);
    }

    #[test]
    fn return_statement_jumps_to_root_branch() {
        let hoisted = HoistedSymbols::new();
        let mut builder = ItaBuilder::new(&hoisted);
        let mut ret = node("return_statement");
        ret.left = Some(Box::new(int_literal("0")));
        let mut block = node("block_statement");
        block.root = serde_json::Value::Array(vec![serde_json::to_value(ret).unwrap()]);
        let mut func = node("function_definition");
        func.left = Some(Box::new(lvalue("main")));
        func.right = Some(Box::new(block));
        let instrs = builder.build_program(&[func]).unwrap();
        assert!(instrs.iter().any(|q| q.op == Instruction::Return));
        assert!(instrs.iter().any(|q| q.op == Instruction::Goto && q.s1 == "_L1"));
    }

    #[test]
    fn auto_declares_locals_before_use() {
        let hoisted = HoistedSymbols::new();
        let mut builder = ItaBuilder::new(&hoisted);
        let mut auto_stmt = node("auto_statement");
        auto_stmt.root = serde_json::Value::Array(vec![serde_json::to_value(lvalue("x")).unwrap()]);

        let mut assign = node("assignment_expression");
        assign.left = Some(Box::new(lvalue("x")));
        assign.right = Some(Box::new(int_literal("5")));
        let mut rvalue_stmt = node("rvalue_statement");
        rvalue_stmt.left = Some(Box::new(assign));

        let mut block = node("block_statement");
        block.root = serde_json::Value::Array(vec![
            serde_json::to_value(auto_stmt).unwrap(),
            serde_json::to_value(rvalue_stmt).unwrap(),
        ]);
        let mut func = node("function_definition");
        func.left = Some(Box::new(lvalue("f")));
        func.right = Some(Box::new(block));
        let instrs = builder.build_program(&[func]).unwrap();
        assert!(instrs.iter().any(|q| q.op == Instruction::Locl && q.s1 == "x"));
        assert!(instrs.iter().any(|q| q.op == Instruction::Mov && q.s1 == "x"));
    }

    #[test]
    fn vector_definition_emits_globl() {
        let hoisted = HoistedSymbols::new();
        let mut builder = ItaBuilder::new(&hoisted);
        let mut vec_def = node("vector_definition");
        vec_def.left = Some(Box::new(lvalue("table")));
        let instrs = builder.build_program(&[vec_def]).unwrap();
        assert_eq!(instrs[0].op, Instruction::Globl);
        assert_eq!(instrs[0].s1, "table");
    }

    #[test]
    fn undeclared_top_level_node_is_ir_error() {
        let hoisted = HoistedSymbols::new();
        let mut builder = ItaBuilder::new(&hoisted);
        let err = builder.build_program(&[node("garbage")]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::IRError);
    }

    #[test]
    fn function_call_pushes_args_in_reverse_then_calls() {
        let hoisted_entry = SymbolEntry {
            kind: crate::ast::SymbolKind::FunctionDefinition,
            line: 1,
            column: 0,
            end_column: 1,
            extra: HashMap::new(),
        };
        let mut hoisted = HoistedSymbols::new();
        hoisted.insert("g".to_string(), hoisted_entry);
        let mut builder = ItaBuilder::new(&hoisted);

        let mut call = node("function_expression");
        call.left = Some(Box::new(lvalue("g")));
        let mut args = node("argument_list");
        args.root = serde_json::Value::Array(vec![
            serde_json::to_value(int_literal("1")).unwrap(),
            serde_json::to_value(int_literal("2")).unwrap(),
        ]);
        call.right = Some(Box::new(args));

        let mut rvalue_stmt = node("rvalue_statement");
        rvalue_stmt.left = Some(Box::new(call));
        let mut block = node("block_statement");
        block.root = serde_json::Value::Array(vec![serde_json::to_value(rvalue_stmt).unwrap()]);
        let mut func = node("function_definition");
        func.left = Some(Box::new(lvalue("main")));
        func.right = Some(Box::new(block));

        let instrs = builder.build_program(&[func]).unwrap();
        let push_positions: Vec<_> = instrs.iter().filter(|q| q.op == Instruction::Push).collect();
        assert_eq!(push_positions.len(), 2);
        assert_eq!(push_positions[0].s1, "(2:int:4)");
        assert_eq!(push_positions[1].s1, "(1:int:4)");
        assert!(instrs.iter().any(|q| q.op == Instruction::Call && q.s1 == "g"));
    }
}
