//! End-to-end scenarios driving the full AST -> assembly pipeline through
//! hand-built JSON ASTs (the lexer/parser front-end that would normally
//! produce these is an external collaborator).

use credence::target::{Host, Platform};

fn lvalue(name: &str) -> serde_json::Value {
    serde_json::json!({"node": "lvalue", "root": name, "line": 1, "column": 0, "end_column": 1})
}

fn int_lit(v: i64) -> serde_json::Value {
    serde_json::json!({"node": "integer_literal", "root": v.to_string(), "line": 1, "column": 0, "end_column": 1})
}

fn block(stmts: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({"node": "block_statement", "root": stmts, "line": 1, "column": 0, "end_column": 1})
}

fn function_def(name: &str, body: serde_json::Value) -> serde_json::Value {
    function_def_with_params(name, &[], body)
}

fn function_def_with_params(name: &str, params: &[&str], body: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "node": "function_definition",
        "root": params.iter().map(|p| lvalue(p)).collect::<Vec<_>>(),
        "left": lvalue(name),
        "right": body,
        "line": 1, "column": 0, "end_column": 1
    })
}

#[test]
fn scenario_a_arithmetic_constant_folding_assigns_directly() {
    // main() { auto x; x = 2 + 3; }
    let auto_stmt = serde_json::json!({"node": "auto_statement", "root": [lvalue("x")], "line": 1, "column": 0, "end_column": 1});
    let relation = serde_json::json!({
        "node": "relation_expression",
        "root": "+",
        "left": int_lit(2),
        "right": int_lit(3),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign = serde_json::json!({
        "node": "assignment_expression",
        "left": lvalue("x"),
        "right": relation,
        "line": 1, "column": 0, "end_column": 1
    });
    let rvalue_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign, "line": 1, "column": 0, "end_column": 1});
    let body = block(vec![auto_stmt, rvalue_stmt]);
    let ast = serde_json::json!([function_def("main", body)]);
    let symbols = serde_json::json!({"main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4}});

    let asm = credence::compile(
        &ast.to_string(),
        &symbols.to_string(),
        Platform::X86_64,
        Host::Linux,
    )
    .unwrap();
    assert!(asm.contains("mov dword ptr [rbp - 4], 5"));
}

#[test]
fn scenario_d_function_call_emits_call_to_callee() {
    // add(a, b) { return(a + b); }  main() { auto r; r = add(3, 4); }
    let add_body = block(vec![serde_json::json!({
        "node": "return_statement",
        "left": {
            "node": "relation_expression", "root": "+",
            "left": lvalue("a"), "right": lvalue("b"),
            "line": 1, "column": 0, "end_column": 1
        },
        "line": 1, "column": 0, "end_column": 1
    })]);
    let add_def = function_def_with_params("add", &["a", "b"], add_body);

    let auto_stmt = serde_json::json!({"node": "auto_statement", "root": [lvalue("r")], "line": 1, "column": 0, "end_column": 1});
    let call = serde_json::json!({
        "node": "function_expression",
        "left": lvalue("add"),
        "right": {"node": "argument_list", "root": [int_lit(3), int_lit(4)], "line": 1, "column": 0, "end_column": 1},
        "line": 1, "column": 0, "end_column": 1
    });
    let assign = serde_json::json!({
        "node": "assignment_expression", "left": lvalue("r"), "right": call,
        "line": 1, "column": 0, "end_column": 1
    });
    let rvalue_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign, "line": 1, "column": 0, "end_column": 1});
    let main_def = function_def("main", block(vec![auto_stmt, rvalue_stmt]));

    let ast = serde_json::json!([add_def, main_def]);
    let symbols = serde_json::json!({
        "add": {"type": "function_definition", "line": 1, "column": 0, "end_column": 3},
        "main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4}
    });

    let asm = credence::compile(
        &ast.to_string(),
        &symbols.to_string(),
        Platform::X86_64,
        Host::Linux,
    )
    .unwrap();
    assert!(asm.contains("call add"));
}

#[test]
fn scenario_f_conditional_emits_compare_and_branch() {
    // main(){ auto x; x = 5; if (x > 3) { x = 1; } }
    let auto_stmt = serde_json::json!({"node": "auto_statement", "root": [lvalue("x")], "line": 1, "column": 0, "end_column": 1});
    let assign5 = serde_json::json!({
        "node": "assignment_expression", "left": lvalue("x"), "right": int_lit(5),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign5_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign5, "line": 1, "column": 0, "end_column": 1});

    let cond = serde_json::json!({
        "node": "relation_expression", "root": ">",
        "left": lvalue("x"), "right": int_lit(3),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign1 = serde_json::json!({
        "node": "assignment_expression", "left": lvalue("x"), "right": int_lit(1),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign1_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign1, "line": 1, "column": 0, "end_column": 1});
    let if_stmt = serde_json::json!({
        "node": "if_statement",
        "left": cond,
        "right": block(vec![assign1_stmt]),
        "line": 1, "column": 0, "end_column": 1
    });

    let body = block(vec![auto_stmt, assign5_stmt, if_stmt]);
    let ast = serde_json::json!([function_def("main", body)]);
    let symbols = serde_json::json!({"main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4}});

    let asm = credence::compile(
        &ast.to_string(),
        &symbols.to_string(),
        Platform::X86_64,
        Host::Linux,
    )
    .unwrap();
    assert!(asm.contains("cmp"));
    assert!(asm.contains("je ."));
}

#[test]
fn scenario_c_vector_out_of_range_fails_with_out_of_range() {
    // main(){ extrn v; print(v[10]); }  v [3] 1,2,3;
    let vector_def = serde_json::json!({
        "node": "vector_definition",
        "left": lvalue("v"),
        "right": {"node": "initializer_list", "root": [int_lit(1), int_lit(2), int_lit(3)], "line": 1, "column": 0, "end_column": 1},
        "line": 1, "column": 0, "end_column": 1
    });

    let extrn_stmt = serde_json::json!({"node": "extrn_statement", "root": [lvalue("v")], "line": 1, "column": 0, "end_column": 1});
    let vector_index = serde_json::json!({
        "node": "vector_lvalue", "left": lvalue("v"), "right": int_lit(10),
        "line": 1, "column": 0, "end_column": 1
    });
    let print_call = serde_json::json!({
        "node": "function_expression",
        "left": lvalue("print"),
        "right": {"node": "argument_list", "root": [vector_index], "line": 1, "column": 0, "end_column": 1},
        "line": 1, "column": 0, "end_column": 1
    });
    let print_stmt = serde_json::json!({"node": "rvalue_statement", "left": print_call, "line": 1, "column": 0, "end_column": 1});
    let main_def = function_def("main", block(vec![extrn_stmt, print_stmt]));

    let ast = serde_json::json!([vector_def, main_def]);
    let symbols = serde_json::json!({
        "v": {"type": "vector_definition", "line": 1, "column": 0, "end_column": 1},
        "main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4}
    });

    let err = credence::compile(
        &ast.to_string(),
        &symbols.to_string(),
        Platform::X86_64,
        Host::Linux,
    )
    .unwrap_err();
    assert_eq!(err.kind, credence::error::ErrorKind::OutOfRange);
    assert_eq!(err.symbol, "v");
}

#[test]
fn scenario_b_pointer_round_trip_stores_through_indirection() {
    // main() { auto x, p; x = 10; p = &x; *p = 20; }
    let pointer_decl = serde_json::json!({"node": "indirect_lvalue", "left": lvalue("p"), "line": 1, "column": 0, "end_column": 1});
    let auto_stmt = serde_json::json!({
        "node": "auto_statement", "root": [lvalue("x"), pointer_decl],
        "line": 1, "column": 0, "end_column": 1
    });
    let assign_x = serde_json::json!({
        "node": "assignment_expression", "left": lvalue("x"), "right": int_lit(10),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign_x_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign_x, "line": 1, "column": 0, "end_column": 1});

    let addr_of_x = serde_json::json!({
        "node": "address_of_expression", "root": "&", "left": lvalue("x"),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign_p = serde_json::json!({
        "node": "assignment_expression", "left": lvalue("p"), "right": addr_of_x,
        "line": 1, "column": 0, "end_column": 1
    });
    let assign_p_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign_p, "line": 1, "column": 0, "end_column": 1});

    let indirect_p = serde_json::json!({"node": "indirect_lvalue", "left": lvalue("p"), "line": 1, "column": 0, "end_column": 1});
    let assign_deref = serde_json::json!({
        "node": "assignment_expression", "left": indirect_p, "right": int_lit(20),
        "line": 1, "column": 0, "end_column": 1
    });
    let assign_deref_stmt = serde_json::json!({"node": "rvalue_statement", "left": assign_deref, "line": 1, "column": 0, "end_column": 1});

    let body = block(vec![auto_stmt, assign_x_stmt, assign_p_stmt, assign_deref_stmt]);
    let ast = serde_json::json!([function_def("main", body)]);
    let symbols = serde_json::json!({"main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4}});

    let asm = credence::compile(
        &ast.to_string(),
        &symbols.to_string(),
        Platform::X86_64,
        Host::Linux,
    )
    .unwrap();
    assert!(asm.contains("lea rax, [rbp - 12]"));
    assert!(asm.contains("mov qword ptr [rbp - 8], rax"));
    assert!(asm.contains("mov rax, qword ptr [rbp - 8]"));
    assert!(asm.contains("mov dword ptr [rax], 20"));
}

#[test]
fn scenario_e_string_constant_goes_into_the_literal_pool() {
    // main() { print("hi"); }
    let print_call = serde_json::json!({
        "node": "function_expression",
        "left": lvalue("print"),
        "right": {
            "node": "argument_list",
            "root": [{"node": "string_literal", "root": "\"hi\"", "line": 1, "column": 0, "end_column": 1}],
            "line": 1, "column": 0, "end_column": 1
        },
        "line": 1, "column": 0, "end_column": 1
    });
    let print_stmt = serde_json::json!({"node": "rvalue_statement", "left": print_call, "line": 1, "column": 0, "end_column": 1});
    let main_def = function_def("main", block(vec![print_stmt]));
    let ast = serde_json::json!([main_def]);
    let symbols = serde_json::json!({"main": {"type": "function_definition", "line": 1, "column": 0, "end_column": 4}});

    let asm = credence::compile(
        &ast.to_string(),
        &symbols.to_string(),
        Platform::X86_64,
        Host::Linux,
    )
    .unwrap();
    assert!(asm.contains("._L_str1__:"));
    assert!(asm.contains(".asciz \"hi\""));
    assert!(asm.contains("lea rdi, [rip + ._L_str1__]"));
}
