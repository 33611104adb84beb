//! Call-driven specialization: memoization, per-type instances, and
//! builtin primitives.

use std::rc::Rc;

use garnet_ast::{Def, Node, NodeKind, Param, Type};
use garnet_sema::{infer, Program};

fn infer_node(node: Node) -> (Program, Node) {
    let mut program = Program::new();
    let mut node = node;
    infer(&mut program, &mut node).unwrap();
    (program, node)
}

fn nth(node: &Node, index: usize) -> &Node {
    match &node.kind {
        NodeKind::Expressions(exps) => &exps[index],
        other => panic!("expected a sequence, got {other:?}"),
    }
}

fn call_of(node: &Node) -> &garnet_ast::Call {
    match &node.kind {
        NodeKind::Call(call) => call,
        other => panic!("expected a call, got {other:?}"),
    }
}

fn identity_def(name: &str) -> Node {
    Node::def(Def::new(
        name,
        vec![Param::new("x")],
        Some(Node::var("x")),
    ))
}

#[test]
fn literals_have_primitive_types() {
    let (_, node) = infer_node(Node::expressions(vec![
        Node::int(1),
        Node::float(1.5),
        Node::char_lit('a'),
        Node::string("s"),
        Node::symbol("sym"),
        Node::bool_lit(true),
    ]));
    let types: Vec<_> = match &node.kind {
        NodeKind::Expressions(exps) => exps.iter().map(Node::ty_or_nil).collect(),
        other => panic!("expected a sequence, got {other:?}"),
    };
    assert_eq!(
        types,
        vec![
            Type::Int,
            Type::Float,
            Type::Char,
            Type::String,
            Type::Symbol,
            Type::Bool
        ]
    );
}

#[test]
fn assignment_binds_the_variable() {
    let (_, node) = infer_node(Node::expressions(vec![
        Node::assign(Node::var("a"), Node::int(1)),
        Node::var("a"),
    ]));
    assert_eq!(node.ty, Some(Type::Int));
}

#[test]
fn calling_a_def_specializes_it_for_the_argument_types() {
    let (program, node) = infer_node(Node::expressions(vec![
        identity_def("echo"),
        Node::call(None, "echo", vec![Node::int(1)]),
    ]));
    assert_eq!(node.ty, Some(Type::Int));
    assert_eq!(program.defs["echo"].borrow().instances.len(), 1);

    let instance = call_of(nth(&node, 1)).target_def().unwrap();
    assert_eq!(instance.params[0].ty, Some(Type::Int));
    assert_eq!(instance.body_type(), Type::Int);
}

#[test]
fn repeated_calls_share_one_instance() {
    let (program, node) = infer_node(Node::expressions(vec![
        identity_def("echo"),
        Node::call(None, "echo", vec![Node::int(1)]),
        Node::call(None, "echo", vec![Node::int(2)]),
    ]));
    assert_eq!(program.defs["echo"].borrow().instances.len(), 1);

    let first = call_of(nth(&node, 1)).target_def().unwrap();
    let second = call_of(nth(&node, 2)).target_def().unwrap();
    assert!(Rc::ptr_eq(first, second));
}

#[test]
fn distinct_argument_types_specialize_separately() {
    let (program, node) = infer_node(Node::expressions(vec![
        identity_def("echo"),
        Node::call(None, "echo", vec![Node::int(1)]),
        Node::call(None, "echo", vec![Node::float(2.5)]),
    ]));
    assert_eq!(program.defs["echo"].borrow().instances.len(), 2);
    assert_eq!(nth(&node, 1).ty, Some(Type::Int));
    assert_eq!(nth(&node, 2).ty, Some(Type::Float));
}

#[test]
fn class_methods_resolve_through_the_class_reference() {
    let (_, node) = infer_node(Node::expressions(vec![
        Node::new(NodeKind::ClassDef {
            name: "Answer".into(),
            body: Some(Box::new(Node::def(Def::new(
                "value",
                vec![],
                Some(Node::int(42)),
            )))),
        }),
        Node::call(Some(Node::const_ref("Answer")), "value", vec![]),
    ]));
    assert_eq!(node.ty, Some(Type::Int));
}

#[test]
fn builtin_arithmetic_types_by_receiver() {
    let (_, int_sum) = infer_node(Node::call(Some(Node::int(1)), "+", vec![Node::int(2)]));
    assert_eq!(int_sum.ty, Some(Type::Int));

    let (_, float_sum) = infer_node(Node::call(
        Some(Node::float(1.0)),
        "+",
        vec![Node::float(2.0)],
    ));
    assert_eq!(float_sum.ty, Some(Type::Float));

    let (_, cmp) = infer_node(Node::call(Some(Node::int(1)), "<", vec![Node::int(2)]));
    assert_eq!(cmp.ty, Some(Type::Bool));
}

#[test]
fn constructors_allocate_the_owner_class() {
    let (_, node) = infer_node(Node::call(
        Some(Node::const_ref("Range")),
        "new",
        vec![Node::int(1), Node::int(5), Node::bool_lit(false)],
    ));
    assert_eq!(node.ty, Some(Type::Class("Range".into())));

    let instance = call_of(&node).target_def().unwrap();
    assert_eq!(instance.owner, Some(Type::Class("Range".into())));
}

#[test]
fn putchar_returns_char() {
    let (_, node) = infer_node(Node::call(None, "putchar", vec![Node::char_lit('a')]));
    assert_eq!(node.ty, Some(Type::Char));
}

#[test]
fn while_types_nil() {
    let (_, node) = infer_node(Node::expressions(vec![
        Node::assign(Node::var("going"), Node::bool_lit(true)),
        Node::new(NodeKind::While {
            cond: Box::new(Node::var("going")),
            body: Some(Box::new(Node::assign(Node::var("i"), Node::int(1)))),
        }),
    ]));
    assert_eq!(nth(&node, 1).ty, Some(Type::Nil));
}

#[test]
fn instance_variables_bind_like_locals() {
    let (_, node) = infer_node(Node::expressions(vec![
        Node::assign(Node::instance_var("@a"), Node::int(1)),
        Node::instance_var("@a"),
    ]));
    assert_eq!(node.ty, Some(Type::Int));
}

#[test]
fn nested_defs_keep_their_cache_across_enclosing_specializations() {
    // `outer` carries a nested `def inner`; specializing `outer` twice
    // re-registers `inner` both times. The registration (and the
    // instances cached on it) must survive, so the `inner` call in both
    // `outer` bodies resolves to the same shared instance.
    let (program, _) = infer_node(Node::expressions(vec![
        Node::def(Def::new(
            "outer",
            vec![Param::new("a")],
            Some(Node::expressions(vec![
                Node::def(Def::new(
                    "inner",
                    vec![Param::new("x")],
                    Some(Node::var("x")),
                )),
                Node::call(None, "inner", vec![Node::int(42)]),
            ])),
        )),
        Node::call(None, "outer", vec![Node::int(1)]),
        Node::call(None, "outer", vec![Node::float(2.5)]),
    ]));
    assert_eq!(program.defs["inner"].borrow().instances.len(), 1);

    let outer = program.defs["outer"].borrow();
    let inner_instances: Vec<_> = outer
        .instances
        .values()
        .map(|instance| {
            let body = instance.body.as_ref().unwrap();
            Rc::clone(call_of(nth(body, 1)).target_def().unwrap())
        })
        .collect();
    assert_eq!(inner_instances.len(), 2);
    assert!(Rc::ptr_eq(&inner_instances[0], &inner_instances[1]));
}

#[test]
#[should_panic(expected = "empty expression sequence")]
fn empty_sequence_is_a_normalizer_bug() {
    let mut program = Program::new();
    let mut node = Node::expressions(vec![]);
    let _ = infer(&mut program, &mut node);
}
