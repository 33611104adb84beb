//! Union widening at control-flow joins, and per-member dispatch on
//! union receivers.

use garnet_ast::{Node, NodeKind, Type, When};
use garnet_sema::{check, NoRequires, Program};

fn check_node(node: Node) -> (Program, Node) {
    let mut program = Program::new();
    let mut loader = NoRequires;
    let node = check(&mut program, node, &mut loader).unwrap().unwrap();
    (program, node)
}

/// `a = 1 || 2.3`
fn int_or_float_binding() -> Node {
    Node::assign(
        Node::var("a"),
        Node::new(NodeKind::Or {
            left: Box::new(Node::int(1)),
            right: Box::new(Node::float(2.3)),
        }),
    )
}

#[test]
fn or_of_two_types_widens_to_a_union() {
    let (_, node) = check_node(Node::expressions(vec![
        int_or_float_binding(),
        Node::var("a"),
    ]));
    assert_eq!(node.ty, Some(Type::union([Type::Int, Type::Float])));
}

#[test]
fn union_receiver_dispatches_once_per_member() {
    let (_, node) = check_node(Node::expressions(vec![
        int_or_float_binding(),
        Node::call(Some(Node::var("a")), "+", vec![Node::int(1)]),
    ]));
    assert_eq!(node.ty, Some(Type::union([Type::Int, Type::Float])));

    let NodeKind::Expressions(exps) = &node.kind else {
        panic!("expected a sequence");
    };
    let NodeKind::Call(call) = &exps[1].kind else {
        panic!("expected a call");
    };
    assert_eq!(call.target_defs.len(), 2);
    assert_eq!(call.target_defs[0].owner, Some(Type::Int));
    assert_eq!(call.target_defs[1].owner, Some(Type::Float));
}

#[test]
fn union_argument_stays_one_specialization() {
    // `a + a`: two members on the receiver, but the argument tuple is
    // the union itself, so each member method gains exactly one
    // instance rather than one per combination.
    let (program, node) = check_node(Node::expressions(vec![
        int_or_float_binding(),
        Node::call(Some(Node::var("a")), "+", vec![Node::var("a")]),
    ]));
    assert_eq!(node.ty, Some(Type::union([Type::Int, Type::Float])));

    let union = Type::union([Type::Int, Type::Float]);
    let plus = &program.classes["Int"]["+"];
    assert!(plus.borrow().lookup_instance(&[union]).is_some());
}

#[test]
fn if_without_else_is_nilable() {
    let (_, node) = check_node(Node::if_expr(
        Node::bool_lit(true),
        Some(Node::int(1)),
        None,
    ));
    assert_eq!(node.ty, Some(Type::union([Type::Nil, Type::Int])));
}

#[test]
fn branches_of_the_same_type_do_not_widen() {
    let (_, node) = check_node(Node::if_expr(
        Node::bool_lit(true),
        Some(Node::int(1)),
        Some(Node::int(2)),
    ));
    assert_eq!(node.ty, Some(Type::Int));
}

#[test]
fn case_joins_branch_types_like_a_hand_written_chain() {
    let (_, node) = check_node(Node::expressions(vec![
        Node::assign(Node::var("x"), Node::int(1)),
        Node::new(NodeKind::Case {
            cond: Box::new(Node::var("x")),
            whens: vec![When {
                conds: vec![Node::int(1)],
                body: Some(Node::int(10)),
            }],
            els: Some(Box::new(Node::float(2.0))),
        }),
    ]));
    assert_eq!(node.ty, Some(Type::union([Type::Int, Type::Float])));
}

#[test]
fn specializations_are_keyed_by_whole_union_types() {
    // The same method called with Int and with Int|Float produces two
    // distinct cache entries.
    let (program, _) = check_node(Node::expressions(vec![
        int_or_float_binding(),
        Node::call(Some(Node::int(3)), "+", vec![Node::int(1)]),
        Node::call(Some(Node::int(3)), "+", vec![Node::var("a")]),
    ]));
    let plus = &program.classes["Int"]["+"];
    assert_eq!(plus.borrow().instances.len(), 2);
}
