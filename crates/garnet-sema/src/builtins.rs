//! Built-in class and method registration.
//!
//! Seeds the program context with just enough of the core library for
//! the type/scope engine to work: primitive classes with arithmetic,
//! comparison, and case-equality operators, the constructor classes the
//! normalizer's desugarings reference (`Range`, `Regexp`,
//! `StringBuilder`), and the top-level `putchar`.
//!
//! Builtin bodies are `Primitive` nodes: they go through ordinary
//! specialization (cloned, cached per argument-type tuple) but type
//! themselves by rule instead of by traversal, so the same `+` template
//! serves every numeric receiver.

use garnet_ast::{Def, Node, NodeKind, Param, Primitive};

use crate::program::Program;

/// Binary numeric operators: result is the receiver's type.
const ARITHMETIC: &[&str] = &["+", "-", "*", "/"];
/// Comparisons: result is Bool.
const COMPARISON: &[&str] = &["==", "!=", "<", "<=", ">", ">="];

pub(crate) fn register(program: &mut Program) {
    for class in ["Int", "Float"] {
        for op in ARITHMETIC {
            program.define(Some(class), method(op, &["other"], Primitive::BinaryOp));
        }
    }

    for class in ["Nil", "Bool", "Int", "Float", "Char", "String", "Symbol"] {
        for op in COMPARISON {
            program.define(Some(class), method(op, &["other"], Primitive::Compare));
        }
        program.define(Some(class), method("===", &["other"], Primitive::CaseEqual));
    }

    program.define(
        Some("Range"),
        method("new", &["from", "to", "exclusive"], Primitive::Allocate),
    );
    program.define(
        Some("Regexp"),
        method("new", &["pattern"], Primitive::Allocate),
    );

    program.define(Some("StringBuilder"), method("new", &[], Primitive::Allocate));
    program.define(
        Some("StringBuilder"),
        method("<<", &["piece"], Primitive::BinaryOp),
    );
    program.define(Some("StringBuilder"), method("to_s", &[], Primitive::ToString));

    program.define(None, method("putchar", &["c"], Primitive::PutChar));
}

fn method(name: &str, params: &[&str], primitive: Primitive) -> Def {
    Def::new(
        name,
        params.iter().map(|p| Param::new(*p)).collect(),
        Some(Node::new(NodeKind::Primitive(primitive))),
    )
}
