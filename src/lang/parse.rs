//! Parser for the Curry language.
//!
//! The grammar is a PEG built from `pom` combinators. There is no separate lexer: each rule
//! consumes its own leading whitespace.
//!
//! Developer notes:
//!
//! * A PEG is order sensitive. Longer tokens must be tried before their prefixes (`==` before
//!   `=`), and every keyword-led rule must be tried before the rules that start with an
//!   expression.
//!
//! * Keywords are recognized as whole words, so `letter = 1;` is an assignment to `letter` and
//!   not a malformed `let`. `identifier()` refuses to produce a keyword.
//!
//! * Operator precedence is a ladder of rules, lowest precedence first:
//!
//!     equality (== !=, not chainable)  <  relation (< >)  <  additive (+ -)  <  multiplicative (* /)
//!       <  unary (! -)  <  postfix (call, index, dot)
//!
//!   Every other binary level folds left, so `1 - 2 - 3` is `(1 - 2) - 3`.
//!
//! * `if` and `fn` are expressions, which means the expression rules reach statement sequences.
//!   Recursive references must therefore always go through `call()` or parser construction
//!   never terminates.

use std::collections::BTreeSet;
use std::iter::FromIterator;
use std::rc::Rc;
use std::str::FromStr;

use lazy_static::lazy_static;
use pom::parser::{call, end, is_a, list, none_of, one_of, sym, tag, Parser};

use crate::lang::ast::*;

lazy_static! {
    static ref KEYWORDS: BTreeSet<&'static str> = vec![
        "let", "fn", "if", "else", "while", "return", "import", "true", "false",
    ]
    .into_iter()
    .collect();
}

/// Folds `lhs (op rhs)*` into a left associative tree
fn left_fold(lhs: Expression, rest: Vec<(InfixOperator, Expression)>) -> Expression {
    rest.into_iter().fold(lhs, |acc, (op, rhs)| {
        Expression::Infix(op, Box::new(acc), Box::new(rhs))
    })
}

fn space<'a>() -> Parser<'a, char, ()> {
    one_of(" \t\r\n").repeat(0..).discard()
}

fn word<'a>() -> Parser<'a, char, String> {
    (is_a(|c: char| c.is_ascii_alphabetic() || c == '_')
        + is_a(|c: char| c.is_ascii_alphanumeric() || c == '_').repeat(0..))
    .collect()
    .map(String::from_iter)
}

fn keyword<'a>(kw: &'static str) -> Parser<'a, char, ()> {
    word().convert(move |w| {
        if w == kw {
            Ok(())
        } else {
            Err(format!("expected keyword '{}', got '{}'", kw, w))
        }
    })
}

fn identifier<'a>() -> Parser<'a, char, Identifier> {
    word().convert(|w| {
        if KEYWORDS.contains(&w.as_str()) {
            Err(format!("'{}' is a keyword", w))
        } else {
            Ok(Identifier(w))
        }
    })
}

fn string<'a>() -> Parser<'a, char, String> {
    let special_char = sym('\\')
        | sym('"')
        | sym('n').map(|_| '\n')
        | sym('r').map(|_| '\r')
        | sym('t').map(|_| '\t');
    let escape_sequence = sym('\\') * special_char;
    let chars = (none_of("\\\"") | escape_sequence)
        .repeat(0..)
        .map(String::from_iter);

    sym('"') * chars - sym('"')
}

fn constant<'a>() -> Parser<'a, char, Expression> {
    let integer = one_of("0123456789")
        .repeat(1..)
        .collect()
        .map(String::from_iter)
        .convert(|s| i64::from_str(&s));
    let constant = integer.map(Constant::Integer)
        | keyword("true").map(|_| Constant::Boolean(true))
        | keyword("false").map(|_| Constant::Boolean(false));

    constant.map(Expression::Constant)
}

/// Parse a `{ ... }` delimited statement sequence
fn block<'a>() -> Parser<'a, char, Vec<Statement>> {
    space() * sym('{') * call(stmts) - space() - sym('}')
}

fn if_expr<'a>() -> Parser<'a, char, Expression> {
    let if_part = keyword("if") * call(expr) + call(block);
    let else_part = space() * keyword("else") * call(block);

    (if_part + else_part.opt()).map(|((cond, consequence), alternative)| {
        Expression::IfElse(
            Box::new(cond),
            consequence,
            alternative.unwrap_or_else(Vec::new),
        )
    })
}

fn fn_expr<'a>() -> Parser<'a, char, Expression> {
    let name = space() * identifier();
    let params = list(space() * identifier(), space() * sym(','));
    let signature = keyword("fn") * name.opt() - space() - sym('(') + params - space() - sym(')');

    (signature + call(block)).map(|((name, parameters), body)| {
        Expression::Function(Rc::new(FunctionLiteral {
            name,
            parameters,
            body,
        }))
    })
}

fn primary_expr<'a>() -> Parser<'a, char, Expression> {
    let paren = sym('(') * call(expr) - space() - sym(')');
    let list_expr = (sym('[') * list(call(expr), space() * sym(',')) - space() - sym(']'))
        .map(Expression::List);
    let ident = identifier().map(Expression::Identifier);

    constant() | string().map(Expression::Str) | list_expr | if_expr() | fn_expr() | ident | paren
}

fn postfix_expr<'a>() -> Parser<'a, char, Expression> {
    enum PostfixOp {
        Call(Vec<Expression>),
        Index(Expression),
        Dot(Identifier),
    }

    let arg_list = list(call(expr), space() * sym(','));
    let function_call = (sym('(') * arg_list - space() - sym(')')).map(PostfixOp::Call);
    let index = (sym('[') * call(expr) - space() - sym(']')).map(PostfixOp::Index);
    let dot = (sym('.') * space() * identifier()).map(PostfixOp::Dot);
    let parser = call(primary_expr) + (space() * (function_call | index | dot)).repeat(0..);

    // NB: postfix operators are left-to-right associativity, so fold-left
    parser.map(|(primary, rest)| {
        rest.into_iter().fold(primary, |expr, op| match op {
            PostfixOp::Call(args) => match expr {
                // `pkg.f(args)` calls `f` out of the package rather than calling a global `pkg.f`
                Expression::DotAccess(source, member) if is_identifier(&member) => {
                    Expression::DotAccess(source, Box::new(Expression::Call(member, args)))
                }
                callee => Expression::Call(Box::new(callee), args),
            },
            PostfixOp::Index(index) => Expression::Index(Box::new(expr), Box::new(index)),
            PostfixOp::Dot(ident) => {
                Expression::DotAccess(Box::new(expr), Box::new(Expression::Identifier(ident)))
            }
        })
    })
}

fn is_identifier(expr: &Expression) -> bool {
    matches!(expr, Expression::Identifier(_))
}

fn unary_expr<'a>() -> Parser<'a, char, Expression> {
    let ops = sym('!').map(|_| PrefixOperator::Not) | sym('-').map(|_| PrefixOperator::Minus);
    let not_minus = (ops - space()).repeat(0..) + call(postfix_expr);

    // NB: unary expression are right-to-left associativity, so fold-right
    not_minus.map(|(ops, expr)| {
        ops.into_iter()
            .rev()
            .fold(expr, |expr, op| Expression::Prefix(op, Box::new(expr)))
    })
}

fn mult_expr<'a>() -> Parser<'a, char, Expression> {
    let ops = sym('*').map(|_| InfixOperator::Multiply) | sym('/').map(|_| InfixOperator::Divide);
    let mult_div = call(unary_expr) + (space() * ops - space() + call(unary_expr)).repeat(0..);

    mult_div.map(|(lhs, rest)| left_fold(lhs, rest))
}

fn add_expr<'a>() -> Parser<'a, char, Expression> {
    let ops = sym('+').map(|_| InfixOperator::Plus) | sym('-').map(|_| InfixOperator::Minus);
    let plus_minus = call(mult_expr) + (space() * ops - space() + call(mult_expr)).repeat(0..);

    plus_minus.map(|(lhs, rest)| left_fold(lhs, rest))
}

fn relation_expr<'a>() -> Parser<'a, char, Expression> {
    let ops =
        sym('<').map(|_| InfixOperator::LessThan) | sym('>').map(|_| InfixOperator::GreaterThan);
    let lt_gt = call(add_expr) + (space() * ops - space() + call(add_expr)).repeat(0..);

    lt_gt.map(|(lhs, rest)| left_fold(lhs, rest))
}

fn eq_expr<'a>() -> Parser<'a, char, Expression> {
    let ops = tag("==").map(|_| InfixOperator::Equals) | tag("!=").map(|_| InfixOperator::NotEquals);
    // NB: not chainable. `1 == 1 == true` is a parse error
    let eq_neq = call(relation_expr) + (space() * ops - space() + call(relation_expr)).opt();

    eq_neq.map(|(lhs, rhs)| match rhs {
        Some((op, rhs)) => Expression::Infix(op, Box::new(lhs), Box::new(rhs)),
        None => lhs,
    })
}

/// Parse an expression
///
/// Consumes leading whitespace
fn expr<'a>() -> Parser<'a, char, Expression> {
    space() * call(eq_expr)
}

fn import_path<'a>() -> Parser<'a, char, String> {
    (word() + (sym('/') * word()).repeat(0..)).map(|(first, rest)| {
        let mut path = first;
        for part in rest {
            path.push('/');
            path.push_str(&part);
        }

        path
    })
}

fn let_stmt<'a>() -> Parser<'a, char, Statement> {
    let declaration = keyword("let") * space() * identifier() - space() - sym('=') + call(expr);
    declaration.map(|(ident, value)| Statement::Let(ident, value))
}

fn assign_stmt<'a>() -> Parser<'a, char, Statement> {
    let assignment = identifier() - space() - sym('=') + call(expr);
    assignment.map(|(ident, value)| Statement::Assign(ident, value))
}

fn keyword_stmt<'a>() -> Parser<'a, char, Statement> {
    let return_stmt = (keyword("return") * call(expr)).map(Statement::Return);
    let while_stmt =
        (keyword("while") * call(expr) + call(block)).map(|(cond, body)| Statement::While(cond, body));
    let paths = space() * import_path() + (space() * sym(',') * space() * import_path()).repeat(0..);
    let import_stmt = (keyword("import") * paths).map(|(first, mut rest)| {
        rest.insert(0, first);
        Statement::Import(rest)
    });

    let_stmt() | return_stmt | while_stmt | import_stmt
}

/// Parse a statement
///
/// Consumes leading whitespace. The trailing `;` is optional, so blocks may end in a bare
/// expression (eg. `if (x) { 1 }`).
fn stmt<'a>() -> Parser<'a, char, Statement> {
    // NB: keywords must come first otherwise they may be parsed as identifiers
    let statement = keyword_stmt() | assign_stmt() | call(expr).map(Statement::Expression);

    space() * statement - space() - sym(';').opt()
}

/// Parse a series of statements
fn stmts<'a>() -> Parser<'a, char, Vec<Statement>> {
    stmt().repeat(0..)
}

pub fn parse(input: &str) -> pom::Result<Program> {
    let input: Vec<char> = input.chars().collect();
    let program = stmts() - space() - end();
    let statements = program.parse(&input)?;

    Ok(Program { statements })
}

#[cfg(test)]
fn int(i: i64) -> Expression {
    Expression::Constant(Constant::Integer(i))
}

#[cfg(test)]
fn ident(s: &str) -> Expression {
    Expression::Identifier(Identifier(s.to_string()))
}

#[cfg(test)]
fn infix(op: InfixOperator, lhs: Expression, rhs: Expression) -> Expression {
    Expression::Infix(op, Box::new(lhs), Box::new(rhs))
}

#[test]
fn test_string() {
    let data = vec![
        (r#""hello world""#, "hello world"),
        (r#""hello world\n""#, "hello world\n"),
        (r#""tab\there""#, "tab\there"),
        (r#""say \"hi\"""#, "say \"hi\""),
        (r#""""#, ""),
        (r#""❤""#, "❤"),
    ];

    for (input, expected) in data {
        let input: Vec<char> = input.chars().collect();
        assert_eq!(string().parse(&input), Ok(expected.to_string()));
    }
}

#[test]
fn test_precedence() {
    use InfixOperator::*;

    let tests = vec![
        ("1 + 2 * 3;", infix(Plus, int(1), infix(Multiply, int(2), int(3)))),
        ("1 - 2 - 3;", infix(Minus, infix(Minus, int(1), int(2)), int(3))),
        ("(1 + 2) * 3;", infix(Multiply, infix(Plus, int(1), int(2)), int(3))),
        (
            "a + 1 < b == true;",
            infix(
                Equals,
                infix(LessThan, infix(Plus, ident("a"), int(1)), ident("b")),
                Expression::Constant(Constant::Boolean(true)),
            ),
        ),
        (
            "-a * !b;",
            infix(
                Multiply,
                Expression::Prefix(PrefixOperator::Minus, Box::new(ident("a"))),
                Expression::Prefix(PrefixOperator::Not, Box::new(ident("b"))),
            ),
        ),
        ("1 != 2;", infix(NotEquals, int(1), int(2))),
        ("4 / 2 > 1;", infix(GreaterThan, infix(Divide, int(4), int(2)), int(1))),
    ];

    for (input, expected) in tests {
        let program = parse(input).expect("Failed to parse");
        assert_eq!(program.statements, vec![Statement::Expression(expected)], "{}", input);
    }
}

#[test]
fn test_statements() {
    let tests = vec![
        ("let x = 5;", Statement::Let(Identifier("x".to_string()), int(5))),
        ("letter = 5;", Statement::Assign(Identifier("letter".to_string()), int(5))),
        ("x = y;", Statement::Assign(Identifier("x".to_string()), ident("y"))),
        ("return 10;", Statement::Return(int(10))),
        (
            "import math, std/io;",
            Statement::Import(vec!["math".to_string(), "std/io".to_string()]),
        ),
        (
            "while (x < 3) { x = x + 1; };",
            Statement::While(
                infix(InfixOperator::LessThan, ident("x"), int(3)),
                vec![Statement::Assign(
                    Identifier("x".to_string()),
                    infix(InfixOperator::Plus, ident("x"), int(1)),
                )],
            ),
        ),
        ("x == 3;", Statement::Expression(infix(InfixOperator::Equals, ident("x"), int(3)))),
    ];

    for (input, expected) in tests {
        let program = parse(input).expect("Failed to parse");
        assert_eq!(program.statements, vec![expected], "{}", input);
    }
}

#[test]
fn test_postfix() {
    let tests = vec![
        (
            "foo(4, 5);",
            Expression::Call(Box::new(ident("foo")), vec![int(4), int(5)]),
        ),
        (
            "[1, 2][0];",
            Expression::Index(Box::new(Expression::List(vec![int(1), int(2)])), Box::new(int(0))),
        ),
        (
            "math.pi;",
            Expression::DotAccess(Box::new(ident("math")), Box::new(ident("pi"))),
        ),
        (
            "math.add(1, 2);",
            Expression::DotAccess(
                Box::new(ident("math")),
                Box::new(Expression::Call(Box::new(ident("add")), vec![int(1), int(2)])),
            ),
        ),
        (
            "f()(1);",
            Expression::Call(
                Box::new(Expression::Call(Box::new(ident("f")), vec![])),
                vec![int(1)],
            ),
        ),
    ];

    for (input, expected) in tests {
        let program = parse(input).expect("Failed to parse");
        assert_eq!(program.statements, vec![Statement::Expression(expected)], "{}", input);
    }
}

#[test]
fn test_if_and_fn() {
    let program = parse("if(true) { true } else { 1; 2 }").expect("Failed to parse");
    assert_eq!(
        program.statements,
        vec![Statement::Expression(Expression::IfElse(
            Box::new(Expression::Constant(Constant::Boolean(true))),
            vec![Statement::Expression(Expression::Constant(Constant::Boolean(true)))],
            vec![Statement::Expression(int(1)), Statement::Expression(int(2))],
        ))]
    );

    let program = parse("fn foo(a, b) { a + b; }; foo(4, 5);").expect("Failed to parse");
    assert_eq!(program.statements.len(), 2);
    match &program.statements[0] {
        Statement::Expression(Expression::Function(f)) => {
            assert_eq!(f.name, Some(Identifier("foo".to_string())));
            assert_eq!(
                f.parameters,
                vec![Identifier("a".to_string()), Identifier("b".to_string())]
            );
            assert_eq!(f.body.len(), 1);
        }
        s => panic!("Expected function definition, got {:?}", s),
    }

    let program = parse("let f = fn() { return 1; };").expect("Failed to parse");
    match &program.statements[0] {
        Statement::Let(_, Expression::Function(f)) => {
            assert_eq!(f.name, None);
            assert!(f.parameters.is_empty());
        }
        s => panic!("Expected anonymous function, got {:?}", s),
    }
}

#[test]
fn test_parse_failures() {
    let tests = vec![
        "let = 3;",
        "let let = 3;",
        "1 +;",
        "if (true) { 1",
        "fn (a b) {}",
        "[1, 2",
        "1 == 1 == true;",
        "a != b != c;",
    ];

    for input in tests {
        assert!(parse(input).is_err(), "'{}' should not parse", input);
    }
}
