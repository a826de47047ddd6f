use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use log::debug;

use super::stack::CallStack;
use super::value::{List, Value};
use crate::lang::ast::*;
use crate::lang::modules::ModuleIndex;

/// Reason evaluation of a statement sequence stopped early
///
/// Propagated with `?` through every enclosing statement sequence. A function call turns
/// `Return` back into a plain value. `Error` is only ever consumed at the program boundary.
enum Unwind {
    Return(Value),
    Error(anyhow::Error),
}

impl From<anyhow::Error> for Unwind {
    fn from(e: anyhow::Error) -> Self {
        Unwind::Error(e)
    }
}

type Flow<T> = std::result::Result<T, Unwind>;

fn prefix_op(op: PrefixOperator, val: Value) -> Result<Value> {
    match (op, val) {
        (PrefixOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (PrefixOperator::Minus, Value::Integer(i)) => {
            let res = i.checked_neg().ok_or_else(|| anyhow!("-{} overflows", i))?;
            Ok(Value::Integer(res))
        }
        (op, v) => bail!(
            "Not supported prefix operator ({}) was used for type {}",
            op,
            v.type_of()
        ),
    }
}

fn integer_op(op: InfixOperator, lhs: i64, rhs: i64) -> Result<Value> {
    let overflow = || anyhow!("{} {} {} overflows", lhs, op, rhs);

    let val = match op {
        InfixOperator::Plus => Value::Integer(lhs.checked_add(rhs).ok_or_else(overflow)?),
        InfixOperator::Minus => Value::Integer(lhs.checked_sub(rhs).ok_or_else(overflow)?),
        InfixOperator::Multiply => Value::Integer(lhs.checked_mul(rhs).ok_or_else(overflow)?),
        InfixOperator::Divide => {
            if rhs == 0 {
                bail!("Divide by zero");
            }

            Value::Integer(lhs.checked_div(rhs).ok_or_else(overflow)?)
        }
        InfixOperator::LessThan => Value::Boolean(lhs < rhs),
        InfixOperator::GreaterThan => Value::Boolean(lhs > rhs),
        InfixOperator::Equals => Value::Boolean(lhs == rhs),
        InfixOperator::NotEquals => Value::Boolean(lhs != rhs),
    };

    Ok(val)
}

fn infix_op(op: InfixOperator, lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Integer(l), Value::Integer(r)) => integer_op(op, l, r),
        (Value::String(l), Value::String(r)) if op == InfixOperator::Plus => {
            Ok(Value::String(l + &r))
        }
        // Integers are only implicitly stringified by `+`
        (Value::String(s), Value::Integer(i)) if op == InfixOperator::Plus => {
            Ok(Value::String(format!("{}{}", s, i)))
        }
        (Value::Integer(i), Value::String(s)) if op == InfixOperator::Plus => {
            Ok(Value::String(format!("{}{}", i, s)))
        }
        (l, r) if l.type_of() == r.type_of() => bail!(
            "Not supported infix operator ({}) was used for type {}",
            op,
            l.type_of()
        ),
        (l, r) => bail!(
            "Type mismatch: left and right side of ({}) have different types ({} and {})",
            op,
            l.type_of(),
            r.type_of()
        ),
    }
}

/// Tree-walking evaluator
///
/// Owns the call stack, the global function table and the module index. One `Engine` serves a
/// whole session: bindings and function definitions survive between calls to `eval_program()`.
pub struct Engine {
    stack: CallStack,
    /// Named function definitions, by name. Consulted after the call stack.
    functions: BTreeMap<Identifier, Rc<FunctionLiteral>>,
    modules: ModuleIndex,
    has_error: bool,
}

impl Engine {
    pub fn new(modules: ModuleIndex) -> Self {
        Self {
            stack: CallStack::new(),
            functions: BTreeMap::new(),
            modules,
            has_error: false,
        }
    }

    /// Whether the last `eval_program()` ended in an error
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Evaluate a whole program
    ///
    /// Returns the value of the last statement evaluated, the operand of a top level `return`,
    /// or `Value::Error` if evaluation failed. `has_error()` tells the last case apart from a
    /// program that merely evaluated to an error value.
    pub fn eval_program(&mut self, program: &Program) -> Value {
        self.has_error = false;

        match self.eval_statements(&program.statements) {
            Ok(val) | Err(Unwind::Return(val)) => val,
            Err(Unwind::Error(e)) => {
                debug!("evaluation failed: {}", e);
                self.has_error = true;
                Value::Error(e.to_string())
            }
        }
    }

    fn eval_statements(&mut self, stmts: &[Statement]) -> Flow<Value> {
        let mut result = Value::Null;
        for stmt in stmts {
            result = self.eval_statement(stmt)?;
        }

        Ok(result)
    }

    /// Evaluate `stmts` inside a fresh scope
    fn eval_scoped(&mut self, stmts: &[Statement]) -> Flow<Value> {
        self.stack.enter_scope();
        let result = self.eval_statements(stmts);
        self.stack.exit_scope();

        result
    }

    fn eval_statement(&mut self, stmt: &Statement) -> Flow<Value> {
        match stmt {
            Statement::Let(ident, expr) => {
                let val = self.eval_expr(expr)?;
                self.stack.declare(ident.clone(), val);
                Ok(Value::Null)
            }
            Statement::Assign(ident, expr) => {
                let val = self.eval_expr(expr)?;
                self.stack.assign(ident, val)?;
                Ok(Value::Null)
            }
            Statement::While(cond, body) => self.eval_while(cond, body),
            Statement::Return(expr) => {
                let val = self.eval_expr(expr)?;
                Err(Unwind::Return(val))
            }
            Statement::Import(paths) => self.eval_import(paths),
            Statement::Expression(expr) => self.eval_expr(expr),
        }
    }

    fn eval_condition(&mut self, cond: &Expression) -> Flow<bool> {
        match self.eval_expr(cond)? {
            Value::Boolean(b) => Ok(b),
            v => Err(anyhow!(
                "Non boolean type ({}) was returned for condition",
                v.type_of()
            )
            .into()),
        }
    }

    fn eval_while(&mut self, cond: &Expression, body: &[Statement]) -> Flow<Value> {
        while self.eval_condition(cond)? {
            self.eval_scoped(body)?;
        }

        Ok(Value::Null)
    }

    fn eval_import(&mut self, paths: &[String]) -> Flow<Value> {
        for path in paths {
            let package = self.modules.resolve(path)?.clone();
            debug!(
                "import {}: {} globals, {} functions",
                path,
                package.globals.len(),
                package.functions.len()
            );

            let name = Identifier(package.name.clone());
            self.stack.declare(name, Value::Package(Rc::new(package)));
        }

        Ok(Value::Null)
    }

    fn eval_identifier(&self, ident: &Identifier) -> Result<Value> {
        if let Some(val) = self.stack.lookup(ident) {
            return Ok(val.clone());
        }

        match self.functions.get(ident) {
            Some(func) => Ok(Value::Function(func.clone())),
            None => bail!("Undeclared variable {} used", ident),
        }
    }

    fn eval_list(&mut self, exprs: &[Expression]) -> Flow<Value> {
        let mut list = List::new();
        for expr in exprs {
            let val = self.eval_expr(expr)?;
            list.push(val)?;
        }

        Ok(Value::List(list))
    }

    fn eval_index(&mut self, source: &Expression, index: &Expression) -> Flow<Value> {
        let index = match self.eval_expr(index)? {
            Value::Integer(i) => i,
            v => {
                return Err(
                    anyhow!("Index type has to be integer but is {}", v.type_of()).into(),
                )
            }
        };

        match self.eval_expr(source)? {
            Value::List(list) => Ok(list.get(index)?.clone()),
            v => Err(anyhow!("Source type has to be list but is {}", v.type_of()).into()),
        }
    }

    fn eval_if(
        &mut self,
        cond: &Expression,
        consequence: &[Statement],
        alternative: &[Statement],
    ) -> Flow<Value> {
        let stmts = if self.eval_condition(cond)? {
            consequence
        } else {
            alternative
        };

        self.eval_scoped(stmts)
    }

    fn eval_function_literal(&mut self, func: &Rc<FunctionLiteral>) -> Value {
        if let Some(name) = &func.name {
            self.functions.insert(name.clone(), func.clone());
        }

        Value::Function(func.clone())
    }

    /// Invoke `func` with `args` evaluated in the caller's context
    ///
    /// Parameters are bound one at a time inside the new scope, so each argument is evaluated
    /// after the parameters before it have been bound.
    fn call_function(&mut self, func: &FunctionLiteral, args: &[Expression]) -> Flow<Value> {
        let name = func
            .name
            .as_ref()
            .map_or("<anonymous>", |name| name.0.as_str());

        if args.len() != func.parameters.len() {
            return Err(anyhow!(
                "Function {} takes {} argument(s) but {} were given",
                name,
                func.parameters.len(),
                args.len()
            )
            .into());
        }

        debug!("call {} with {} argument(s)", name, args.len());

        self.stack.enter_scope();
        let result = self.bind_and_run(func, args);
        self.stack.exit_scope();

        match result {
            Err(Unwind::Return(val)) => Ok(val),
            r => r,
        }
    }

    fn bind_and_run(&mut self, func: &FunctionLiteral, args: &[Expression]) -> Flow<Value> {
        for (param, arg) in func.parameters.iter().zip(args) {
            let val = self.eval_expr(arg)?;
            self.stack.declare(param.clone(), val);
        }

        self.eval_statements(&func.body)
    }

    fn eval_call(&mut self, callee: &Expression, args: &[Expression]) -> Flow<Value> {
        match self.eval_expr(callee)? {
            Value::Function(func) => self.call_function(&func, args),
            v => Err(anyhow!("Cannot call value of type {}", v.type_of()).into()),
        }
    }

    fn eval_dot_access(&mut self, source: &Expression, member: &Expression) -> Flow<Value> {
        let pkg = match self.eval_expr(source)? {
            Value::Package(pkg) => pkg,
            Value::Null => return Err(anyhow!("Source object evaluated to null").into()),
            v => {
                return Err(anyhow!(
                    "Currently only packages are allowed as dot source, got {}",
                    v.type_of()
                )
                .into())
            }
        };

        match member {
            Expression::Identifier(ident) => {
                Ok(pkg.globals.get(&ident.0).cloned().unwrap_or(Value::Null))
            }
            Expression::Call(callee, args) => {
                let ident = match &**callee {
                    Expression::Identifier(ident) => ident,
                    _ => {
                        return Err(anyhow!(
                            "You can only use identifiers for package functions"
                        )
                        .into())
                    }
                };

                let func = pkg.functions.get(&ident.0).cloned().ok_or_else(|| {
                    anyhow!("Package {} has no function {}", pkg.name, ident)
                })?;

                self.call_function(&func, args)
            }
            _ => Err(anyhow!(
                "Only globals and functions are allowed to be accessed from a package"
            )
            .into()),
        }
    }

    fn eval_expr(&mut self, expr: &Expression) -> Flow<Value> {
        match expr {
            Expression::Identifier(ident) => Ok(self.eval_identifier(ident)?),
            Expression::Constant(c) => Ok(match c {
                Constant::Integer(i) => Value::Integer(*i),
                Constant::Boolean(b) => Value::Boolean(*b),
            }),
            Expression::Str(s) => Ok(Value::String(s.clone())),
            Expression::List(exprs) => self.eval_list(exprs),
            Expression::Index(source, index) => self.eval_index(source, index),
            Expression::Prefix(op, expr) => {
                let val = self.eval_expr(expr)?;
                Ok(prefix_op(*op, val)?)
            }
            Expression::Infix(op, lhs, rhs) => {
                let lhs_val = self.eval_expr(lhs)?;
                let rhs_val = self.eval_expr(rhs)?;
                Ok(infix_op(*op, lhs_val, rhs_val)?)
            }
            Expression::IfElse(cond, consequence, alternative) => {
                self.eval_if(cond, consequence, alternative)
            }
            Expression::Function(func) => Ok(self.eval_function_literal(func)),
            Expression::Call(callee, args) => self.eval_call(callee, args),
            Expression::DotAccess(source, member) => self.eval_dot_access(source, member),
        }
    }
}

#[cfg(test)]
use super::value::Type;
#[cfg(test)]
use crate::lang::modules::{Module, Package};
#[cfg(test)]
use crate::lang::parse::parse;

#[cfg(test)]
fn run(engine: &mut Engine, input: &str) -> Value {
    engine.eval_program(&parse(input).expect("Failed to parse"))
}

#[cfg(test)]
fn eval_str(input: &str) -> Value {
    let mut engine = Engine::new(ModuleIndex::new());
    let val = run(&mut engine, input);
    assert!(!engine.has_error(), "'{}' failed: {}", input, val);
    val
}

#[cfg(test)]
fn eval_err(input: &str) -> String {
    let mut engine = Engine::new(ModuleIndex::new());
    match run(&mut engine, input) {
        Value::Error(msg) => {
            assert!(engine.has_error());
            msg
        }
        v => panic!("'{}' should have failed, got {}", input, v),
    }
}

#[test]
fn test_literals() {
    let tests = vec![
        ("5;", Value::Integer(5)),
        ("10", Value::Integer(10)),
        ("true;", Value::Boolean(true)),
        ("false", Value::Boolean(false)),
        (r#""hello";"#, Value::String("hello".to_string())),
        ("", Value::Null),
        ("let x = 1;", Value::Null),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }
}

#[test]
fn test_expression() {
    let tests = vec![
        ("1 + 3", Value::Integer(4)),
        ("1 - 3", Value::Integer(-2)),
        ("4 * 3", Value::Integer(12)),
        ("12 / 3", Value::Integer(4)),
        ("13 / 3", Value::Integer(4)),
        ("-7 / 2", Value::Integer(-3)),
        ("7 / -2", Value::Integer(-3)),
        ("-8", Value::Integer(-8)),
        ("--5", Value::Integer(5)),
        ("2 + 3 * 4 - 1", Value::Integer(13)),
        ("5 > 3", Value::Boolean(true)),
        ("9 < 7", Value::Boolean(false)),
        ("9 == 7", Value::Boolean(false)),
        ("9 == 9", Value::Boolean(true)),
        ("9 != 7", Value::Boolean(true)),
        ("9 != 9", Value::Boolean(false)),
        ("!false", Value::Boolean(true)),
        ("!true", Value::Boolean(false)),
        ("!!true", Value::Boolean(true)),
        ("!!false", Value::Boolean(false)),
        (r#""ab" + "cd""#, Value::String("abcd".to_string())),
        (r#""ab" + 3;"#, Value::String("ab3".to_string())),
        (r#"3 + "ab";"#, Value::String("3ab".to_string())),
        (r#""n=" + -4;"#, Value::String("n=-4".to_string())),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }
}

#[test]
fn test_division_matches_native() {
    for a in vec![-17i64, -9, -1, 0, 1, 5, 13, 100] {
        for b in vec![-7i64, -3, -1, 1, 2, 4, 9] {
            let val = eval_str(&format!("{} / {};", a, b));
            assert_eq!(val, Value::Integer(a / b), "{} / {}", a, b);
        }

        assert_eq!(eval_err(&format!("{} / 0;", a)), "Divide by zero");
    }
}

#[test]
fn test_operator_errors() {
    let tests = vec![
        ("!3;", "Not supported prefix operator (!) was used for type integer"),
        ("-true;", "Not supported prefix operator (-) was used for type boolean"),
        (r#"-"str";"#, "Not supported prefix operator (-) was used for type string"),
        (
            "true + false;",
            "Not supported infix operator (+) was used for type boolean",
        ),
        (
            "true == true;",
            "Not supported infix operator (==) was used for type boolean",
        ),
        (
            r#""a" - "b";"#,
            "Not supported infix operator (-) was used for type string",
        ),
        (
            r#""a" - 1;"#,
            "Type mismatch: left and right side of (-) have different types (string and integer)",
        ),
        (
            r#"2 * "a";"#,
            "Type mismatch: left and right side of (*) have different types (integer and string)",
        ),
        (
            "1 + true;",
            "Type mismatch: left and right side of (+) have different types (integer and boolean)",
        ),
        ("9223372036854775807 + 1;", "9223372036854775807 + 1 overflows"),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_err(input), expected, "{}", input);
    }
}

#[test]
fn test_variables() {
    let tests = vec![
        ("let x = 3; x;", Value::Integer(3)),
        ("let x = 3; x = x * 2; x;", Value::Integer(6)),
        ("let a = 1; let b = a + 1; b;", Value::Integer(2)),
        (
            "let foo = 3; while(foo < 10) { foo = foo + 1; }; foo;",
            Value::Integer(10),
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }

    assert_eq!(eval_err("foo;"), "Undeclared variable foo used");
    assert_eq!(
        eval_err("x = 1;"),
        "Tried to assign value to not existing variable x"
    );
    assert_eq!(
        eval_err("if(true) { let x = 3; }; x;"),
        "Undeclared variable x used"
    );
}

#[test]
fn test_outer_declaration_shadows_inner() {
    let tests = vec![
        ("let x = 1; if(true) { let x = 2; x }", Value::Integer(1)),
        (
            "let x = 1; let y = 0; while(y < 1) { let x = 5; y = y + x; }; y;",
            Value::Integer(1),
        ),
        ("let x = 1; fn f(x) { x }; f(9);", Value::Integer(1)),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }
}

#[test]
fn test_if() {
    let tests = vec![
        ("if(true) { true }", Value::Boolean(true)),
        ("if(false) { 1 } else { 2 }", Value::Integer(2)),
        ("if(false) { 1 }", Value::Null),
        ("let x = 3; if(x == 3) { x = 4; }; x;", Value::Integer(4)),
        ("let x = if(1 < 2) { 10 } else { 20 }; x;", Value::Integer(10)),
        ("if(true) { }", Value::Null),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }

    assert_eq!(
        eval_err("if(1) { 2 }"),
        "Non boolean type (integer) was returned for condition"
    );
    // Errors in the condition propagate unchanged
    assert_eq!(eval_err("if(nope) { 2 }"), "Undeclared variable nope used");
}

#[test]
fn test_while() {
    let tests = vec![
        ("let i = 0; while(i < 5) { i = i + 1; }; i;", Value::Integer(5)),
        ("let i = 0; while(false) { i = i + 1; }; i;", Value::Integer(0)),
        ("while(false) { 1 }", Value::Null),
        (
            "let i = 0; let sum = 0; while(i < 4) { let sq = i * i; sum = sum + sq; i = i + 1; }; sum;",
            Value::Integer(14),
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }

    assert_eq!(
        eval_err(r#"let i = 0; while(i) { i = i + 1; }"#),
        "Non boolean type (integer) was returned for condition"
    );
    assert_eq!(
        eval_err("let i = 0; while(i < 5) { i = i + 1; if(i == 3) { 1 / 0; }; }"),
        "Divide by zero"
    );
}

#[test]
fn test_error_stops_evaluation() {
    let mut engine = Engine::new(ModuleIndex::new());
    let val = run(&mut engine, "let a = 1; a = 1 / 0; let b = 2;");
    assert_eq!(val, Value::Error("Divide by zero".to_string()));
    assert!(engine.has_error());

    // `b` was never declared
    let val = run(&mut engine, "b;");
    assert_eq!(val, Value::Error("Undeclared variable b used".to_string()));

    // Error flag is reset by the next program
    let val = run(&mut engine, "a;");
    assert_eq!(val, Value::Integer(1));
    assert!(!engine.has_error());
}

#[test]
fn test_lists() {
    let tests = vec![
        ("[1, 2, 3][0];", Value::Integer(1)),
        ("[1, 2, 3][2];", Value::Integer(3)),
        (r#"let l = ["a", "b"]; l[1];"#, Value::String("b".to_string())),
        ("let i = 1; [10, 20][i];", Value::Integer(20)),
        ("[[1], [2, 3]][1][0];", Value::Integer(2)),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }

    let elems = vec![7i64, -3, 0, 42, 9];
    let src = format!(
        "[{}]",
        elems
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    for (j, elem) in elems.iter().enumerate() {
        assert_eq!(eval_str(&format!("{}[{}];", src, j)), Value::Integer(*elem));
    }

    let errors = vec![
        ("[1, 2][2];", "List is too small (2) for index 2"),
        ("[1, 2][-1];", "List is too small (2) for index -1"),
        ("[][0];", "List is too small (0) for index 0"),
        (
            r#"[1, "a"];"#,
            "List members have to be all of the same type, value #1 has type string instead of integer",
        ),
        (r#"[1, 2]["a"];"#, "Index type has to be integer but is string"),
        ("let x = 5; x[0];", "Source type has to be list but is integer"),
    ];

    for (input, expected) in errors {
        assert_eq!(eval_err(input), expected, "{}", input);
    }
}

#[test]
fn test_functions() {
    let tests = vec![
        ("fn foo(a, b) { a + b; }; foo(4, 5);", Value::Integer(9)),
        ("let add = fn(a, b) { a + b }; add(1, 2);", Value::Integer(3)),
        ("fn one() { 1 }; one();", Value::Integer(1)),
        ("fn f() { return 1; 2; }; f();", Value::Integer(1)),
        (
            "fn f(x) { if(x > 0) { return 1; 3; }; 2; }; f(5);",
            Value::Integer(1),
        ),
        ("fn f(x) { if(x > 0) { return 1; }; 2; }; f(0);", Value::Integer(2)),
        (
            "fn f() { let i = 0; while(true) { let step = 1; i = i + step; if(i == 3) { return i; }; }; }; f();",
            Value::Integer(3),
        ),
        // Recursion has to go through globals: a nested call's parameter never shadows the
        // caller's
        (
            "let n = 0; fn up() { n = n + 1; if(n < 5) { up(); }; n; }; up();",
            Value::Integer(5),
        ),
        ("fn f() { 1 }; let g = f; g();", Value::Integer(1)),
        ("fn f(a) { a }; f;", eval_str("fn f(a) { a };")),
        // A return in the callee doesn't cut short the caller
        ("fn f() { return 1; }; f(); 7;", Value::Integer(7)),
        ("fn f() { let x = 1; }; f();", Value::Null),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }

    let errors = vec![
        (
            "fn f(a, b) { a }; f(1);",
            "Function f takes 2 argument(s) but 1 were given",
        ),
        ("let x = 1; x();", "Cannot call value of type integer"),
        ("fn f() { nope }; f();", "Undeclared variable nope used"),
        ("fn f() { let a = 1; }; f(); a;", "Undeclared variable a used"),
    ];

    for (input, expected) in errors {
        assert_eq!(eval_err(input), expected, "{}", input);
    }
}

#[test]
fn test_scope_without_declarations_reuses_mark() {
    // The `if` reuses the call's mark, so the call exit has nothing left to drop
    let mut engine = Engine::new(ModuleIndex::new());
    let val = run(&mut engine, "fn f() { if(true) { 1 }; let a = 7; a }; f(); a;");
    assert!(!engine.has_error(), "{}", val);
    assert_eq!(val, Value::Integer(7));

    // The `if` pops the loop body's mark, so the body exit drops the call's bindings
    let errors = vec![
        (
            "fn f() { let i = 0; while(true) { i = i + 1; if(i == 3) { return i; }; }; }; f();",
            "Undeclared variable i used",
        ),
        (
            "let x = 1; fn f() { let y = 2; while(x < 3) { x = x + 1; if(true) { 0 }; }; y; }; f();",
            "Undeclared variable y used",
        ),
    ];

    for (input, expected) in errors {
        assert_eq!(eval_err(input), expected, "{}", input);
    }
}

#[test]
fn test_function_sees_call_time_bindings() {
    let tests = vec![
        // `y` doesn't exist when `f` is defined, only when it is called
        ("fn f() { y }; let y = 4; f();", Value::Integer(4)),
        // Parameters bound earlier are visible to later arguments
        ("fn f(a, b) { b }; f(10, a);", Value::Integer(10)),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }
}

#[test]
fn test_top_level_return() {
    let tests = vec![
        ("return 5; 6;", Value::Integer(5)),
        ("let x = 2; if(x == 2) { return x; }; 9;", Value::Integer(2)),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_str(input), expected, "{}", input);
    }
}

#[cfg(test)]
fn math_modules() -> ModuleIndex {
    let program = parse("fn add(a, b) { a + b }; fn scale(a) { a * factor };")
        .expect("Failed to parse");
    let funcs: Vec<Rc<FunctionLiteral>> = program
        .statements
        .into_iter()
        .map(|s| match s {
            Statement::Expression(Expression::Function(f)) => f,
            s => panic!("Expected function, got {:?}", s),
        })
        .collect();

    let mut modules = ModuleIndex::new();
    modules.insert(
        Module::new("math").with_package(
            Package::new("math")
                .with_global("pi", Value::Integer(3))
                .with_function("add", funcs[0].clone())
                .with_function("scale", funcs[1].clone()),
        ),
    );
    modules.insert(Module::new("std").with_package(Package::new("io")));

    modules
}

#[test]
fn test_import() {
    let tests = vec![
        ("import math; math.pi;", Value::Integer(3)),
        ("import math; math.e;", Value::Null),
        ("import math; math.add(2, 3);", Value::Integer(5)),
        ("import math; math.add(math.pi, 1);", Value::Integer(4)),
        // Package functions resolve free names at call time too
        ("import math; let factor = 10; math.scale(2);", Value::Integer(20)),
        ("import math, std/io; math.pi;", Value::Integer(3)),
        ("if(true) { import math; math.pi }", Value::Integer(3)),
    ];

    for (input, expected) in tests {
        assert_eq!(eval_with(math_modules(), input), expected, "{}", input);
    }

    assert_eq!(
        eval_with(math_modules(), "import std/io; io;").to_string(),
        "package io"
    );

    let errors = vec![
        ("import nope;", "Module nope does not exist"),
        ("import std/net;", "Package net does not exist in module std"),
        (
            "import std/io/file;",
            "Hierarchical package paths are not supported: std/io/file",
        ),
        ("if(true) { import math; }; math.pi;", "Undeclared variable math used"),
        ("import math; math.sub(1, 2);", "Package math has no function sub"),
        (
            "import math; math.add(1);",
            "Function add takes 2 argument(s) but 1 were given",
        ),
        (
            "let x = 1; x.y;",
            "Currently only packages are allowed as dot source, got integer",
        ),
        ("import math; math.add(1, 2)(3);", "Cannot call value of type integer"),
    ];

    for (input, expected) in errors {
        let mut engine = Engine::new(math_modules());
        assert_eq!(
            run(&mut engine, input),
            Value::Error(expected.to_string()),
            "{}",
            input
        );
        assert!(engine.has_error());
    }
}

#[cfg(test)]
fn eval_with(modules: ModuleIndex, input: &str) -> Value {
    let mut engine = Engine::new(modules);
    let val = run(&mut engine, input);
    assert!(!engine.has_error(), "'{}' failed: {}", input, val);
    val
}

#[test]
fn test_import_is_a_snapshot() {
    let mut engine = Engine::new(math_modules());
    run(&mut engine, "import math;");
    assert!(!engine.has_error());

    // Replacing the binding leaves the module index alone
    run(&mut engine, "math = 1;");
    assert!(!engine.has_error());
    assert_eq!(run(&mut engine, "import math; math;").type_of(), Type::Integer);
    assert_eq!(
        engine
            .modules
            .resolve("math")
            .expect("Missing math")
            .globals
            .get("pi"),
        Some(&Value::Integer(3))
    );
}

#[test]
fn test_unsupported_dot_member() {
    let mut engine = Engine::new(math_modules());
    let source = Box::new(Expression::Identifier(Identifier("math".to_string())));
    let program = Program {
        statements: vec![
            Statement::Import(vec!["math".to_string()]),
            Statement::Expression(Expression::DotAccess(
                source.clone(),
                Box::new(Expression::Constant(Constant::Integer(1))),
            )),
        ],
    };
    assert_eq!(
        engine.eval_program(&program),
        Value::Error(
            "Only globals and functions are allowed to be accessed from a package".to_string()
        )
    );

    let program = Program {
        statements: vec![Statement::Expression(Expression::DotAccess(
            source,
            Box::new(Expression::Call(
                Box::new(Expression::Constant(Constant::Integer(1))),
                vec![],
            )),
        ))],
    };
    assert_eq!(
        engine.eval_program(&program),
        Value::Error("You can only use identifiers for package functions".to_string())
    );
}
