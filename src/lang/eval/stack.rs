use anyhow::{bail, Result};
use log::trace;

use super::value::Value;
use crate::lang::ast::Identifier;

struct Binding {
    name: Identifier,
    value: Value,
}

/// Flat call stack
///
/// All live bindings sit in one growable array. Scopes are not separate maps: entering a scope
/// records the current binding count as a frame mark, and exiting truncates the array back to the
/// most recent mark.
///
/// Lookups scan from the oldest binding to the newest, so when a name is declared more than once
/// the *outermost* declaration is the one that is seen.
pub struct CallStack {
    bindings: Vec<Binding>,
    /// Offsets into `bindings`. Non-decreasing, and the last mark is never past the end of
    /// `bindings`.
    marks: Vec<usize>,
}

impl CallStack {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Open a new scope
    ///
    /// If nothing has been declared since the last mark was pushed, no new mark is pushed. The
    /// matching `exit_scope()` then pops the enclosing scope's mark instead. That leaves the
    /// enclosing scope without a mark of its own: its bindings outlive it if no further mark
    /// is below, or are torn down one `exit_scope()` early if one is.
    pub fn enter_scope(&mut self) {
        let len = self.bindings.len();
        if self.marks.last() != Some(&len) {
            self.marks.push(len);
        }

        trace!("enter scope: marks={:?}", self.marks);
    }

    /// Close the innermost scope, dropping every binding declared since it was opened
    ///
    /// No-op if there is no open scope
    pub fn exit_scope(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }

        trace!(
            "exit scope: marks={:?} bindings={}",
            self.marks,
            self.bindings.len()
        );
    }

    pub fn declare(&mut self, name: Identifier, value: Value) {
        trace!("declare {} = {}", name, value);
        self.bindings.push(Binding { name, value });
    }

    pub fn assign(&mut self, name: &Identifier, value: Value) -> Result<()> {
        match self.bindings.iter_mut().find(|b| &b.name == name) {
            Some(binding) => {
                binding.value = value;
                Ok(())
            }
            None => bail!("Tried to assign value to not existing variable {}", name),
        }
    }

    pub fn lookup(&self, name: &Identifier) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|b| &b.name == name)
            .map(|b| &b.value)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
fn ident(name: &str) -> Identifier {
    Identifier(name.to_string())
}

#[test]
fn test_scope_truncates() {
    let mut stack = CallStack::new();
    stack.declare(ident("a"), Value::Integer(1));

    stack.enter_scope();
    stack.declare(ident("b"), Value::Integer(2));
    stack.declare(ident("c"), Value::Integer(3));
    assert_eq!(stack.len(), 3);
    assert_eq!(stack.lookup(&ident("c")), Some(&Value::Integer(3)));

    stack.exit_scope();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.lookup(&ident("a")), Some(&Value::Integer(1)));
    assert_eq!(stack.lookup(&ident("b")), None);
    assert_eq!(stack.lookup(&ident("c")), None);
}

#[test]
fn test_empty_scopes_are_deduplicated() {
    let mut stack = CallStack::new();
    stack.declare(ident("a"), Value::Integer(1));

    // Two entries with no declarations in between share one mark
    stack.enter_scope();
    stack.enter_scope();
    assert_eq!(stack.marks, vec![1]);

    stack.declare(ident("b"), Value::Integer(2));
    stack.exit_scope();
    assert_eq!(stack.len(), 1);

    // Second exit has nothing left to pop
    stack.exit_scope();
    assert_eq!(stack.len(), 1);
    assert!(stack.marks.is_empty());
}

#[test]
fn test_exit_without_scope() {
    let mut stack = CallStack::new();
    stack.declare(ident("a"), Value::Boolean(true));
    stack.exit_scope();
    stack.exit_scope();
    assert_eq!(stack.lookup(&ident("a")), Some(&Value::Boolean(true)));
}

#[test]
fn test_oldest_binding_wins() {
    let mut stack = CallStack::new();
    stack.declare(ident("x"), Value::Integer(1));
    stack.enter_scope();
    stack.declare(ident("x"), Value::Integer(2));

    assert_eq!(stack.lookup(&ident("x")), Some(&Value::Integer(1)));

    // Assignment also hits the oldest binding
    stack.assign(&ident("x"), Value::Integer(3)).expect("Failed to assign");
    assert_eq!(stack.lookup(&ident("x")), Some(&Value::Integer(3)));
    stack.exit_scope();
    assert_eq!(stack.lookup(&ident("x")), Some(&Value::Integer(3)));
}

#[test]
fn test_assign_undeclared() {
    let mut stack = CallStack::new();
    let err = stack
        .assign(&ident("nope"), Value::Integer(1))
        .expect_err("Assignment should fail");
    assert_eq!(
        err.to_string(),
        "Tried to assign value to not existing variable nope"
    );
}
