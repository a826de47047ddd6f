use std::convert::TryFrom;
use std::fmt;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};

use crate::lang::ast::FunctionLiteral;
use crate::lang::modules::Package;

/// Runtime type tag of a `Value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Integer,
    Boolean,
    String,
    List,
    Function,
    Package,
    Error,
    Null,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Integer => "integer",
            Type::Boolean => "boolean",
            Type::String => "string",
            Type::List => "list",
            Type::Function => "function",
            Type::Package => "package",
            Type::Error => "error",
            Type::Null => "null",
        };

        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    String(String),
    List(List),
    /// Functions capture nothing. Free names in the body resolve against the call stack at the
    /// time of the call.
    Function(Rc<FunctionLiteral>),
    /// Snapshot of a package taken at import time
    Package(Rc<Package>),
    Error(String),
    Null,
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Integer(_) => Type::Integer,
            Value::Boolean(_) => Type::Boolean,
            Value::String(_) => Type::String,
            Value::List(_) => Type::List,
            Value::Function(_) => Type::Function,
            Value::Package(_) => Type::Package,
            Value::Error(_) => Type::Error,
            Value::Null => Type::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::String(s) => write!(f, "{}", s),
            Value::List(list) => write!(f, "{}", list),
            Value::Function(func) => {
                let params = func
                    .parameters
                    .iter()
                    .map(|p| p.0.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                match &func.name {
                    Some(name) => write!(f, "fn {}({})", name, params),
                    None => write!(f, "fn({})", params),
                }
            }
            Value::Package(pkg) => write!(f, "package {}", pkg.name),
            Value::Error(msg) => write!(f, "Error: {}", msg),
            Value::Null => write!(f, "null"),
        }
    }
}

/// Homogeneous list
///
/// The element type is fixed by the first element pushed. Pushing anything of a different type
/// fails, so a `List` that exists is always well typed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct List {
    elem_type: Option<Type>,
    items: Vec<Value>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: Value) -> Result<()> {
        let ty = val.type_of();
        match self.elem_type {
            None => self.elem_type = Some(ty),
            Some(elem_type) if elem_type != ty => bail!(
                "List members have to be all of the same type, value #{} has type {} instead of {}",
                self.items.len(),
                ty,
                elem_type
            ),
            Some(_) => (),
        }

        self.items.push(val);
        Ok(())
    }

    /// Type of every element, or `None` for an empty list
    #[cfg(test)]
    pub fn elem_type(&self) -> Option<Type> {
        self.elem_type
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, index: i64) -> Result<&Value> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.items.get(i))
            .ok_or_else(|| anyhow!("List is too small ({}) for index {}", self.len(), index))
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self
            .items
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        write!(f, "[{}]", items)
    }
}

#[cfg(test)]
fn list_of(values: Vec<Value>) -> Result<List> {
    let mut list = List::new();
    for v in values {
        list.push(v)?;
    }

    Ok(list)
}

#[test]
fn test_display() {
    use crate::lang::ast::Identifier;

    let func = FunctionLiteral {
        name: Some(Identifier("add".to_string())),
        parameters: vec![Identifier("a".to_string()), Identifier("b".to_string())],
        body: Vec::new(),
    };
    let anon = FunctionLiteral {
        name: None,
        parameters: Vec::new(),
        body: Vec::new(),
    };

    let tests = vec![
        (Value::Integer(-3), "-3"),
        (Value::Boolean(false), "false"),
        (Value::String("hi".to_string()), "hi"),
        (
            Value::List(
                list_of(vec![Value::Integer(1), Value::Integer(2)]).expect("Failed to build list"),
            ),
            "[1, 2]",
        ),
        (Value::List(List::new()), "[]"),
        (Value::Function(Rc::new(func)), "fn add(a, b)"),
        (Value::Function(Rc::new(anon)), "fn()"),
        (Value::Package(Rc::new(Package::new("math"))), "package math"),
        (Value::Error("boom".to_string()), "Error: boom"),
        (Value::Null, "null"),
    ];

    for (value, expected) in tests {
        assert_eq!(value.to_string(), expected);
    }
}

#[test]
fn test_list_is_homogeneous() {
    let list = list_of(vec![
        Value::String("a".to_string()),
        Value::String("b".to_string()),
    ])
    .expect("Failed to build list");
    assert_eq!(list.elem_type(), Some(Type::String));
    assert_eq!(list.len(), 2);

    let err = list_of(vec![
        Value::Integer(1),
        Value::Integer(2),
        Value::Boolean(true),
    ])
    .expect_err("Mixed list should fail");
    assert_eq!(
        err.to_string(),
        "List members have to be all of the same type, value #2 has type boolean instead of integer"
    );

    assert_eq!(List::new().elem_type(), None);
}

#[test]
fn test_list_get() {
    let list = list_of(vec![Value::Integer(10), Value::Integer(20)]).expect("Failed to build list");

    assert_eq!(list.get(0).expect("In range"), &Value::Integer(10));
    assert_eq!(list.get(1).expect("In range"), &Value::Integer(20));
    for index in vec![2, 100, -1] {
        let err = list.get(index).expect_err("Out of range");
        assert_eq!(
            err.to_string(),
            format!("List is too small (2) for index {}", index)
        );
    }
}
