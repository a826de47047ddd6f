use std::io::Write;

use log::info;

use crate::lang::eval::value::Value;
use crate::lang::eval::Engine;
use crate::lang::modules::ModuleIndex;
use crate::lang::parse::parse;

#[derive(Debug, PartialEq)]
pub enum EvalResult {
    Ok(Value),
    Err(String),
}

pub struct Runtime<'a> {
    engine: Engine,
    sink: &'a mut dyn Write,
    interactive: bool,
}

impl<'a> Runtime<'a> {
    /// Create a new `Runtime` instance
    ///
    /// `sink` is where output should be written. eg. the value of the last expression
    ///
    /// `interactive` sets whether or not the resulting value should be printed (useful when
    /// human is at a REPL)
    ///
    /// `modules` is every module `import` statements may refer to
    pub fn new(sink: &'a mut dyn Write, interactive: bool, modules: ModuleIndex) -> Self {
        Self {
            engine: Engine::new(modules),
            sink,
            interactive,
        }
    }

    /// Evaluate `src` as a program
    ///
    /// Bindings and named functions persist across calls.
    pub fn eval(&mut self, src: &str) -> EvalResult {
        // Parse input into AST
        let program = match parse(src) {
            Ok(p) => p,
            Err(e) => return EvalResult::Err(e.to_string()),
        };
        info!("parsed {} statement(s)", program.statements.len());

        // Evaluate AST
        let value = self.engine.eval_program(&program);
        if self.engine.has_error() {
            return match value {
                Value::Error(msg) => EvalResult::Err(msg),
                v => EvalResult::Err(v.to_string()),
            };
        }

        if self.interactive && !value.is_null() {
            if let Err(e) = writeln!(self.sink, "{}", value) {
                return EvalResult::Err(format!("Failed to write result: {}", e));
            }
        }

        EvalResult::Ok(value)
    }
}

#[cfg(test)]
fn run_session(inputs: &[&str], interactive: bool) -> (Vec<EvalResult>, String) {
    let mut output = Vec::new();
    let mut results = Vec::new();
    {
        let mut runtime = Runtime::new(&mut output, interactive, ModuleIndex::new());
        for input in inputs {
            results.push(runtime.eval(input));
        }
    }

    let output = String::from_utf8(output).expect("Output is not UTF-8");
    (results, output)
}

#[test]
fn test_session_persists() {
    let inputs = vec![
        "let x = 5;",
        "fn double(a) { a * 2 }",
        "double(x);",
        "x = double(x); x;",
    ];
    let (results, output) = run_session(&inputs, true);

    let function = match &results[1] {
        EvalResult::Ok(v) => v.to_string(),
        r => panic!("Unexpected result {:?}", r),
    };
    assert_eq!(function, "fn double(a)");
    assert_eq!(results[0], EvalResult::Ok(Value::Null));
    assert_eq!(results[2], EvalResult::Ok(Value::Integer(10)));
    assert_eq!(results[3], EvalResult::Ok(Value::Integer(10)));
    assert_eq!(output, "fn double(a)\n10\n10\n");
}

#[test]
fn test_errors() {
    let inputs = vec!["let x = 1;", "x + true;", "let = 3;", "x;"];
    let (results, output) = run_session(&inputs, true);

    assert_eq!(
        results[1],
        EvalResult::Err(
            "Type mismatch: left and right side of (+) have different types (integer and boolean)"
                .to_string()
        )
    );
    match &results[2] {
        EvalResult::Err(_) => (),
        r => panic!("Parse should have failed, got {:?}", r),
    }
    // Errors leave the session usable
    assert_eq!(results[3], EvalResult::Ok(Value::Integer(1)));
    assert_eq!(output, "1\n");
}

#[test]
fn test_non_interactive() {
    let inputs = vec![r#""hello" + " " + "world";"#, "1 / 0;"];
    let (results, output) = run_session(&inputs, false);

    assert_eq!(
        results[0],
        EvalResult::Ok(Value::String("hello world".to_string()))
    );
    assert_eq!(results[1], EvalResult::Err("Divide by zero".to_string()));
    assert!(output.is_empty());
}

#[test]
fn test_error_inside_function() {
    let (results, _) = run_session(&["fn f() { [1][3] }; f();"], true);
    assert_eq!(
        results[0],
        EvalResult::Err("List is too small (1) for index 3".to_string())
    );
}
