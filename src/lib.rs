//! Query and transformation expressions over JSON-like data.
//!
//! An expression is compiled once into an AST and may then be evaluated
//! against any number of inputs. Evaluation distinguishes *absence* (a
//! path that matched nothing, a function applied to a missing value) from
//! JSON `null`; absence flows through operators and function calls instead
//! of raising errors.
//!
//! ```
//! use jsonata_eval::{Expression, Value};
//!
//! let expr = Expression::compile("$lowercase(name)").unwrap();
//! let data: Value = serde_json::json!({"name": "ALICE"}).into();
//! assert_eq!(expr.evaluate(&data).unwrap(), Value::string("alice"));
//! ```

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod signature;
pub mod value;

use thiserror::Error;

pub use crate::ast::AstNode;
pub use crate::evaluator::{EvaluateError, Evaluator};
pub use crate::functions::FunctionError;
pub use crate::parser::ParserError;
pub use crate::value::Value;

/// Top-level error: a compile-time parse failure or a runtime
/// evaluation failure.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("Evaluation error: {0}")]
    Evaluate(#[from] EvaluateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A compiled expression, reusable across evaluations.
#[derive(Debug, Clone)]
pub struct Expression {
    ast: AstNode,
}

impl Expression {
    /// Parse an expression string into a reusable compiled form.
    pub fn compile(expression: &str) -> Result<Self, Error> {
        let ast = parser::parse(expression)?;
        Ok(Expression { ast })
    }

    /// Evaluate against a data value. A result of `Value::Undefined` means
    /// the expression matched nothing; it is not an error.
    pub fn evaluate(&self, data: &Value) -> Result<Value, Error> {
        let mut evaluator = Evaluator::new();
        Ok(evaluator.evaluate(&self.ast, data)?)
    }

    /// Evaluate against a `serde_json::Value` input.
    pub fn evaluate_json(&self, data: &serde_json::Value) -> Result<Value, Error> {
        self.evaluate(&Value::from(data.clone()))
    }

    /// String-in, string-out convenience: the input is a JSON document,
    /// the output compact JSON. A result of no value is `None`.
    pub fn evaluate_str(&self, json: &str) -> Result<Option<String>, Error> {
        let data = Value::from_json_str(json)?;
        let result = self.evaluate(&data)?;
        if result.is_undefined() {
            return Ok(None);
        }
        Ok(Some(result.to_json_string()?))
    }

    /// The compiled AST.
    pub fn ast(&self) -> &AstNode {
        &self.ast
    }
}

/// One-shot convenience: compile and evaluate in a single call.
pub fn evaluate(expression: &str, data: &Value) -> Result<Value, Error> {
    Expression::compile(expression)?.evaluate(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_once_evaluate_many() {
        let expr = Expression::compile("value + 1").unwrap();
        for i in 0..3 {
            let data = Value::from(serde_json::json!({ "value": i }));
            assert_eq!(expr.evaluate(&data).unwrap(), Value::Int(i + 1));
        }
    }

    #[test]
    fn test_one_shot_evaluate() {
        let data = Value::from(serde_json::json!({"x": 2}));
        assert_eq!(evaluate("x * 3", &data).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            Expression::compile("1 +").unwrap_err(),
            Error::Parse(_)
        ));
    }

    #[test]
    fn test_evaluate_str_round_trip() {
        let expr = Expression::compile("items[price < 10]").unwrap();
        let out = expr
            .evaluate_str(r#"{"items": [{"price": 5}, {"price": 20}]}"#)
            .unwrap();
        assert_eq!(out.as_deref(), Some(r#"{"price":5}"#));
        // No match: no output rather than "null"
        let out = expr.evaluate_str(r#"{"items": []}"#).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_evaluate_json_input() {
        let expr = Expression::compile("$uppercase(name)").unwrap();
        let result = expr
            .evaluate_json(&serde_json::json!({"name": "bob"}))
            .unwrap();
        assert_eq!(result, Value::string("BOB"));
    }
}
