// Expression evaluator
//
// Tree-walking visitor over the AST: path navigation with sequence
// semantics, operators, and the function-call engine (context fallback,
// arity/type validation against the signature registry, absence
// propagation, and the context-rebinding call form).

use indexmap::IndexMap;
use thiserror::Error;

use crate::ast::{AstNode, BinaryOp, PathStep, Stage, UnaryOp};
use crate::functions::boolean::boolean_of;
use crate::functions::string::string_of;
use crate::functions::{self, ArityKind, FunctionError};
use crate::value::Value;

/// Evaluator errors
///
/// Function-call failures carry the structured FunctionError taxonomy;
/// the remaining variants cover operator misuse, unknown names, and
/// evaluation limits.
#[derive(Error, Debug, PartialEq)]
pub enum EvaluateError {
    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Reference error: {0}")]
    ReferenceError(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),
}

/// The implicit-context stack: the value `$` refers to, and the value a
/// function call may draw its omitted leading argument from.
///
/// Push/pop is strictly nested. The evaluator only manipulates it through
/// scoped helpers so every frame pushed is popped on every exit path,
/// including error propagation.
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<Value>,
}

impl ContextStack {
    pub fn new() -> Self {
        ContextStack { frames: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.frames.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.frames.pop()
    }

    /// Current implicit context; no value when the stack is empty.
    pub fn top(&self) -> Value {
        self.frames.last().cloned().unwrap_or(Value::Undefined)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Evaluator for parsed expressions
///
/// One evaluator drives one logical evaluation at a time; it owns the
/// context stack, so concurrent evaluations need separate instances.
/// The AST and the builtin registry are read-only and freely shared.
pub struct Evaluator {
    context: ContextStack,
    recursion_depth: usize,
    max_recursion_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            context: ContextStack::new(),
            recursion_depth: 0,
            // Bounds tree recursion to prevent stack overflow on
            // pathologically nested expressions
            max_recursion_depth: 512,
        }
    }

    /// Current context stack depth (exposed for stack-discipline checks).
    pub fn context_depth(&self) -> usize {
        self.context.depth()
    }

    /// Evaluate an AST node against data.
    ///
    /// The root data becomes the initial implicit context; the frame is
    /// released before returning, error or not.
    pub fn evaluate(&mut self, node: &AstNode, data: &Value) -> Result<Value, EvaluateError> {
        self.with_context(data, |ev| ev.evaluate_internal(node, data))
    }

    /// Evaluate a sub-tree against a temporarily substituted context.
    ///
    /// This is the generic service behind the context-rebinding call form:
    /// the value is pushed as the new implicit context, the sub-tree is
    /// evaluated, and the frame is popped on every exit path. Builtins do
    /// not get special-cased access to the stack; they go through here.
    pub fn evaluate_with_context(
        &mut self,
        node: &AstNode,
        context: &Value,
    ) -> Result<Value, EvaluateError> {
        self.with_context(context, |ev| ev.evaluate_internal(node, context))
    }

    /// Run `f` with `value` pushed as the implicit context. The pop is
    /// unconditional: errors returned by `f` propagate only after the
    /// frame is released.
    fn with_context<R>(&mut self, value: &Value, f: impl FnOnce(&mut Self) -> R) -> R {
        self.context.push(value.clone());
        let result = f(self);
        self.context.pop();
        result
    }

    fn evaluate_internal(&mut self, node: &AstNode, data: &Value) -> Result<Value, EvaluateError> {
        self.recursion_depth += 1;
        if self.recursion_depth > self.max_recursion_depth {
            self.recursion_depth -= 1;
            return Err(EvaluateError::EvaluationError(format!(
                "Stack overflow - maximum recursion depth ({}) exceeded",
                self.max_recursion_depth
            )));
        }

        let result = self.evaluate_node(node, data);

        self.recursion_depth -= 1;
        result
    }

    fn evaluate_node(&mut self, node: &AstNode, data: &Value) -> Result<Value, EvaluateError> {
        match node {
            AstNode::Str(s) => Ok(Value::string(s.as_str())),
            AstNode::Int(n) => Ok(Value::Int(*n)),
            AstNode::Float(n) => Ok(Value::Float(*n)),
            AstNode::Bool(b) => Ok(Value::Bool(*b)),
            AstNode::Null => Ok(Value::Null),

            // $ — the implicit context value
            AstNode::Context => Ok(self.context.top()),

            AstNode::Name(field) => Ok(Self::navigate_field(field, data)),

            AstNode::Wildcard => Ok(Self::navigate_wildcard(data)),

            AstNode::Descendant => {
                let mut out = Vec::new();
                Self::collect_descendants(data, &mut out);
                Ok(sequence_result(out))
            }

            AstNode::Path { steps } => self.evaluate_path(steps, data),

            AstNode::Binary { op, lhs, rhs } => self.evaluate_binary(*op, lhs, rhs, data),

            AstNode::Unary { op, operand } => {
                let value = self.evaluate_internal(operand, data)?;
                match op {
                    UnaryOp::Negate => match value {
                        Value::Undefined => Ok(Value::Undefined),
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(EvaluateError::TypeError(format!(
                            "Cannot negate a non-numeric value: {}",
                            other
                        ))),
                    },
                }
            }

            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.evaluate_internal(condition, data)?;
                if boolean_of(&cond) {
                    self.evaluate_internal(then_branch, data)
                } else if let Some(else_branch) = else_branch {
                    self.evaluate_internal(else_branch, data)
                } else {
                    Ok(Value::Undefined)
                }
            }

            AstNode::Array(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.evaluate_internal(element, data)?;
                    // Absence never appears inside a constructed array
                    if !value.is_undefined() {
                        out.push(value);
                    }
                }
                Ok(Value::array(out))
            }

            AstNode::Object(pairs) => {
                let mut out = IndexMap::with_capacity(pairs.len());
                for (key_node, value_node) in pairs {
                    let key = self.evaluate_internal(key_node, data)?;
                    let key = key.as_str().map(str::to_string).ok_or_else(|| {
                        EvaluateError::TypeError(format!(
                            "Object key must be a string, got {}",
                            key
                        ))
                    })?;
                    let value = self.evaluate_internal(value_node, data)?;
                    // Members whose value is absent are omitted
                    if !value.is_undefined() {
                        out.insert(key, value);
                    }
                }
                Ok(Value::object(out))
            }

            AstNode::Function { name, args } => self.evaluate_function_call(name, args, data),
        }
    }

    // ── Path navigation ──────────────────────────────────────────────────────

    fn evaluate_path(&mut self, steps: &[PathStep], data: &Value) -> Result<Value, EvaluateError> {
        let mut current = data.clone();
        for step in steps {
            current = self.evaluate_step(step, &current)?;
            if current.is_undefined() {
                return Ok(Value::Undefined);
            }
        }
        Ok(current)
    }

    fn evaluate_step(&mut self, step: &PathStep, input: &Value) -> Result<Value, EvaluateError> {
        let mut value = match &step.node {
            // Navigational steps handle array mapping themselves
            AstNode::Name(field) => Self::navigate_field(field, input),
            AstNode::Wildcard => Self::navigate_wildcard(input),
            AstNode::Descendant => {
                let mut out = Vec::new();
                Self::collect_descendants(input, &mut out);
                sequence_result(out)
            }
            // Arbitrary head expression (e.g. a constructed array or a
            // function call carrying a predicate)
            other => self.with_context(input, |ev| ev.evaluate_internal(other, input))?,
        };

        for stage in &step.stages {
            let Stage::Filter(predicate) = stage;
            value = self.apply_filter(predicate, &value)?;
            if value.is_undefined() {
                break;
            }
        }
        Ok(value)
    }

    fn navigate_field(field: &str, data: &Value) -> Value {
        match data {
            Value::Object(obj) => obj.get(field).cloned().unwrap_or(Value::Undefined),
            Value::Array(arr) => {
                // Map over the sequence, flattening one level and
                // dropping elements that produce no value
                let mut out = Vec::new();
                for item in arr.iter() {
                    append_sequence(&mut out, Self::navigate_field(field, item));
                }
                sequence_result(out)
            }
            _ => Value::Undefined,
        }
    }

    fn navigate_wildcard(data: &Value) -> Value {
        match data {
            Value::Object(obj) => {
                let mut out = Vec::new();
                for value in obj.values() {
                    append_sequence(&mut out, value.clone());
                }
                sequence_result(out)
            }
            Value::Array(arr) => {
                let mut out = Vec::new();
                for item in arr.iter() {
                    append_sequence(&mut out, Self::navigate_wildcard(item));
                }
                sequence_result(out)
            }
            _ => Value::Undefined,
        }
    }

    /// Recursively collect every nested value. Objects are included
    /// themselves; arrays are traversed but not collected.
    fn collect_descendants(value: &Value, out: &mut Vec<Value>) {
        match value {
            Value::Undefined | Value::Null => {}
            Value::Object(obj) => {
                out.push(value.clone());
                for val in obj.values() {
                    Self::collect_descendants(val, out);
                }
            }
            Value::Array(arr) => {
                for val in arr.iter() {
                    Self::collect_descendants(val, out);
                }
            }
            _ => out.push(value.clone()),
        }
    }

    /// Apply a predicate stage: a numeric result selects by position
    /// (negative counts from the end), anything else filters by
    /// truthiness. The predicate is evaluated once per element with that
    /// element as the implicit context.
    fn apply_filter(
        &mut self,
        predicate: &AstNode,
        value: &Value,
    ) -> Result<Value, EvaluateError> {
        if value.is_undefined() {
            return Ok(Value::Undefined);
        }
        let items: Vec<Value> = match value {
            Value::Array(arr) => arr.as_ref().clone(),
            other => vec![other.clone()],
        };
        let len = items.len() as i64;

        let mut out = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let result = self.with_context(item, |ev| ev.evaluate_internal(predicate, item))?;
            let keep = match result.as_f64() {
                Some(n) => {
                    let mut index = n.floor() as i64;
                    if index < 0 {
                        index += len;
                    }
                    index == i as i64
                }
                None => boolean_of(&result),
            };
            if keep {
                append_sequence(&mut out, item.clone());
            }
        }
        Ok(sequence_result(out))
    }

    // ── Operators ────────────────────────────────────────────────────────────

    fn evaluate_binary(
        &mut self,
        op: BinaryOp,
        lhs: &AstNode,
        rhs: &AstNode,
        data: &Value,
    ) -> Result<Value, EvaluateError> {
        let left = self.evaluate_internal(lhs, data)?;
        let right = self.evaluate_internal(rhs, data)?;

        match op {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => Self::numeric_binop(op, &left, &right),

            BinaryOp::Equal => Ok(Value::Bool(left == right)),
            BinaryOp::NotEqual => Ok(Value::Bool(left != right)),

            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => Self::compare(op, &left, &right),

            BinaryOp::And => Ok(Value::Bool(boolean_of(&left) && boolean_of(&right))),
            BinaryOp::Or => Ok(Value::Bool(boolean_of(&left) || boolean_of(&right))),

            BinaryOp::Concatenate => {
                let mut s = String::new();
                if !left.is_undefined() {
                    s.push_str(&string_of(&left));
                }
                if !right.is_undefined() {
                    s.push_str(&string_of(&right));
                }
                Ok(Value::string(s))
            }

            BinaryOp::In => {
                if left.is_undefined() || right.is_undefined() {
                    return Ok(Value::Bool(false));
                }
                match &right {
                    Value::Array(arr) => Ok(Value::Bool(arr.iter().any(|v| *v == left))),
                    other => Ok(Value::Bool(left == *other)),
                }
            }
        }
    }

    /// Arithmetic preserving the Int sub-kind: two Int operands stay Int
    /// (promoting to Float on overflow); division is inherently floating.
    fn numeric_binop(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluateError> {
        if left.is_undefined() || right.is_undefined() {
            return Ok(Value::Undefined);
        }
        if !left.is_number() || !right.is_number() {
            return Err(EvaluateError::TypeError(format!(
                "Arithmetic requires numeric operands, got {} and {}",
                left, right
            )));
        }

        if let (Value::Int(a), Value::Int(b)) = (left, right) {
            let int_result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::Modulo if *b != 0 => Some(a % b),
                _ => None,
            };
            if let Some(n) = int_result {
                return Ok(Value::Int(n));
            }
        }

        let a = left.as_f64().unwrap_or(0.0);
        let b = right.as_f64().unwrap_or(0.0);
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Modulo => a % b,
            _ => unreachable!("non-arithmetic op in numeric_binop"),
        };
        Ok(Value::Float(result))
    }

    fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluateError> {
        if left.is_undefined() || right.is_undefined() {
            return Ok(Value::Undefined);
        }
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => {
                    return Err(EvaluateError::TypeError(format!(
                        "Cannot compare {} and {}",
                        left, right
                    )))
                }
            },
        };
        let result = match ordering {
            None => false, // NaN comparisons
            Some(ord) => match op {
                BinaryOp::LessThan => ord.is_lt(),
                BinaryOp::LessThanOrEqual => ord.is_le(),
                BinaryOp::GreaterThan => ord.is_gt(),
                BinaryOp::GreaterThanOrEqual => ord.is_ge(),
                _ => unreachable!("non-comparison op in compare"),
            },
        };
        Ok(Value::Bool(result))
    }

    // ── Function calls ───────────────────────────────────────────────────────

    /// Resolve and invoke a built-in call.
    ///
    /// Argument resolution order: context fallback for an omitted leading
    /// argument, arity check against the declared signature, absence
    /// propagation for the leading argument, then per-position type
    /// narrowing. Only then does the registered implementation run.
    fn evaluate_function_call(
        &mut self,
        name: &str,
        args: &[AstNode],
        data: &Value,
    ) -> Result<Value, EvaluateError> {
        let builtin = functions::lookup(name).ok_or_else(|| {
            EvaluateError::ReferenceError(format!("Unknown function: ${}", name))
        })?;
        let signature = &builtin.signature;

        // One extra trailing argument on a rebind-capable function is a
        // dependent sub-expression, not an arity error
        if builtin.rebind && args.len() == signature.max_args as usize + 1 {
            return self.apply_with_rebound_context(builtin, args, data);
        }

        // The leading argument may be drawn from the context only when the
        // caller omitted it entirely
        let use_context =
            signature.context_fallback_eligible() && args.len() < signature.min_args as usize;

        let mut resolved: Vec<Value> = Vec::with_capacity(args.len() + 1);
        if use_context {
            resolved.push(self.context.top());
        }
        for arg in args {
            resolved.push(self.evaluate_internal(arg, data)?);
        }

        let effective = resolved.len();
        if effective < signature.min_args as usize {
            if effective == 0 {
                return Err(FunctionError::BadContext {
                    function: name.to_string(),
                }
                .into());
            }
            return Err(FunctionError::Arity {
                function: name.to_string(),
                kind: ArityKind::TooFew,
            }
            .into());
        }
        if effective > signature.max_args as usize {
            return Err(FunctionError::Arity {
                function: name.to_string(),
                kind: ArityKind::TooMany,
            }
            .into());
        }

        // A leading argument that produced no value makes the whole call
        // produce no value; this is not an error
        if resolved[0].is_undefined() {
            return Ok(Value::Undefined);
        }

        for (i, value) in resolved.iter().enumerate() {
            if !signature.param_at(i).accepts(value) {
                if i == 0 && use_context {
                    return Err(FunctionError::BadContext {
                        function: name.to_string(),
                    }
                    .into());
                }
                return Err(FunctionError::ArgumentType {
                    function: name.to_string(),
                    position: i + 1,
                }
                .into());
            }
        }

        Ok((builtin.invoke)(name, &resolved)?)
    }

    /// The context-rebinding call form: `$fn(primary, expr)` evaluates
    /// `expr` with the resolved primary value as the implicit context,
    /// then applies `$fn` to the sub-result only if that result matches
    /// the function's input type class; otherwise the sub-result passes
    /// through unmodified. The pushed frame is released on every exit
    /// path, including errors raised inside `expr`.
    fn apply_with_rebound_context(
        &mut self,
        builtin: &'static functions::Builtin,
        args: &[AstNode],
        data: &Value,
    ) -> Result<Value, EvaluateError> {
        let primary = self.evaluate_internal(&args[0], data)?;
        if primary.is_undefined() {
            return Ok(Value::Undefined);
        }

        let trailing = &args[args.len() - 1];
        let sub = self.evaluate_with_context(trailing, &primary)?;

        if builtin.signature.param_at(0).accepts(&sub) {
            Ok((builtin.invoke)(builtin.name, std::slice::from_ref(&sub))?)
        } else {
            Ok(sub)
        }
    }
}

// ── Sequence helpers ─────────────────────────────────────────────────────────

/// Append a step result to a sequence: absence is dropped, arrays are
/// flattened one level, anything else is appended as-is.
fn append_sequence(out: &mut Vec<Value>, value: Value) {
    match value {
        Value::Undefined => {}
        Value::Array(arr) => out.extend(arr.iter().cloned()),
        other => out.push(other),
    }
}

/// Collapse a sequence: empty means no value, a singleton unwraps, and
/// anything longer stays an array.
fn sequence_result(mut values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::Undefined,
        1 => values.pop().expect("length checked"),
        _ => Value::array(values),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;

    fn data() -> Value {
        Value::from(serde_json::json!({
            "name": "Alice",
            "age": 30,
            "scores": [1, 2, 3],
            "address": {"city": "Oslo"}
        }))
    }

    fn eval(node: &AstNode, data: &Value) -> Result<Value, EvaluateError> {
        Evaluator::new().evaluate(node, data)
    }

    #[test]
    fn test_context_stack_basics() {
        let mut stack = ContextStack::new();
        assert_eq!(stack.top(), Value::Undefined);
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        assert_eq!(stack.top(), Value::Int(2));
        assert_eq!(stack.pop(), Some(Value::Int(2)));
        assert_eq!(stack.top(), Value::Int(1));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_literals() {
        let d = data();
        assert_eq!(eval(&AstNode::Int(5), &d).unwrap(), Value::Int(5));
        assert_eq!(eval(&AstNode::Float(5.5), &d).unwrap(), Value::Float(5.5));
        assert_eq!(eval(&AstNode::Null, &d).unwrap(), Value::Null);
        assert_eq!(eval(&AstNode::string("x"), &d).unwrap(), Value::string("x"));
    }

    #[test]
    fn test_field_access() {
        let d = data();
        assert_eq!(eval(&AstNode::name("name"), &d).unwrap(), Value::string("Alice"));
        // Missing field: no value, not null
        assert_eq!(eval(&AstNode::name("missing"), &d).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_context_node_is_root_at_top_level() {
        let d = data();
        assert_eq!(eval(&AstNode::Context, &d).unwrap(), d);
    }

    #[test]
    fn test_stack_empty_after_evaluation() {
        let d = data();
        let mut ev = Evaluator::new();
        ev.evaluate(&AstNode::name("name"), &d).unwrap();
        assert_eq!(ev.context_depth(), 0);
        // Also after an error
        let call = AstNode::function("lowercase", vec![AstNode::Int(1)]);
        assert!(ev.evaluate(&call, &d).is_err());
        assert_eq!(ev.context_depth(), 0);
    }

    #[test]
    fn test_function_context_fallback_matches_explicit() {
        let d = Value::Float(5.3);
        // $floor() with the context value 5.3 equals $floor(5.3)
        let implicit = eval(&AstNode::function("floor", vec![]), &d).unwrap();
        let explicit = eval(
            &AstNode::function("floor", vec![AstNode::Float(5.3)]),
            &Value::Null,
        )
        .unwrap();
        assert_eq!(implicit, explicit);
        assert_eq!(implicit, Value::Int(5));
    }

    #[test]
    fn test_function_bad_context_type() {
        // Context present but wrong-typed: BadContext, not ArgumentType
        let err = eval(&AstNode::function("floor", vec![]), &Value::string("x")).unwrap_err();
        assert_eq!(
            err,
            EvaluateError::Function(FunctionError::BadContext {
                function: "floor".to_string()
            })
        );
    }

    #[test]
    fn test_function_absent_argument_propagates() {
        let d = data();
        // $floor(missing) — the argument resolves to no value
        let call = AstNode::function("floor", vec![AstNode::name("missing")]);
        assert_eq!(eval(&call, &d).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_function_absent_context_propagates() {
        // No explicit argument and nothing in the context: absence, not
        // an error
        let call = AstNode::function("floor", vec![]);
        assert_eq!(eval(&call, &Value::Undefined).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_function_arity_errors() {
        let d = data();
        // Too many arguments
        let call = AstNode::function("floor", vec![AstNode::Int(1), AstNode::Int(2), AstNode::Int(3)]);
        assert_eq!(
            eval(&call, &d).unwrap_err(),
            EvaluateError::Function(FunctionError::Arity {
                function: "floor".to_string(),
                kind: ArityKind::TooMany,
            })
        );
        // Too few, with a usable context covering only the first slot
        let call = AstNode::function("power", vec![]);
        assert_eq!(
            eval(&call, &Value::Int(2)).unwrap_err(),
            EvaluateError::Function(FunctionError::Arity {
                function: "power".to_string(),
                kind: ArityKind::TooFew,
            })
        );
        // No arguments and no context eligibility at all
        let call = AstNode::function("append", vec![]);
        assert_eq!(
            eval(&call, &d).unwrap_err(),
            EvaluateError::Function(FunctionError::BadContext {
                function: "append".to_string()
            })
        );
    }

    #[test]
    fn test_function_argument_type_error_position() {
        let d = data();
        let call = AstNode::function("lowercase", vec![AstNode::Int(5)]);
        assert_eq!(
            eval(&call, &d).unwrap_err(),
            EvaluateError::Function(FunctionError::ArgumentType {
                function: "lowercase".to_string(),
                position: 1,
            })
        );
        let call = AstNode::function(
            "substring",
            vec![AstNode::string("abc"), AstNode::string("bad")],
        );
        assert_eq!(
            eval(&call, &d).unwrap_err(),
            EvaluateError::Function(FunctionError::ArgumentType {
                function: "substring".to_string(),
                position: 2,
            })
        );
    }

    #[test]
    fn test_unknown_function() {
        let err = eval(&AstNode::function("nope", vec![]), &data()).unwrap_err();
        assert!(matches!(err, EvaluateError::ReferenceError(_)));
    }

    #[test]
    fn test_rebinding_call_form() {
        let d = data();
        // $lowercase("SEED", $ & "!") — trailing expression sees the
        // primary argument as its context, result is lowercased
        let call = AstNode::function(
            "lowercase",
            vec![
                AstNode::string("SEED"),
                AstNode::Binary {
                    op: BinaryOp::Concatenate,
                    lhs: Box::new(AstNode::Context),
                    rhs: Box::new(AstNode::string("!")),
                },
            ],
        );
        assert_eq!(eval(&call, &d).unwrap(), Value::string("seed!"));
    }

    #[test]
    fn test_rebinding_non_matching_result_passes_through() {
        let d = data();
        // Sub-expression yields a number; $lowercase leaves it unmodified
        let call = AstNode::function(
            "lowercase",
            vec![AstNode::string("SEED"), AstNode::Int(7)],
        );
        assert_eq!(eval(&call, &d).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_rebinding_restores_stack_on_error() {
        let d = data();
        let mut ev = Evaluator::new();
        // Trailing expression raises inside the pushed frame
        let call = AstNode::function(
            "lowercase",
            vec![
                AstNode::string("SEED"),
                AstNode::function("floor", vec![AstNode::string("bad")]),
            ],
        );
        assert!(ev.evaluate(&call, &d).is_err());
        assert_eq!(ev.context_depth(), 0);
    }

    #[test]
    fn test_arithmetic_preserves_int() {
        let d = data();
        let add = AstNode::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(AstNode::Int(2)),
            rhs: Box::new(AstNode::Int(3)),
        };
        assert_eq!(eval(&add, &d).unwrap(), Value::Int(5));

        // Division is inherently floating
        let div = AstNode::Binary {
            op: BinaryOp::Divide,
            lhs: Box::new(AstNode::Int(6)),
            rhs: Box::new(AstNode::Int(2)),
        };
        assert!(matches!(eval(&div, &d).unwrap(), Value::Float(_)));

        // Overflow promotes instead of wrapping
        let overflow = AstNode::Binary {
            op: BinaryOp::Multiply,
            lhs: Box::new(AstNode::Int(i64::MAX)),
            rhs: Box::new(AstNode::Int(2)),
        };
        assert!(matches!(eval(&overflow, &d).unwrap(), Value::Float(_)));
    }

    #[test]
    fn test_arithmetic_absence_flows() {
        let d = data();
        let add = AstNode::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(AstNode::name("missing")),
            rhs: Box::new(AstNode::Int(1)),
        };
        assert_eq!(eval(&add, &d).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_path_with_predicate_filter() {
        let d = Value::from(serde_json::json!({
            "orders": [
                {"product": "A", "price": 150},
                {"product": "B", "price": 50},
                {"product": "C", "price": 200}
            ]
        }));
        // orders[price > 100].product
        let path = AstNode::Path {
            steps: vec![
                PathStep::with_stages(
                    AstNode::name("orders"),
                    vec![Stage::Filter(Box::new(AstNode::Binary {
                        op: BinaryOp::GreaterThan,
                        lhs: Box::new(AstNode::name("price")),
                        rhs: Box::new(AstNode::Int(100)),
                    }))],
                ),
                PathStep::new(AstNode::name("product")),
            ],
        };
        assert_eq!(
            eval(&path, &d).unwrap(),
            Value::array(vec![Value::string("A"), Value::string("C")])
        );
    }

    #[test]
    fn test_path_index_predicate() {
        let d = data();
        let index = |i: i64| AstNode::Path {
            steps: vec![PathStep::with_stages(
                AstNode::name("scores"),
                vec![Stage::Filter(Box::new(AstNode::Int(i)))],
            )],
        };
        assert_eq!(eval(&index(0), &d).unwrap(), Value::Int(1));
        assert_eq!(eval(&index(-1), &d).unwrap(), Value::Int(3));
        assert_eq!(eval(&index(9), &d).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_path_array_mapping_flattens() {
        let d = Value::from(serde_json::json!({
            "rows": [
                {"tags": ["a", "b"]},
                {"other": 1},
                {"tags": ["c"]}
            ]
        }));
        let path = AstNode::Path {
            steps: vec![PathStep::new(AstNode::name("rows")), PathStep::new(AstNode::name("tags"))],
        };
        assert_eq!(
            eval(&path, &d).unwrap(),
            Value::array(vec![Value::string("a"), Value::string("b"), Value::string("c")])
        );
    }

    #[test]
    fn test_wildcard_and_descendant() {
        let d = Value::from(serde_json::json!({"a": 1, "b": {"c": 2}}));
        let wild = eval(&AstNode::Wildcard, &d).unwrap();
        assert_eq!(
            wild,
            Value::array(vec![Value::Int(1), Value::from(serde_json::json!({"c": 2}))])
        );

        let desc = eval(&AstNode::Descendant, &d).unwrap();
        // Root object, 1, {"c": 2}, 2
        assert_eq!(desc.as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn test_conditional() {
        let d = data();
        let cond = AstNode::Conditional {
            condition: Box::new(AstNode::Bool(false)),
            then_branch: Box::new(AstNode::Int(1)),
            else_branch: None,
        };
        assert_eq!(eval(&cond, &d).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_constructors_drop_absence() {
        let d = data();
        let arr = AstNode::Array(vec![AstNode::Int(1), AstNode::name("missing"), AstNode::Int(2)]);
        assert_eq!(
            eval(&arr, &d).unwrap(),
            Value::array(vec![Value::Int(1), Value::Int(2)])
        );

        let obj = AstNode::Object(vec![
            (AstNode::string("a"), AstNode::Int(1)),
            (AstNode::string("b"), AstNode::name("missing")),
        ]);
        let result = eval(&obj, &d).unwrap();
        assert_eq!(result.as_object().map(IndexMap::len), Some(1));
    }

    #[test]
    fn test_recursion_limit() {
        let mut node = AstNode::Int(1);
        for _ in 0..2000 {
            node = AstNode::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(node),
            };
        }
        let err = eval(&node, &data()).unwrap_err();
        assert!(matches!(err, EvaluateError::EvaluationError(_)));
    }
}
