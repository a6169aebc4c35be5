// Function signature contracts: arity, per-position type classes,
// and context-fallback eligibility

use crate::value::Value;

/// Type class a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Number,
    String,
    Boolean,
    Array,
    Object,
    Function,
    Any,
}

impl ParamType {
    /// Does `value` belong to this type class?
    ///
    /// `Undefined` matches nothing — absence is handled before type
    /// narrowing, never as a type class.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::Number => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::Boolean => value.is_bool(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            // No function-typed values exist in this language surface
            ParamType::Function => false,
            ParamType::Any => !value.is_undefined(),
        }
    }
}

/// A single declared parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Type classes this position accepts (any match passes)
    pub types: &'static [ParamType],
    /// Whether a missing argument at this position may be satisfied from
    /// the context stack. Only ever set on the first parameter.
    pub context_eligible: bool,
}

impl Parameter {
    pub fn accepts(&self, value: &Value) -> bool {
        self.types.iter().any(|t| t.matches(value))
    }
}

/// A function's declared signature
///
/// Invariants: `min_args <= max_args`; only the first parameter may be
/// `context_eligible`.
#[derive(Debug, Clone)]
pub struct Signature {
    pub min_args: u8,
    pub max_args: u8,
    pub params: &'static [Parameter],
}

impl Signature {
    /// Whether a call omitting the leading argument may draw it from the
    /// evaluation context.
    pub fn context_fallback_eligible(&self) -> bool {
        self.params.first().map_or(false, |p| p.context_eligible)
    }

    /// Parameter spec for a 0-based argument position. Positions past the
    /// declared list reuse the last parameter (covers optional trailing
    /// arguments sharing one spec).
    pub fn param_at(&self, index: usize) -> &Parameter {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .expect("signature declares at least one parameter")
    }
}
