// Query expression parser
//
// Hand-written lexer plus Pratt parser. Produces the AST consumed by the
// evaluator; path segments collapse into Path steps with predicate stages
// attached to the step they follow.

use crate::ast::{AstNode, BinaryOp, PathStep, Stage, UnaryOp};
use thiserror::Error;

/// Parser errors
#[derive(Error, Debug, PartialEq)]
pub enum ParserError {
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unclosed string literal")]
    UnclosedString,

    #[error("Invalid escape sequence: {0}")]
    InvalidEscape(String),

    #[error("Unclosed comment")]
    UnclosedComment,

    #[error("Unclosed backtick name")]
    UnclosedBacktick,

    #[error("Expected {expected}, found {found}")]
    Expected { expected: String, found: String },
}

/// Token types for the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    String(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Null,

    // Names and function references
    Identifier(String),
    /// `$name` — empty name is the bare context reference `$`
    Variable(String),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    In,
    Ampersand,
    Dot,
    Question,
    Colon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,

    // Special
    Eof,
}

/// Lexer for tokenizing query expressions
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn skip_comment(&mut self) -> Result<(), ParserError> {
        self.advance(); // skip '/'
        self.advance(); // skip '*'
        loop {
            match self.current() {
                None => return Err(ParserError::UnclosedComment),
                Some('*') if self.peek(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, ParserError> {
        let mut result = String::new();
        self.advance(); // skip opening quote

        loop {
            match self.current() {
                None => return Err(ParserError::UnclosedString),
                Some(ch) if ch == quote_char => {
                    self.advance(); // skip closing quote
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        None => return Err(ParserError::UnclosedString),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some('/') => result.push('/'),
                        Some('b') => result.push('\u{0008}'),
                        Some('f') => result.push('\u{000C}'),
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some('u') => {
                            // Unicode escape sequence \uXXXX
                            self.advance();
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.current() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        hex.push(h);
                                        self.advance();
                                    }
                                    _ => {
                                        return Err(ParserError::InvalidEscape(format!(
                                            "\\u{}",
                                            hex
                                        )))
                                    }
                                }
                            }
                            let code = u32::from_str_radix(&hex, 16)
                                .map_err(|_| ParserError::InvalidEscape(format!("\\u{}", hex)))?;
                            match char::from_u32(code) {
                                Some(ch) => result.push(ch),
                                None => {
                                    return Err(ParserError::InvalidEscape(format!("\\u{}", hex)))
                                }
                            }
                            continue; // already positioned past the escape
                        }
                        Some(ch) => return Err(ParserError::InvalidEscape(format!("\\{}", ch))),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Read a number; digits only yield Int, a fraction or exponent yields
    /// Float, preserving the numeric sub-kind from the source text.
    fn read_number(&mut self) -> Result<Token, ParserError> {
        let start = self.position;
        let mut is_float = false;

        while self.current().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.current() == Some('.') && self.peek(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.current().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.current(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.current().map_or(false, |c| c.is_ascii_digit()) {
                return Err(ParserError::InvalidNumber(
                    "Expected digit in exponent".to_string(),
                ));
            }
            while self.current().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str: String = self.input[start..self.position].iter().collect();
        if is_float {
            num_str
                .parse()
                .map(Token::Float)
                .map_err(|_| ParserError::InvalidNumber(num_str))
        } else {
            // An integer literal too large for i64 still parses as a number
            match num_str.parse() {
                Ok(n) => Ok(Token::Int(n)),
                Err(_) => num_str
                    .parse()
                    .map(Token::Float)
                    .map_err(|_| ParserError::InvalidNumber(num_str)),
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while self
            .current()
            .map_or(false, |ch| ch.is_alphanumeric() || ch == '_')
        {
            self.advance();
        }
        self.input[start..self.position].iter().collect()
    }

    /// Backtick-quoted field names allow characters an identifier cannot
    /// carry (spaces, dashes, leading digits).
    fn read_backtick_name(&mut self) -> Result<String, ParserError> {
        self.advance(); // skip opening backtick
        let start = self.position;

        while let Some(ch) = self.current() {
            if ch == '`' {
                let name: String = self.input[start..self.position].iter().collect();
                self.advance(); // skip closing backtick
                return Ok(name);
            }
            self.advance();
        }

        Err(ParserError::UnclosedBacktick)
    }

    pub fn next_token(&mut self) -> Result<Token, ParserError> {
        loop {
            self.skip_whitespace();

            match self.current() {
                None => return Ok(Token::Eof),

                // Comments
                Some('/') if self.peek(1) == Some('*') => {
                    self.skip_comment()?;
                    continue;
                }

                // String literals
                Some('"') => return Ok(Token::String(self.read_string('"')?)),
                Some('\'') => return Ok(Token::String(self.read_string('\'')?)),

                // Backtick names
                Some('`') => return Ok(Token::Identifier(self.read_backtick_name()?)),

                // Numbers (a leading '-' is always the Minus token; the
                // parser folds negation into the literal)
                Some(ch) if ch.is_ascii_digit() => return self.read_number(),

                // Context reference or function reference
                Some('$') => {
                    self.advance();
                    let name = self.read_identifier();
                    return Ok(Token::Variable(name));
                }

                // Two-character operators
                Some('*') if self.peek(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    return Ok(Token::StarStar);
                }
                Some('!') if self.peek(1) == Some('=') => {
                    self.advance();
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                Some('>') if self.peek(1) == Some('=') => {
                    self.advance();
                    self.advance();
                    return Ok(Token::GreaterThanOrEqual);
                }
                Some('<') if self.peek(1) == Some('=') => {
                    self.advance();
                    self.advance();
                    return Ok(Token::LessThanOrEqual);
                }

                // Single-character operators and delimiters
                Some('(') => {
                    self.advance();
                    return Ok(Token::LeftParen);
                }
                Some(')') => {
                    self.advance();
                    return Ok(Token::RightParen);
                }
                Some('[') => {
                    self.advance();
                    return Ok(Token::LeftBracket);
                }
                Some(']') => {
                    self.advance();
                    return Ok(Token::RightBracket);
                }
                Some('{') => {
                    self.advance();
                    return Ok(Token::LeftBrace);
                }
                Some('}') => {
                    self.advance();
                    return Ok(Token::RightBrace);
                }
                Some(',') => {
                    self.advance();
                    return Ok(Token::Comma);
                }
                Some(':') => {
                    self.advance();
                    return Ok(Token::Colon);
                }
                Some('?') => {
                    self.advance();
                    return Ok(Token::Question);
                }
                Some('.') => {
                    self.advance();
                    return Ok(Token::Dot);
                }
                Some('+') => {
                    self.advance();
                    return Ok(Token::Plus);
                }
                Some('-') => {
                    self.advance();
                    return Ok(Token::Minus);
                }
                Some('*') => {
                    self.advance();
                    return Ok(Token::Star);
                }
                Some('/') => {
                    self.advance();
                    return Ok(Token::Slash);
                }
                Some('%') => {
                    self.advance();
                    return Ok(Token::Percent);
                }
                Some('=') => {
                    self.advance();
                    return Ok(Token::Equal);
                }
                Some('<') => {
                    self.advance();
                    return Ok(Token::LessThan);
                }
                Some('>') => {
                    self.advance();
                    return Ok(Token::GreaterThan);
                }
                Some('&') => {
                    self.advance();
                    return Ok(Token::Ampersand);
                }

                // Identifiers and keywords
                Some(ch) if ch.is_alphabetic() || ch == '_' => {
                    let ident = self.read_identifier();
                    return Ok(match ident.as_str() {
                        "true" => Token::True,
                        "false" => Token::False,
                        "null" => Token::Null,
                        "and" => Token::And,
                        "or" => Token::Or,
                        "in" => Token::In,
                        _ => Token::Identifier(ident),
                    });
                }

                Some(ch) => return Err(ParserError::UnexpectedToken(ch.to_string())),
            }
        }
    }
}

/// Parser for query expressions using Pratt parsing
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParserError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    /// Parse a complete expression; trailing input is an error.
    pub fn parse(&mut self) -> Result<AstNode, ParserError> {
        if self.current_token == Token::Eof {
            return Err(ParserError::UnexpectedEnd);
        }
        let node = self.parse_expression(0)?;
        if self.current_token != Token::Eof {
            return Err(ParserError::UnexpectedToken(format!(
                "{:?}",
                self.current_token
            )));
        }
        Ok(node)
    }

    fn advance(&mut self) -> Result<(), ParserError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if std::mem::discriminant(&self.current_token) == std::mem::discriminant(&expected) {
            self.advance()
        } else {
            Err(ParserError::Expected {
                expected: format!("{:?}", expected),
                found: format!("{:?}", self.current_token),
            })
        }
    }

    /// Binding power (precedence) for infix tokens: (left_bp, right_bp),
    /// higher binds tighter.
    fn binding_power(token: &Token) -> Option<(u8, u8)> {
        match token {
            Token::Question => Some((20, 21)),
            Token::Or => Some((25, 26)),
            Token::And => Some((30, 31)),
            Token::Equal
            | Token::NotEqual
            | Token::LessThan
            | Token::LessThanOrEqual
            | Token::GreaterThan
            | Token::GreaterThanOrEqual
            | Token::In => Some((40, 41)),
            Token::Ampersand => Some((50, 51)),
            Token::Plus | Token::Minus => Some((50, 51)),
            Token::Star | Token::Slash | Token::Percent => Some((60, 61)),
            Token::Dot => Some((75, 76)),
            Token::LeftBracket => Some((80, 81)),
            _ => None,
        }
    }

    /// Parse a primary expression (literals, names, `$`, function calls,
    /// grouping, constructors, unary minus, path wildcards)
    fn parse_primary(&mut self) -> Result<AstNode, ParserError> {
        match &self.current_token {
            Token::String(s) => {
                let value = s.clone();
                self.advance()?;
                Ok(AstNode::Str(value))
            }
            Token::Int(n) => {
                let value = *n;
                self.advance()?;
                Ok(AstNode::Int(value))
            }
            Token::Float(n) => {
                let value = *n;
                self.advance()?;
                Ok(AstNode::Float(value))
            }
            Token::True => {
                self.advance()?;
                Ok(AstNode::Bool(true))
            }
            Token::False => {
                self.advance()?;
                Ok(AstNode::Bool(false))
            }
            Token::Null => {
                self.advance()?;
                Ok(AstNode::Null)
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(AstNode::Name(name))
            }
            // `$` is the context reference; `$name` must be a call
            Token::Variable(name) => {
                let name = name.clone();
                self.advance()?;
                if name.is_empty() {
                    return Ok(AstNode::Context);
                }
                if self.current_token != Token::LeftParen {
                    return Err(ParserError::InvalidSyntax(format!(
                        "Expected '(' after function reference ${}",
                        name
                    )));
                }
                self.advance()?; // skip '('
                let args = self.parse_argument_list()?;
                Ok(AstNode::Function { name, args })
            }
            // Wildcards are primaries so they can start or follow a path
            Token::Star => {
                self.advance()?;
                Ok(AstNode::Wildcard)
            }
            Token::StarStar => {
                self.advance()?;
                Ok(AstNode::Descendant)
            }
            Token::LeftParen => {
                self.advance()?;
                let inner = self.parse_expression(0)?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::LeftBracket => {
                self.advance()?;
                let mut elements = Vec::new();
                if self.current_token != Token::RightBracket {
                    loop {
                        elements.push(self.parse_expression(0)?);
                        if self.current_token != Token::Comma {
                            break;
                        }
                        self.advance()?;
                    }
                }
                self.expect(Token::RightBracket)?;
                Ok(AstNode::Array(elements))
            }
            Token::LeftBrace => {
                self.advance()?;
                let mut pairs = Vec::new();
                if self.current_token != Token::RightBrace {
                    loop {
                        let key = self.parse_expression(0)?;
                        self.expect(Token::Colon)?;
                        let value = self.parse_expression(0)?;
                        pairs.push((key, value));
                        if self.current_token != Token::Comma {
                            break;
                        }
                        self.advance()?;
                    }
                }
                self.expect(Token::RightBrace)?;
                Ok(AstNode::Object(pairs))
            }
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_expression(70)?; // binds tighter than * /
                match operand {
                    // Fold negation into the literal, keeping the sub-kind
                    AstNode::Int(n) => Ok(AstNode::Int(-n)),
                    AstNode::Float(n) => Ok(AstNode::Float(-n)),
                    other => Ok(AstNode::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(other),
                    }),
                }
            }
            Token::Eof => Err(ParserError::UnexpectedEnd),
            other => Err(ParserError::UnexpectedToken(format!("{:?}", other))),
        }
    }

    fn parse_argument_list(&mut self) -> Result<Vec<AstNode>, ParserError> {
        let mut args = Vec::new();
        if self.current_token != Token::RightParen {
            loop {
                args.push(self.parse_expression(0)?);
                if self.current_token != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(Token::RightParen)?;
        Ok(args)
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        let mut lhs = self.parse_primary()?;

        loop {
            let (left_bp, right_bp) = match Self::binding_power(&self.current_token) {
                Some(bp) => bp,
                None => break,
            };
            if left_bp < min_bp {
                break;
            }

            match &self.current_token {
                Token::Dot => {
                    self.advance()?;
                    let rhs = self.parse_expression(right_bp)?;
                    lhs = join_path(lhs, rhs);
                }

                // A predicate attaches to the step it follows, never
                // becoming a step of its own
                Token::LeftBracket => {
                    self.advance()?;
                    let predicate = self.parse_expression(0)?;
                    self.expect(Token::RightBracket)?;
                    lhs = attach_stage(lhs, Stage::Filter(Box::new(predicate)));
                }

                Token::Question => {
                    self.advance()?;
                    let then_branch = self.parse_expression(0)?;
                    let else_branch = if self.current_token == Token::Colon {
                        self.advance()?;
                        Some(Box::new(self.parse_expression(right_bp)?))
                    } else {
                        None
                    };
                    lhs = AstNode::Conditional {
                        condition: Box::new(lhs),
                        then_branch: Box::new(then_branch),
                        else_branch,
                    };
                }

                _ => {
                    let op = match &self.current_token {
                        Token::Plus => BinaryOp::Add,
                        Token::Minus => BinaryOp::Subtract,
                        Token::Star => BinaryOp::Multiply,
                        Token::Slash => BinaryOp::Divide,
                        Token::Percent => BinaryOp::Modulo,
                        Token::Equal => BinaryOp::Equal,
                        Token::NotEqual => BinaryOp::NotEqual,
                        Token::LessThan => BinaryOp::LessThan,
                        Token::LessThanOrEqual => BinaryOp::LessThanOrEqual,
                        Token::GreaterThan => BinaryOp::GreaterThan,
                        Token::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
                        Token::And => BinaryOp::And,
                        Token::Or => BinaryOp::Or,
                        Token::In => BinaryOp::In,
                        Token::Ampersand => BinaryOp::Concatenate,
                        other => {
                            return Err(ParserError::UnexpectedToken(format!("{:?}", other)))
                        }
                    };
                    self.advance()?;
                    let rhs = self.parse_expression(right_bp)?;
                    lhs = AstNode::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
            }
        }

        Ok(lhs)
    }
}

/// Combine `lhs . rhs` into a flattened Path node.
fn join_path(lhs: AstNode, rhs: AstNode) -> AstNode {
    let mut steps = into_steps(lhs);
    steps.extend(into_steps(rhs));
    AstNode::Path { steps }
}

fn into_steps(node: AstNode) -> Vec<PathStep> {
    match node {
        AstNode::Path { steps } => steps,
        other => vec![PathStep::new(other)],
    }
}

/// Attach a stage to the expression it follows: the last step of a path,
/// or the whole expression treated as a single-step path.
fn attach_stage(node: AstNode, stage: Stage) -> AstNode {
    let mut steps = into_steps(node);
    if let Some(last) = steps.last_mut() {
        last.stages.push(stage);
    }
    AstNode::Path { steps }
}

/// Parse an expression string into an AST.
pub fn parse(expression: &str) -> Result<AstNode, ParserError> {
    Parser::new(expression)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(parse("42").unwrap(), AstNode::Int(42));
        assert_eq!(parse("4.5").unwrap(), AstNode::Float(4.5));
        assert_eq!(parse("-3").unwrap(), AstNode::Int(-3));
        assert_eq!(parse("\"hi\"").unwrap(), AstNode::string("hi"));
        assert_eq!(parse("'hi'").unwrap(), AstNode::string("hi"));
        assert_eq!(parse("true").unwrap(), AstNode::Bool(true));
        assert_eq!(parse("null").unwrap(), AstNode::Null);
    }

    #[test]
    fn test_int_float_distinction_survives_lexing() {
        assert_eq!(parse("5").unwrap(), AstNode::Int(5));
        assert_eq!(parse("5.0").unwrap(), AstNode::Float(5.0));
        assert_eq!(parse("1e3").unwrap(), AstNode::Float(1000.0));
    }

    #[test]
    fn test_context_reference() {
        assert_eq!(parse("$").unwrap(), AstNode::Context);
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(parse("name").unwrap(), AstNode::name("name"));
        assert_eq!(
            parse("address.city").unwrap(),
            AstNode::Path {
                steps: vec![
                    PathStep::new(AstNode::name("address")),
                    PathStep::new(AstNode::name("city")),
                ]
            }
        );
    }

    #[test]
    fn test_backtick_name() {
        assert_eq!(
            parse("`first name`").unwrap(),
            AstNode::name("first name")
        );
    }

    #[test]
    fn test_wildcard_and_descendant_steps() {
        assert_eq!(
            parse("a.*").unwrap(),
            AstNode::Path {
                steps: vec![
                    PathStep::new(AstNode::name("a")),
                    PathStep::new(AstNode::Wildcard),
                ]
            }
        );
        assert_eq!(
            parse("**.price").unwrap(),
            AstNode::Path {
                steps: vec![
                    PathStep::new(AstNode::Descendant),
                    PathStep::new(AstNode::name("price")),
                ]
            }
        );
    }

    #[test]
    fn test_star_is_multiply_between_operands() {
        assert_eq!(
            parse("2 * 3").unwrap(),
            AstNode::Binary {
                op: BinaryOp::Multiply,
                lhs: Box::new(AstNode::Int(2)),
                rhs: Box::new(AstNode::Int(3)),
            }
        );
    }

    #[test]
    fn test_predicate_attaches_to_step() {
        let parsed = parse("orders[price > 100].product").unwrap();
        let AstNode::Path { steps } = parsed else {
            panic!("expected a path");
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].node, AstNode::name("orders"));
        assert_eq!(steps[0].stages.len(), 1);
        assert_eq!(steps[1].node, AstNode::name("product"));
        assert!(steps[1].stages.is_empty());
    }

    #[test]
    fn test_index_predicate_on_bare_name() {
        let parsed = parse("scores[0]").unwrap();
        let AstNode::Path { steps } = parsed else {
            panic!("expected a path");
        };
        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].stages,
            vec![Stage::Filter(Box::new(AstNode::Int(0)))]
        );
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            parse("$floor(5.3)").unwrap(),
            AstNode::function("floor", vec![AstNode::Float(5.3)])
        );
        assert_eq!(parse("$floor()").unwrap(), AstNode::function("floor", vec![]));
        assert_eq!(
            parse("$substring(name, 0, 3)").unwrap(),
            AstNode::function(
                "substring",
                vec![AstNode::name("name"), AstNode::Int(0), AstNode::Int(3)]
            )
        );
    }

    #[test]
    fn test_function_reference_requires_call() {
        assert!(matches!(
            parse("$floor").unwrap_err(),
            ParserError::InvalidSyntax(_)
        ));
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let parsed = parse("1 + 2 * 3").unwrap();
        let AstNode::Binary { op, rhs, .. } = parsed else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            *rhs,
            AstNode::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));

        // Comparison binds looser than arithmetic
        let parsed = parse("a + 1 > b").unwrap();
        assert!(matches!(
            parsed,
            AstNode::Binary {
                op: BinaryOp::GreaterThan,
                ..
            }
        ));
    }

    #[test]
    fn test_conditional() {
        let parsed = parse("age >= 18 ? \"adult\" : \"minor\"").unwrap();
        assert!(matches!(parsed, AstNode::Conditional { .. }));

        let parsed = parse("flag ? 1").unwrap();
        let AstNode::Conditional { else_branch, .. } = parsed else {
            panic!("expected conditional");
        };
        assert!(else_branch.is_none());
    }

    #[test]
    fn test_constructors() {
        assert_eq!(
            parse("[1, 2]").unwrap(),
            AstNode::Array(vec![AstNode::Int(1), AstNode::Int(2)])
        );
        assert_eq!(
            parse("{\"a\": 1}").unwrap(),
            AstNode::Object(vec![(AstNode::string("a"), AstNode::Int(1))])
        );
        assert_eq!(parse("[]").unwrap(), AstNode::Array(vec![]));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(parse("/* note */ 1 + /* more */ 2").unwrap(), parse("1 + 2").unwrap());
        assert_eq!(
            parse("/* unterminated").unwrap_err(),
            ParserError::UnclosedComment
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(parse(r#""a\nb""#).unwrap(), AstNode::string("a\nb"));
        assert_eq!(parse(r#""A""#).unwrap(), AstNode::string("A"));
        assert!(matches!(
            parse(r#""\q""#).unwrap_err(),
            ParserError::InvalidEscape(_)
        ));
        assert_eq!(parse(r#""open"#).unwrap_err(), ParserError::UnclosedString);
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(parse("1 2").is_err());
        assert_eq!(parse("").unwrap_err(), ParserError::UnexpectedEnd);
    }

    #[test]
    fn test_rebinding_call_shape_parses() {
        let parsed = parse("$lowercase(name, $ & \"!\")").unwrap();
        let AstNode::Function { name, args } = parsed else {
            panic!("expected function call");
        };
        assert_eq!(name, "lowercase");
        assert_eq!(args.len(), 2);
        assert!(matches!(
            args[1],
            AstNode::Binary {
                op: BinaryOp::Concatenate,
                ..
            }
        ));
    }
}
