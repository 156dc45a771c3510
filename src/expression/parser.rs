//! Precedence-climbing parser producing an expression tree

use crate::error::ExpressionError;
use crate::expression::lexer::{literal, tokenize, Token, TokenKind};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    Identical,
    NotEqual,
    NotIdentical,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    In,
    NotIn,
    Matches,
    Contains,
    StartsWith,
    EndsWith,
    Range,
    Add,
    Subtract,
    Concat,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOp {
    /// Precedence and right-associativity of a binary operator token
    fn lookup(op: &str) -> Option<(BinaryOp, u16, bool)> {
        let entry = match op {
            "or" | "||" => (BinaryOp::Or, 10, false),
            "and" | "&&" => (BinaryOp::And, 15, false),
            "==" => (BinaryOp::Equal, 20, false),
            "===" => (BinaryOp::Identical, 20, false),
            "!=" => (BinaryOp::NotEqual, 20, false),
            "!==" => (BinaryOp::NotIdentical, 20, false),
            "<" => (BinaryOp::Less, 20, false),
            "<=" => (BinaryOp::LessOrEqual, 20, false),
            ">" => (BinaryOp::Greater, 20, false),
            ">=" => (BinaryOp::GreaterOrEqual, 20, false),
            "in" => (BinaryOp::In, 20, false),
            "not in" => (BinaryOp::NotIn, 20, false),
            "matches" => (BinaryOp::Matches, 20, false),
            "contains" => (BinaryOp::Contains, 20, false),
            "starts with" => (BinaryOp::StartsWith, 20, false),
            "ends with" => (BinaryOp::EndsWith, 20, false),
            ".." => (BinaryOp::Range, 25, false),
            "+" => (BinaryOp::Add, 30, false),
            "-" => (BinaryOp::Subtract, 30, false),
            "~" => (BinaryOp::Concat, 40, false),
            "*" => (BinaryOp::Multiply, 60, false),
            "/" => (BinaryOp::Divide, 60, false),
            "%" => (BinaryOp::Modulo, 60, false),
            "**" => (BinaryOp::Power, 200, true),
            _ => return None,
        };
        Some(entry)
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Value),
    Variable(String),
    Array(Vec<Node>),
    Hash(Vec<(String, Node)>),
    /// `target.name`
    Property { target: Box<Node>, name: String },
    /// `target[index]`
    Index { target: Box<Node>, index: Box<Node> },
    Unary { op: UnaryOp, operand: Box<Node> },
    Binary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    /// `condition ? then : otherwise`; `then` is absent for `condition ?: otherwise`
    Conditional {
        condition: Box<Node>,
        then: Option<Box<Node>>,
        otherwise: Box<Node>,
    },
    /// `left ?? right`
    Coalesce { left: Box<Node>, right: Box<Node> },
}

pub fn parse(source: &str) -> Result<Node, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        cursor: 0,
    };
    let node = parser.parse_expression(0)?;
    let trailing = parser.current();
    if trailing.kind != TokenKind::End {
        return Err(ExpressionError::syntax(
            trailing.position,
            format!("Unexpected token {:?}", trailing.kind),
        ));
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        // The token list always ends with `End`, and the cursor never moves past it
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::End {
            self.cursor += 1;
        }
        token
    }

    fn is_punctuation(&self, c: char) -> bool {
        self.current().kind == TokenKind::Punctuation(c)
    }

    fn expect_punctuation(&mut self, c: char) -> Result<(), ExpressionError> {
        if self.is_punctuation(c) {
            self.advance();
            Ok(())
        } else {
            let token = self.current();
            Err(ExpressionError::syntax(
                token.position,
                format!("Expected \"{}\", found {:?}", c, token.kind),
            ))
        }
    }

    fn parse_expression(&mut self, min_precedence: u16) -> Result<Node, ExpressionError> {
        let mut left = self.parse_unary()?;

        while let TokenKind::Operator(op) = self.current().kind {
            let Some((binary, precedence, right_assoc)) = BinaryOp::lookup(op) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let next = if right_assoc { precedence } else { precedence + 1 };
            let right = self.parse_expression(next)?;
            left = Node::Binary {
                op: binary,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        if min_precedence == 0 {
            left = self.parse_conditional(left)?;
        }
        Ok(left)
    }

    fn parse_conditional(&mut self, mut node: Node) -> Result<Node, ExpressionError> {
        loop {
            if self.current().kind == TokenKind::Operator("??") {
                self.advance();
                let right = self.parse_expression(0)?;
                node = Node::Coalesce {
                    left: Box::new(node),
                    right: Box::new(right),
                };
            } else if self.is_punctuation('?') {
                self.advance();
                if self.is_punctuation(':') {
                    self.advance();
                    let otherwise = self.parse_expression(0)?;
                    node = Node::Conditional {
                        condition: Box::new(node),
                        then: None,
                        otherwise: Box::new(otherwise),
                    };
                } else {
                    let then = self.parse_expression(0)?;
                    self.expect_punctuation(':')?;
                    let otherwise = self.parse_expression(0)?;
                    node = Node::Conditional {
                        condition: Box::new(node),
                        then: Some(Box::new(then)),
                        otherwise: Box::new(otherwise),
                    };
                }
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        let unary = match self.current().kind {
            TokenKind::Operator("not") | TokenKind::Operator("!") => Some((UnaryOp::Not, 50)),
            TokenKind::Operator("-") => Some((UnaryOp::Negate, 500)),
            TokenKind::Operator("+") => Some((UnaryOp::Plus, 500)),
            _ => None,
        };

        if let Some((op, precedence)) = unary {
            self.advance();
            let operand = self.parse_expression(precedence)?;
            return Ok(Node::Unary {
                op,
                operand: Box::new(operand),
            });
        }

        if self.is_punctuation('(') {
            self.advance();
            let inner = self.parse_expression(0)?;
            self.expect_punctuation(')')?;
            return self.parse_postfix(inner);
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> Result<Node, ExpressionError> {
        let token = self.advance();

        if let Some(value) = literal(&token.kind) {
            return Ok(Node::Literal(value));
        }

        match token.kind {
            TokenKind::Name(name) => {
                if self.is_punctuation('(') {
                    return Err(ExpressionError::syntax(
                        token.position,
                        format!("The function \"{}\" does not exist", name),
                    ));
                }
                Ok(match name.to_ascii_lowercase().as_str() {
                    "true" => Node::Literal(Value::Bool(true)),
                    "false" => Node::Literal(Value::Bool(false)),
                    "null" => Node::Literal(Value::Null),
                    _ => Node::Variable(name),
                })
            }
            TokenKind::Punctuation('[') => self.parse_array(),
            TokenKind::Punctuation('{') => self.parse_hash(),
            other => Err(ExpressionError::syntax(
                token.position,
                format!("Unexpected token {:?}", other),
            )),
        }
    }

    fn parse_array(&mut self) -> Result<Node, ExpressionError> {
        let mut items = Vec::new();
        while !self.is_punctuation(']') {
            if !items.is_empty() {
                self.expect_punctuation(',')?;
                // Trailing comma
                if self.is_punctuation(']') {
                    break;
                }
            }
            items.push(self.parse_expression(0)?);
        }
        self.expect_punctuation(']')?;
        Ok(Node::Array(items))
    }

    fn parse_hash(&mut self) -> Result<Node, ExpressionError> {
        let mut entries = Vec::new();
        while !self.is_punctuation('}') {
            if !entries.is_empty() {
                self.expect_punctuation(',')?;
                if self.is_punctuation('}') {
                    break;
                }
            }
            let token = self.advance();
            let key = match token.kind {
                TokenKind::Name(name) => name,
                TokenKind::Str(s) => s,
                TokenKind::Number(n) => n.to_string(),
                other => {
                    return Err(ExpressionError::syntax(
                        token.position,
                        format!("A hash key must be a name, a string or a number, found {:?}", other),
                    ))
                }
            };
            self.expect_punctuation(':')?;
            entries.push((key, self.parse_expression(0)?));
        }
        self.expect_punctuation('}')?;
        Ok(Node::Hash(entries))
    }

    fn parse_postfix(&mut self, mut node: Node) -> Result<Node, ExpressionError> {
        loop {
            if self.is_punctuation('.') {
                self.advance();
                let token = self.advance();
                let name = match token.kind {
                    TokenKind::Name(name) => name,
                    // Word operators are valid property names after a dot
                    TokenKind::Operator(op) if op.chars().all(|c| c.is_ascii_alphabetic()) => op.to_string(),
                    other => {
                        return Err(ExpressionError::syntax(
                            token.position,
                            format!("Expected a property name, found {:?}", other),
                        ))
                    }
                };
                node = Node::Property {
                    target: Box::new(node),
                    name,
                };
            } else if self.is_punctuation('[') {
                self.advance();
                let index = self.parse_expression(0)?;
                self.expect_punctuation(']')?;
                node = Node::Index {
                    target: Box::new(node),
                    index: Box::new(index),
                };
            } else {
                return Ok(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str) -> Box<Node> {
        Box::new(Node::Variable(name.to_string()))
    }

    fn lit(value: Value) -> Box<Node> {
        Box::new(Node::Literal(value))
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(
            parse("value > 2").unwrap(),
            Node::Binary {
                op: BinaryOp::Greater,
                left: var("value"),
                right: lit(json!(2)),
            }
        );
    }

    #[test]
    fn test_precedence() {
        // a or b and c  =>  a or (b and c)
        assert_eq!(
            parse("a or b and c").unwrap(),
            Node::Binary {
                op: BinaryOp::Or,
                left: var("a"),
                right: Box::new(Node::Binary {
                    op: BinaryOp::And,
                    left: var("b"),
                    right: var("c"),
                }),
            }
        );

        // 1 + 2 * 3  =>  1 + (2 * 3)
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Node::Binary {
                op: BinaryOp::Add,
                left: lit(json!(1)),
                right: Box::new(Node::Binary {
                    op: BinaryOp::Multiply,
                    left: lit(json!(2)),
                    right: lit(json!(3)),
                }),
            }
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(
            parse("2 ** 3 ** 2").unwrap(),
            Node::Binary {
                op: BinaryOp::Power,
                left: lit(json!(2)),
                right: Box::new(Node::Binary {
                    op: BinaryOp::Power,
                    left: lit(json!(3)),
                    right: lit(json!(2)),
                }),
            }
        );
    }

    #[test]
    fn test_unary_minus_binds_tightest() {
        // -2 ** 2  =>  (-2) ** 2
        assert_eq!(
            parse("-2 ** 2").unwrap(),
            Node::Binary {
                op: BinaryOp::Power,
                left: Box::new(Node::Unary {
                    op: UnaryOp::Negate,
                    operand: lit(json!(2)),
                }),
                right: lit(json!(2)),
            }
        );
        // member access still applies to the operand: -a.b  =>  -(a.b)
        assert_eq!(
            parse("-a.b").unwrap(),
            Node::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(Node::Property {
                    target: var("a"),
                    name: "b".into(),
                }),
            }
        );
    }

    #[test]
    fn test_not_applies_before_comparison() {
        // not a == b  =>  (not a) == b
        assert_eq!(
            parse("not a == b").unwrap(),
            Node::Binary {
                op: BinaryOp::Equal,
                left: Box::new(Node::Unary {
                    op: UnaryOp::Not,
                    operand: var("a"),
                }),
                right: var("b"),
            }
        );
        // but looser than multiplication: not a * b  =>  not (a * b)
        assert_eq!(
            parse("not a * b").unwrap(),
            Node::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Node::Binary {
                    op: BinaryOp::Multiply,
                    left: var("a"),
                    right: var("b"),
                }),
            }
        );
    }

    #[test]
    fn test_member_access_and_literals() {
        assert_eq!(
            parse("item.tags[0] in ['a', \"b\"]").unwrap(),
            Node::Binary {
                op: BinaryOp::In,
                left: Box::new(Node::Index {
                    target: Box::new(Node::Property {
                        target: var("item"),
                        name: "tags".into(),
                    }),
                    index: lit(json!(0)),
                }),
                right: Box::new(Node::Array(vec![Node::Literal(json!("a")), Node::Literal(json!("b"))])),
            }
        );
        assert_eq!(parse("TRUE").unwrap(), Node::Literal(json!(true)));
        assert_eq!(
            parse("{a: 1, 'b': 2}").unwrap(),
            Node::Hash(vec![
                ("a".into(), Node::Literal(json!(1))),
                ("b".into(), Node::Literal(json!(2))),
            ])
        );
    }

    #[test]
    fn test_conditional_forms() {
        assert!(matches!(
            parse("a ? b : c").unwrap(),
            Node::Conditional { then: Some(_), .. }
        ));
        assert!(matches!(
            parse("a ?: c").unwrap(),
            Node::Conditional { then: None, .. }
        ));
        assert!(matches!(parse("a ?? c").unwrap(), Node::Coalesce { .. }));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("value >"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("(a"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(ExpressionError::Syntax { position: 2, .. })));
        assert!(matches!(parse("count(a)"), Err(ExpressionError::Syntax { .. })));
    }
}
