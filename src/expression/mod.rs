//! Condition expressions for array path segments
//!
//! A segment such as `items{price > 10 and currency == 'EUR'}` carries a
//! condition that is evaluated against each candidate value. The path
//! resolver only sees the [`ConditionEvaluator`] trait; [`ExpressionLanguage`]
//! is the default implementation.
//!
//! ## Syntax
//!
//! - literals: `42`, `1.5`, `'text'`, `"text"`, `true`, `false`, `null`,
//!   `[1, 2]`, `{key: 'value'}`
//! - variables and member access: `price`, `item.name`, `tags[0]`
//! - operators: `or` `||` `and` `&&` `==` `===` `!=` `!==` `<` `<=` `>` `>=`
//!   `in` `not in` `matches` `contains` `starts with` `ends with` `..` `+`
//!   `-` `~` `*` `/` `%` `**` `not` `!`
//! - conditionals: `a ? b : c`, `a ?: b`, `a ?? b`

pub mod eval;
pub mod lexer;
pub mod parser;

use crate::error::ExpressionError;
use eval::Interpreter;
use parser::Node;
use regex::Regex;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use eval::is_truthy;

/// Evaluates a boolean condition against a set of named variables
pub trait ConditionEvaluator {
    fn evaluate(&self, condition: &str, scope: &Map<String, Value>) -> Result<bool, ExpressionError>;
}

/// Default condition evaluator
///
/// Parsed expressions and compiled regular expressions are cached per
/// instance, so the same condition applied to thousands of items is parsed
/// once. The caches make the type `!Sync`: use one instance per thread.
#[derive(Default)]
pub struct ExpressionLanguage {
    parsed: RefCell<HashMap<String, Rc<Node>>>,
    regexes: RefCell<HashMap<String, Regex>>,
}

impl ExpressionLanguage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an expression, reusing the cached tree when available
    pub fn parse(&self, expression: &str) -> Result<Rc<Node>, ExpressionError> {
        if let Some(node) = self.parsed.borrow().get(expression) {
            return Ok(Rc::clone(node));
        }

        let node = Rc::new(parser::parse(expression)?);
        self.parsed
            .borrow_mut()
            .insert(expression.to_string(), Rc::clone(&node));
        Ok(node)
    }

    /// Evaluate an expression and return its raw value
    pub fn evaluate_value(&self, expression: &str, scope: &Map<String, Value>) -> Result<Value, ExpressionError> {
        let node = self.parse(expression)?;
        Interpreter::new(scope, &self.regexes).evaluate(&node)
    }
}

impl ConditionEvaluator for ExpressionLanguage {
    fn evaluate(&self, condition: &str, scope: &Map<String, Value>) -> Result<bool, ExpressionError> {
        self.evaluate_value(condition, scope).map(|value| is_truthy(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("scope must be an object"),
        }
    }

    #[test]
    fn test_condition_is_coerced_to_bool() {
        let language = ExpressionLanguage::new();
        let vars = scope(json!({"value": 3, "name": ""}));

        assert!(language.evaluate("value > 2", &vars).unwrap());
        assert!(!language.evaluate("value > 3", &vars).unwrap());
        // Non-boolean results use truthiness
        assert!(language.evaluate("value", &vars).unwrap());
        assert!(!language.evaluate("name", &vars).unwrap());
    }

    #[test]
    fn test_parse_cache_is_reused() {
        let language = ExpressionLanguage::new();
        let first = language.parse("a == 1").unwrap();
        let second = language.parse("a == 1").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_errors_propagate() {
        let language = ExpressionLanguage::new();
        let vars = scope(json!({"value": 1}));

        assert!(matches!(
            language.evaluate("value >", &vars),
            Err(ExpressionError::Syntax { .. })
        ));
        assert_eq!(
            language.evaluate("price > 1", &vars),
            Err(ExpressionError::UnknownVariable("price".to_string()))
        );
    }
}
