//! Tree-walking evaluation with loose (PHP-style) comparison semantics

use crate::error::ExpressionError;
use crate::expression::parser::{BinaryOp, Node, UnaryOp};
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Upper bound on the number of items a `..` range may produce
const MAX_RANGE_ITEMS: u64 = 100_000;

/// Evaluates a parsed expression against a variable scope
pub struct Interpreter<'a> {
    scope: &'a Map<String, Value>,
    regexes: &'a RefCell<HashMap<String, Regex>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(scope: &'a Map<String, Value>, regexes: &'a RefCell<HashMap<String, Regex>>) -> Self {
        Interpreter { scope, regexes }
    }

    pub fn evaluate(&self, node: &Node) -> Result<Value, ExpressionError> {
        match node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Variable(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnknownVariable(name.clone())),
            Node::Array(items) => {
                let values = items.iter().map(|item| self.evaluate(item)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(values))
            }
            Node::Hash(entries) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), self.evaluate(item)?);
                }
                Ok(Value::Object(map))
            }
            Node::Property { target, name } => {
                let target = self.evaluate(target)?;
                member(&target, &Value::String(name.clone()))
            }
            Node::Index { target, index } => {
                let target = self.evaluate(target)?;
                let index = self.evaluate(index)?;
                member(&target, &index)
            }
            Node::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&operand))),
                    UnaryOp::Plus => numeric(&operand, "+").map(Value::Number),
                    UnaryOp::Negate => {
                        let n = numeric(&operand, "-")?;
                        Ok(match n.as_i64().and_then(i64::checked_neg) {
                            Some(i) => Value::from(i),
                            None => float(-as_f64(&n))?,
                        })
                    }
                }
            }
            Node::Binary { op, left, right } => self.evaluate_binary(*op, left, right),
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let test = self.evaluate(condition)?;
                if is_truthy(&test) {
                    match then {
                        Some(then) => self.evaluate(then),
                        None => Ok(test),
                    }
                } else {
                    self.evaluate(otherwise)
                }
            }
            Node::Coalesce { left, right } => match self.evaluate(left) {
                Ok(Value::Null)
                | Err(ExpressionError::UnknownVariable(_))
                | Err(ExpressionError::InvalidOperation(_)) => self.evaluate(right),
                other => other,
            },
        }
    }

    fn evaluate_binary(&self, op: BinaryOp, left: &Node, right: &Node) -> Result<Value, ExpressionError> {
        // Logical operators short-circuit
        match op {
            BinaryOp::Or => {
                let result = is_truthy(&self.evaluate(left)?) || is_truthy(&self.evaluate(right)?);
                return Ok(Value::Bool(result));
            }
            BinaryOp::And => {
                let result = is_truthy(&self.evaluate(left)?) && is_truthy(&self.evaluate(right)?);
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        let result = match op {
            BinaryOp::Equal => Value::Bool(loose_equals(&left, &right)),
            BinaryOp::NotEqual => Value::Bool(!loose_equals(&left, &right)),
            BinaryOp::Identical => Value::Bool(strict_equals(&left, &right)),
            BinaryOp::NotIdentical => Value::Bool(!strict_equals(&left, &right)),
            BinaryOp::Less => Value::Bool(loose_compare(&left, &right) == Some(Ordering::Less)),
            BinaryOp::LessOrEqual => Value::Bool(matches!(
                loose_compare(&left, &right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::Greater => Value::Bool(loose_compare(&left, &right) == Some(Ordering::Greater)),
            BinaryOp::GreaterOrEqual => Value::Bool(matches!(
                loose_compare(&left, &right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::In => Value::Bool(contains_item(&right, &left)?),
            BinaryOp::NotIn => Value::Bool(!contains_item(&right, &left)?),
            BinaryOp::Matches => Value::Bool(self.matches(&left, &right)?),
            BinaryOp::Contains => Value::Bool(to_text(&left)?.contains(to_text(&right)?.as_str())),
            BinaryOp::StartsWith => Value::Bool(to_text(&left)?.starts_with(to_text(&right)?.as_str())),
            BinaryOp::EndsWith => Value::Bool(to_text(&left)?.ends_with(to_text(&right)?.as_str())),
            BinaryOp::Concat => Value::String(to_text(&left)? + &to_text(&right)?),
            BinaryOp::Range => range(&left, &right)?,
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo
            | BinaryOp::Power => arithmetic(op, &left, &right)?,
            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        };

        Ok(result)
    }

    fn matches(&self, subject: &Value, pattern: &Value) -> Result<bool, ExpressionError> {
        let pattern = to_text(pattern)?;
        let subject = to_text(subject)?;

        if let Some(regex) = self.regexes.borrow().get(&pattern) {
            return Ok(regex.is_match(&subject));
        }

        let regex = compile_pattern(&pattern)?;
        let found = regex.is_match(&subject);
        self.regexes.borrow_mut().insert(pattern, regex);
        Ok(found)
    }
}

/// Compile a delimited pattern such as `/^abc$/i`; undelimited patterns are used as-is
fn compile_pattern(pattern: &str) -> Result<Regex, ExpressionError> {
    let invalid = |message: String| ExpressionError::InvalidRegex {
        pattern: pattern.to_string(),
        message,
    };

    let builder = match delimited(pattern) {
        Some((body, flags)) => {
            let mut builder = RegexBuilder::new(body);
            for flag in flags.chars() {
                match flag {
                    'i' => builder.case_insensitive(true),
                    'm' => builder.multi_line(true),
                    's' => builder.dot_matches_new_line(true),
                    'x' => builder.ignore_whitespace(true),
                    'u' => builder.unicode(true),
                    other => return Err(invalid(format!("unknown modifier '{}'", other))),
                };
            }
            builder
        }
        None => RegexBuilder::new(pattern),
    };

    builder.build().map_err(|e| invalid(e.to_string()))
}

fn delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next()?;
    if delimiter.is_alphanumeric() || delimiter == '\\' || delimiter.is_whitespace() {
        return None;
    }
    let closing = match delimiter {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    };
    let end = pattern.rfind(closing)?;
    let start = delimiter.len_utf8();
    if end < start {
        return None;
    }
    Some((&pattern[start..end], &pattern[end + closing.len_utf8()..]))
}

fn member(target: &Value, key: &Value) -> Result<Value, ExpressionError> {
    match target {
        Value::Object(map) => Ok(map.get(&to_text(key)?).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => {
            let index = key
                .as_u64()
                .or_else(|| key.as_str().and_then(|s| s.parse::<u64>().ok()))
                .and_then(|i| usize::try_from(i).ok());
            Ok(index.and_then(|i| items.get(i)).cloned().unwrap_or(Value::Null))
        }
        other => Err(ExpressionError::invalid(format!(
            "Unable to get an item of non-container value {}",
            other
        ))),
    }
}

/// Loose truthiness: null, false, 0, 0.0, "", "0" and empty containers are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => as_f64(n) != 0.0,
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(0.0)
}

fn float(f: f64) -> Result<Value, ExpressionError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::invalid(format!("Result {} is not a finite number", f)))
}

/// Parse a numeric string the way loose comparison does (surrounding whitespace allowed)
fn numeric_string(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    // Rust accepts "inf" and "NaN", which are not numeric strings
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Number view of a value for comparisons; only numbers and numeric strings qualify
fn comparable_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => numeric_string(s),
        _ => None,
    }
}

/// Number view of a value for arithmetic
fn numeric(value: &Value, op: &str) -> Result<Number, ExpressionError> {
    match value {
        Value::Null => Ok(Number::from(0)),
        Value::Bool(b) => Ok(Number::from(*b as i64)),
        Value::Number(n) => Ok(n.clone()),
        Value::String(s) => numeric_string(s)
            .ok_or_else(|| ExpressionError::invalid(format!("Unsupported operand \"{}\" for {}", s, op))),
        other => Err(ExpressionError::invalid(format!("Unsupported operand {} for {}", other, op))),
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => as_f64(a).partial_cmp(&as_f64(b)),
    }
}

pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == is_truthy(other),
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) => !is_truthy(other) && !matches!(other, Value::String(s) if s == "0"),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| loose_equals(v, w)))
        }
        (Value::String(a), Value::String(b)) => match (numeric_string(a), numeric_string(b)) {
            (Some(x), Some(y)) => compare_numbers(&x, &y) == Some(Ordering::Equal),
            _ => a == b,
        },
        _ => match (comparable_number(left), comparable_number(right)) {
            (Some(x), Some(y)) => compare_numbers(&x, &y) == Some(Ordering::Equal),
            _ => false,
        },
    }
}

pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if a.is_f64() != b.is_f64() {
                return false;
            }
            compare_numbers(a, b) == Some(Ordering::Equal)
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && strict_equals(va, vb))
        }
        _ => left == right,
    }
}

/// Ordering under loose comparison; `None` when the values are not comparable
pub fn loose_compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(_), _) | (_, Value::Bool(_)) | (Value::Null, _) | (_, Value::Null) => {
            Some(is_truthy(left).cmp(&is_truthy(right)))
        }
        (Value::String(a), Value::String(b)) => match (numeric_string(a), numeric_string(b)) {
            (Some(x), Some(y)) => compare_numbers(&x, &y),
            _ => Some(a.cmp(b)),
        },
        (Value::Array(a), Value::Array(b)) => Some(a.len().cmp(&b.len())),
        _ => match (comparable_number(left), comparable_number(right)) {
            (Some(x), Some(y)) => compare_numbers(&x, &y),
            // A number against a non-numeric string compares as text
            _ => match (left, right) {
                (Value::Number(n), Value::String(s)) => Some(n.to_string().as_str().cmp(s.as_str())),
                (Value::String(s), Value::Number(n)) => Some(s.as_str().cmp(n.to_string().as_str())),
                _ => None,
            },
        },
    }
}

fn contains_item(haystack: &Value, needle: &Value) -> Result<bool, ExpressionError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| strict_equals(item, needle))),
        Value::Object(map) => Ok(map.values().any(|item| strict_equals(item, needle))),
        other => Err(ExpressionError::invalid(format!(
            "The right operand of \"in\" must be an array, got {}",
            other
        ))),
    }
}

/// String conversion used by concatenation and string operators
fn to_text(value: &Value) -> Result<String, ExpressionError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(true) => Ok("1".to_string()),
        Value::Bool(false) => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(ExpressionError::invalid(format!("Cannot convert {} to a string", other))),
    }
}

fn range(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let bound = |value: &Value| {
        numeric(value, "..")?
            .as_i64()
            .ok_or_else(|| ExpressionError::invalid("Range bounds must be integers"))
    };
    let (start, end) = (bound(left)?, bound(right)?);
    if end.abs_diff(start) >= MAX_RANGE_ITEMS {
        return Err(ExpressionError::invalid(format!("Range {}..{} is too large", start, end)));
    }
    let items: Vec<Value> = if start <= end {
        (start..=end).map(Value::from).collect()
    } else {
        (end..=start).rev().map(Value::from).collect()
    };
    Ok(Value::Array(items))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        _ => "**",
    };
    let a = numeric(left, symbol)?;
    let b = numeric(right, symbol)?;

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Subtract => x.checked_sub(y),
            BinaryOp::Multiply => x.checked_mul(y),
            BinaryOp::Divide if y == 0 => return Err(ExpressionError::invalid("Division by zero")),
            BinaryOp::Divide if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Modulo if y == 0 => return Err(ExpressionError::invalid("Modulo by zero")),
            BinaryOp::Modulo => x.checked_rem(y),
            BinaryOp::Power => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let (x, y) = (as_f64(&a), as_f64(&b));
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide if y == 0.0 => return Err(ExpressionError::invalid("Division by zero")),
        BinaryOp::Divide => x / y,
        BinaryOp::Modulo => {
            // Modulo works on the integer parts
            let (xi, yi) = (x.trunc() as i64, y.trunc() as i64);
            if yi == 0 {
                return Err(ExpressionError::invalid("Modulo by zero"));
            }
            return Ok(Value::from(xi.wrapping_rem(yi)));
        }
        _ => x.powf(y),
    };
    float(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse;
    use serde_json::json;

    fn eval_with(source: &str, scope: Value) -> Result<Value, ExpressionError> {
        let Value::Object(scope) = scope else {
            panic!("scope must be an object");
        };
        let regexes = RefCell::new(HashMap::new());
        let node = parse(source)?;
        Interpreter::new(&scope, &regexes).evaluate(&node)
    }

    fn eval(source: &str) -> Value {
        eval_with(source, json!({})).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), json!(7));
        assert_eq!(eval("7 / 2"), json!(3.5));
        assert_eq!(eval("8 / 2"), json!(4));
        assert_eq!(eval("7 % 3"), json!(1));
        assert_eq!(eval("2 ** 10"), json!(1024));
        assert_eq!(eval("-(3 - 5)"), json!(2));
        assert_eq!(eval("'3' + 4"), json!(7));
        assert_eq!(eval("-2 ** 2"), json!(4));
    }

    #[test]
    fn test_division_by_zero_fails() {
        assert!(matches!(
            eval_with("1 / 0", json!({})),
            Err(ExpressionError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_loose_comparison() {
        assert_eq!(eval("'10' == 10"), json!(true));
        assert_eq!(eval("'10' === 10"), json!(false));
        assert_eq!(eval("1 === 1.0"), json!(false));
        assert_eq!(eval("'abc' == 0"), json!(false));
        assert_eq!(eval("null == false"), json!(true));
        assert_eq!(eval("'9' < '10'"), json!(true));
        assert_eq!(eval("'b' > 'a'"), json!(true));
        assert_eq!(eval("2.5 >= 2"), json!(true));
    }

    #[test]
    fn test_logic_and_membership() {
        assert_eq!(eval("true and not false"), json!(true));
        assert_eq!(eval("false || 0"), json!(false));
        assert_eq!(eval("2 in [1, 2, 3]"), json!(true));
        assert_eq!(eval("'2' in [1, 2, 3]"), json!(false));
        assert_eq!(eval("4 not in 1..3"), json!(true));
        assert_eq!(eval("3..1"), json!([3, 2, 1]));
    }

    #[test]
    fn test_oversized_range_fails() {
        assert!(matches!(
            eval_with("1 in -9223372036854775807..9223372036854775807", json!({})),
            Err(ExpressionError::InvalidOperation(_))
        ));
        assert!(matches!(
            eval_with("1 in 9223372036854775807..-9223372036854775807", json!({})),
            Err(ExpressionError::InvalidOperation(_))
        ));
        assert_eq!(eval("1 in 0..99999"), json!(true));
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(eval("'foo' ~ 'bar' ~ 1"), json!("foobar1"));
        assert_eq!(eval("'foobar' contains 'oba'"), json!(true));
        assert_eq!(eval("'foobar' starts with 'foo'"), json!(true));
        assert_eq!(eval("'foobar' ends with 'foo'"), json!(false));
        assert_eq!(eval("'Sword' matches '/^sw/i'"), json!(true));
        assert_eq!(eval("'Sword' matches '/^sw/'"), json!(false));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            eval_with("'a' matches '/(/'", json!({})),
            Err(ExpressionError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_variables_and_members() {
        let scope = json!({"value": 3, "item": {"tags": ["a", "b"], "price": 12.5}});
        assert_eq!(eval_with("value > 2", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval_with("item.tags[1]", scope.clone()).unwrap(), json!("b"));
        assert_eq!(eval_with("item['price'] * 2", scope.clone()).unwrap(), json!(25.0));
        assert_eq!(eval_with("item.missing", scope.clone()).unwrap(), json!(null));
        assert_eq!(
            eval_with("missing > 2", scope.clone()),
            Err(ExpressionError::UnknownVariable("missing".into()))
        );
        assert!(matches!(
            eval_with("value.foo", scope),
            Err(ExpressionError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(eval("1 > 2 ? 'a' : 'b'"), json!("b"));
        assert_eq!(eval("'' ?: 'fallback'"), json!("fallback"));
        assert_eq!(eval("'set' ?: 'fallback'"), json!("set"));
        assert_eq!(eval_with("missing ?? 5", json!({})).unwrap(), json!(5));
        assert_eq!(eval_with("v ?? 5", json!({"v": 0})).unwrap(), json!(0));
    }
}
