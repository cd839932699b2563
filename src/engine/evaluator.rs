//! In-memory evaluator for query expression trees
//!
//! Evaluation is synchronous and runs to completion. Every operator reads an
//! immutable row snapshot and produces new rows; sources are never modified.
//!
//! Trees reaching this module must already be bound to concrete sources. A
//! query-root placeholder anywhere in a data-source position is rejected as
//! unsupported rather than treated as an empty sequence.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use crate::errors::{QueryError, QueryResult};
use crate::expr::{BinaryOp, Call, Expr, Method, Operand, QueryRoot};

use super::compare::ValueOrdering;
use super::result::Evaluated;

/// Lambda parameter bindings, innermost last
type Bindings<'a> = [(&'a str, &'a Value)];

/// The local query engine
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalEngine;

impl LocalEngine {
    /// Create a new engine
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates a tree to a sequence or a single value.
    ///
    /// Sources are read as they are at the time of the call. The same tree
    /// over the same rows yields the same result.
    pub fn evaluate(&self, expr: &Expr) -> QueryResult<Evaluated> {
        match expr {
            Expr::Source(source) => Ok(Evaluated::Sequence(source.snapshot())),
            Expr::Root(root) => Err(unbound_root(root)),
            Expr::Call(call) => self.eval_call(call),
            other => Ok(Evaluated::Scalar(self.eval_scalar(other, &[])?)),
        }
    }

    /// Checks that a sequence tree can be evaluated, without evaluating it.
    ///
    /// Verifies operator arity, lambda positions, that every data-source
    /// position is itself a sequence, and that no placeholder is left unbound.
    pub fn validate(&self, expr: &Expr) -> QueryResult<()> {
        match expr {
            Expr::Source(_) => Ok(()),
            Expr::Root(root) => Err(unbound_root(root)),
            Expr::Call(call) => {
                Self::check_arguments(call)?;
                let source = &call.args[0];
                if let Some(inner) = source.as_call() {
                    if inner.method.is_terminal() {
                        return Err(QueryError::unsupported(format!(
                            "{} produces a single value and cannot be the source of {}",
                            inner.method, call.method
                        )));
                    }
                }
                if call.method.is_then_by() && !Self::is_ordered(source) {
                    return Err(QueryError::invalid_operation(format!(
                        "{} requires an ordered source",
                        call.method
                    )));
                }
                self.validate(source)
            }
            other => Err(QueryError::unsupported(format!(
                "{} is not a sequence",
                other
            ))),
        }
    }

    fn is_ordered(expr: &Expr) -> bool {
        expr.as_call()
            .map_or(false, |c| c.method.is_ordering() || c.method.is_then_by())
    }

    fn check_arguments(call: &Call) -> QueryResult<()> {
        let argc = call.args.len();
        let has_lambda = matches!(call.args.get(1), Some(Expr::Lambda(_)));
        let ok = match call.method.operand() {
            Operand::None => argc == 1,
            Operand::Lambda => argc == 2 && has_lambda,
            Operand::OptionalLambda => argc == 1 || (argc == 2 && has_lambda),
            Operand::Value => argc == 2 && !has_lambda,
            Operand::Variadic => argc >= 1,
        };
        if ok {
            return Ok(());
        }
        let expected = match call.method.operand() {
            Operand::None => "a source only",
            Operand::Lambda => "a source and a lambda",
            Operand::OptionalLambda => "a source and an optional lambda",
            Operand::Value => "a source and a value",
            Operand::Variadic => "at least a source",
        };
        Err(QueryError::unsupported(format!(
            "{} expects {}, got {} argument(s)",
            call.method, expected, argc
        )))
    }

    fn eval_call(&self, call: &Call) -> QueryResult<Evaluated> {
        Self::check_arguments(call)?;
        let source = || self.eval_source(&call.args[0]);
        let operand = call.args.get(1);

        let result = match &call.method {
            Method::OrderBy
            | Method::OrderByDescending
            | Method::ThenBy
            | Method::ThenByDescending => Evaluated::Sequence(self.eval_ordering(call)?),
            Method::Where => Evaluated::Sequence(self.filter_rows(source()?, operand)?),
            Method::Select => {
                let selector = &call.args[1];
                let rows = source()?
                    .iter()
                    .map(|row| self.invoke(selector, row))
                    .collect::<QueryResult<Vec<_>>>()?;
                Evaluated::Sequence(rows)
            }
            Method::Skip => {
                let n = self.integer_operand(call)?;
                let rows = source()?;
                Evaluated::Sequence(rows.into_iter().skip(n.max(0) as usize).collect())
            }
            Method::Take => {
                let n = self.integer_operand(call)?;
                let mut rows = source()?;
                rows.truncate(n.max(0) as usize);
                Evaluated::Sequence(rows)
            }
            Method::Distinct => {
                let mut distinct: Vec<Value> = Vec::new();
                for row in source()? {
                    if !distinct.iter().any(|seen| ValueOrdering::equals(seen, &row)) {
                        distinct.push(row);
                    }
                }
                Evaluated::Sequence(distinct)
            }
            Method::Reverse => {
                let mut rows = source()?;
                rows.reverse();
                Evaluated::Sequence(rows)
            }
            // Provider-specific operators that reach the engine were approved
            // by the guard and have no in-memory effect.
            Method::Extension(_) => Evaluated::Sequence(source()?),
            Method::Count | Method::LongCount => {
                let count = self.filter_rows(source()?, operand)?.len();
                Evaluated::Scalar(Value::from(count as u64))
            }
            Method::Any => {
                let any = match operand {
                    Some(pred) => {
                        let mut found = false;
                        for row in source()? {
                            if self.test(pred, &row)? {
                                found = true;
                                break;
                            }
                        }
                        found
                    }
                    None => !source()?.is_empty(),
                };
                Evaluated::Scalar(Value::Bool(any))
            }
            Method::All => {
                let pred = &call.args[1];
                let mut all = true;
                for row in source()? {
                    if !self.test(pred, &row)? {
                        all = false;
                        break;
                    }
                }
                Evaluated::Scalar(Value::Bool(all))
            }
            Method::Contains => {
                let needle = self.eval_scalar(&call.args[1], &[])?;
                let found = source()?
                    .iter()
                    .any(|row| ValueOrdering::equals(row, &needle));
                Evaluated::Scalar(Value::Bool(found))
            }
            Method::First
            | Method::FirstOrDefault
            | Method::Single
            | Method::SingleOrDefault
            | Method::Last
            | Method::LastOrDefault => {
                let matching = self.filter_rows(source()?, operand)?;
                Evaluated::Scalar(Self::pick(&call.method, matching)?)
            }
            Method::ElementAt => {
                let index = self.integer_operand(call)?;
                let rows = source()?;
                let len = rows.len();
                let element = usize::try_from(index)
                    .ok()
                    .and_then(|i| rows.into_iter().nth(i))
                    .ok_or_else(|| {
                        QueryError::invalid_operation(format!(
                            "index {} is out of range for a sequence of {} element(s)",
                            index, len
                        ))
                    })?;
                Evaluated::Scalar(element)
            }
            Method::Sum => {
                let values = self.project(source()?, operand)?;
                Evaluated::Scalar(Self::sum(&values)?)
            }
            Method::Min | Method::Max => {
                let values = self.project(source()?, operand)?;
                Evaluated::Scalar(Self::extreme(&call.method, values)?)
            }
            Method::Average => {
                let values = self.project(source()?, operand)?;
                Evaluated::Scalar(Self::average(&values)?)
            }
        };
        Ok(result)
    }

    fn eval_source(&self, expr: &Expr) -> QueryResult<Vec<Value>> {
        match self.evaluate(expr)? {
            Evaluated::Sequence(rows) => Ok(rows),
            Evaluated::Scalar(_) => Err(QueryError::unsupported(format!(
                "{} produces a single value and cannot be used as a sequence",
                expr
            ))),
        }
    }

    /// Evaluates an `OrderBy` chain, including every `ThenBy` refinement.
    ///
    /// The sort is stable: rows with equal keys keep their source order.
    fn eval_ordering(&self, call: &Call) -> QueryResult<Vec<Value>> {
        let mut keys: Vec<(&Expr, bool)> = Vec::new();
        let mut node = call;
        loop {
            keys.push((&node.args[1], node.method.is_descending()));
            if node.method.is_ordering() {
                break;
            }
            match node.args[0].as_call() {
                Some(inner) if inner.method.is_ordering() || inner.method.is_then_by() => {
                    Self::check_arguments(inner)?;
                    node = inner;
                }
                _ => {
                    return Err(QueryError::invalid_operation(format!(
                        "{} requires an ordered source",
                        node.method
                    )))
                }
            }
        }
        // Primary key first
        keys.reverse();

        let mut keyed = Vec::new();
        for row in self.eval_source(&node.args[0])? {
            let row_keys = keys
                .iter()
                .map(|(selector, _)| self.invoke(selector, &row))
                .collect::<QueryResult<Vec<_>>>()?;
            keyed.push((row_keys, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (i, (_, descending)) in keys.iter().enumerate() {
                let ordering = ValueOrdering::sort_order(&a[i], &b[i]);
                let ordering = if *descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn filter_rows(&self, rows: Vec<Value>, predicate: Option<&Expr>) -> QueryResult<Vec<Value>> {
        let Some(predicate) = predicate else {
            return Ok(rows);
        };
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if self.test(predicate, &row)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    fn project(&self, rows: Vec<Value>, selector: Option<&Expr>) -> QueryResult<Vec<Value>> {
        match selector {
            Some(selector) => rows.iter().map(|row| self.invoke(selector, row)).collect(),
            None => Ok(rows),
        }
    }

    fn test(&self, predicate: &Expr, row: &Value) -> QueryResult<bool> {
        match self.invoke(predicate, row)? {
            Value::Bool(b) => Ok(b),
            other => Err(QueryError::evaluation(format!(
                "predicate {} returned {} instead of a boolean",
                predicate, other
            ))),
        }
    }

    fn invoke(&self, lambda: &Expr, row: &Value) -> QueryResult<Value> {
        match lambda {
            Expr::Lambda(l) => self.eval_scalar(&l.body, &[(l.param.as_str(), row)]),
            other => Err(QueryError::unsupported(format!(
                "expected a lambda, found {}",
                other
            ))),
        }
    }

    fn integer_operand(&self, call: &Call) -> QueryResult<i64> {
        let value = self.eval_scalar(&call.args[1], &[])?;
        value.as_i64().ok_or_else(|| {
            QueryError::evaluation(format!(
                "{} expects an integer, got {}",
                call.method, value
            ))
        })
    }

    fn pick(method: &Method, mut rows: Vec<Value>) -> QueryResult<Value> {
        let no_elements = || QueryError::invalid_operation("Sequence contains no elements");
        let many = || QueryError::invalid_operation("Sequence contains more than one element");
        match method {
            Method::First => rows.into_iter().next().ok_or_else(no_elements),
            Method::FirstOrDefault => Ok(rows.into_iter().next().unwrap_or(Value::Null)),
            Method::Last => rows.pop().ok_or_else(no_elements),
            Method::LastOrDefault => Ok(rows.pop().unwrap_or(Value::Null)),
            Method::Single => match rows.len() {
                0 => Err(no_elements()),
                1 => rows.pop().ok_or_else(no_elements),
                _ => Err(many()),
            },
            Method::SingleOrDefault => match rows.len() {
                0 => Ok(Value::Null),
                1 => Ok(rows.pop().unwrap_or(Value::Null)),
                _ => Err(many()),
            },
            other => Err(QueryError::unsupported(format!(
                "{} does not select an element",
                other
            ))),
        }
    }

    /// Sums numbers, skipping nulls. Integers stay integral until a float
    /// appears; an empty sequence sums to 0.
    fn sum(values: &[Value]) -> QueryResult<Value> {
        enum Total {
            Int(i64),
            Float(f64),
        }

        let mut total = Total::Int(0);
        for value in values {
            let n = match value {
                Value::Null => continue,
                Value::Number(n) => n,
                other => {
                    return Err(QueryError::evaluation(format!(
                        "Sum expects numbers, got {}",
                        other
                    )))
                }
            };
            total = match (total, n.as_i64()) {
                (Total::Int(acc), Some(i)) => Total::Int(acc.checked_add(i).ok_or_else(|| {
                    QueryError::evaluation("integer overflow in Sum")
                })?),
                (Total::Int(acc), None) => Total::Float(acc as f64 + n.as_f64().unwrap_or(0.0)),
                (Total::Float(acc), _) => Total::Float(acc + n.as_f64().unwrap_or(0.0)),
            };
        }

        match total {
            Total::Int(i) => Ok(Value::from(i)),
            Total::Float(f) => float_value(f),
        }
    }

    fn average(values: &[Value]) -> QueryResult<Value> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in values {
            match value {
                Value::Null => {}
                Value::Number(n) => {
                    sum += n.as_f64().unwrap_or(0.0);
                    count += 1;
                }
                other => {
                    return Err(QueryError::evaluation(format!(
                        "Average expects numbers, got {}",
                        other
                    )))
                }
            }
        }
        if values.is_empty() {
            return Err(QueryError::invalid_operation("Sequence contains no elements"));
        }
        if count == 0 {
            return Ok(Value::Null);
        }
        float_value(sum / count as f64)
    }

    /// Min or Max over comparable values, skipping nulls
    fn extreme(method: &Method, values: Vec<Value>) -> QueryResult<Value> {
        if values.is_empty() {
            return Err(QueryError::invalid_operation("Sequence contains no elements"));
        }
        let want = if *method == Method::Max {
            Ordering::Greater
        } else {
            Ordering::Less
        };

        let mut best: Option<Value> = None;
        for value in values.into_iter().filter(|v| !v.is_null()) {
            best = match best {
                None => Some(value),
                Some(current) => {
                    let ordering = ValueOrdering::compare(&value, &current).ok_or_else(|| {
                        QueryError::evaluation(format!(
                            "{} cannot compare {} with {}",
                            method, value, current
                        ))
                    })?;
                    if ordering == want {
                        Some(value)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        Ok(best.unwrap_or(Value::Null))
    }

    fn eval_scalar(&self, expr: &Expr, bindings: &Bindings<'_>) -> QueryResult<Value> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Param(name) => bindings
                .iter()
                .rev()
                .find(|(bound, _)| *bound == name.as_str())
                .map(|(_, value)| (*value).clone())
                .ok_or_else(|| QueryError::evaluation(format!("unbound parameter '{}'", name))),
            Expr::Member { target, field } => match self.eval_scalar(target, bindings)? {
                Value::Object(mut map) => map.remove(field).ok_or_else(|| {
                    QueryError::evaluation(format!("row has no field '{}'", field))
                }),
                other => Err(QueryError::evaluation(format!(
                    "cannot read field '{}' of {}",
                    field, other
                ))),
            },
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => Ok(Value::Bool(
                    self.eval_bool(left, bindings)? && self.eval_bool(right, bindings)?,
                )),
                BinaryOp::Or => Ok(Value::Bool(
                    self.eval_bool(left, bindings)? || self.eval_bool(right, bindings)?,
                )),
                _ => {
                    let l = self.eval_scalar(left, bindings)?;
                    let r = self.eval_scalar(right, bindings)?;
                    Self::apply_binary(*op, &l, &r)
                }
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval_bool(inner, bindings)?)),
            Expr::Object(fields) => {
                let mut object = Map::new();
                for (name, value) in fields {
                    object.insert(name.clone(), self.eval_scalar(value, bindings)?);
                }
                Ok(Value::Object(object))
            }
            Expr::Lambda(_) => Err(QueryError::evaluation(
                "a lambda cannot be evaluated as a value",
            )),
            Expr::Call(_) | Expr::Root(_) | Expr::Source(_) => Err(QueryError::unsupported(
                format!("nested query {} inside a lambda body", expr),
            )),
        }
    }

    fn eval_bool(&self, expr: &Expr, bindings: &Bindings<'_>) -> QueryResult<bool> {
        match self.eval_scalar(expr, bindings)? {
            Value::Bool(b) => Ok(b),
            other => Err(QueryError::evaluation(format!(
                "expected a boolean from {}, got {}",
                expr, other
            ))),
        }
    }

    fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> QueryResult<Value> {
        match op {
            BinaryOp::Eq => Ok(Value::Bool(ValueOrdering::equals(l, r))),
            BinaryOp::Ne => Ok(Value::Bool(!ValueOrdering::equals(l, r))),
            _ if op.is_ordering() => {
                // Comparisons against null are false, never an error
                if l.is_null() || r.is_null() {
                    return Ok(Value::Bool(false));
                }
                let ordering = ValueOrdering::compare(l, r).ok_or_else(|| {
                    QueryError::evaluation(format!("cannot compare {} with {}", l, r))
                })?;
                let result = match op {
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::Gte => ordering != Ordering::Less,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                };
                Ok(Value::Bool(result))
            }
            _ => match (l, r) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (Value::Number(a), Value::Number(b)) => Self::arithmetic(op, a, b),
                (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
                    Ok(Value::String(format!("{}{}", a, b)))
                }
                _ => Err(QueryError::evaluation(format!(
                    "operator {} is not defined for {} and {}",
                    op.symbol(),
                    l,
                    r
                ))),
            },
        }
    }

    fn arithmetic(op: BinaryOp, a: &Number, b: &Number) -> QueryResult<Value> {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            if op == BinaryOp::Div && y == 0 {
                return Err(QueryError::evaluation("division by zero"));
            }
            let result = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div => x.checked_div(y),
                _ => None,
            };
            return result.map(Value::from).ok_or_else(|| {
                QueryError::evaluation(format!(
                    "integer overflow in {} {} {}",
                    x,
                    op.symbol(),
                    y
                ))
            });
        }

        let x = a.as_f64().unwrap_or(0.0);
        let y = b.as_f64().unwrap_or(0.0);
        let result = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
            other => {
                return Err(QueryError::evaluation(format!(
                    "operator {} is not arithmetic",
                    other.symbol()
                )))
            }
        };
        float_value(result)
    }
}

fn unbound_root(root: &QueryRoot) -> QueryError {
    QueryError::unsupported(format!(
        "query root {} is not bound to a local source",
        root
    ))
}

fn float_value(f: f64) -> QueryResult<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| QueryError::evaluation(format!("non-finite result {}", f)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{lambda, SourceRef};
    use serde_json::json;

    fn users() -> Expr {
        Expr::Source(SourceRef::new(
            "users",
            vec![
                json!({"id": 1, "name": "a", "age": 30, "team": "x"}),
                json!({"id": 2, "name": "b", "age": 25, "team": "y"}),
                json!({"id": 3, "name": "c", "age": 30, "team": "y"}),
            ],
        ))
    }

    fn call(method: Method, args: Vec<Expr>) -> Expr {
        Expr::call(method, args)
    }

    fn eval(expr: &Expr) -> QueryResult<Evaluated> {
        LocalEngine::new().evaluate(expr)
    }

    #[test]
    fn test_filter_then_project() {
        let filtered = call(
            Method::Where,
            vec![users(), lambda("x", |x| x.field("id").equals(2))],
        );
        let projected = call(Method::Select, vec![filtered, lambda("x", |x| x.field("name"))]);

        assert_eq!(
            eval(&projected).unwrap(),
            Evaluated::Sequence(vec![json!("b")])
        );
    }

    #[test]
    fn test_order_by_then_by_is_stable() {
        let ordered = call(
            Method::OrderByDescending,
            vec![users(), lambda("x", |x| x.field("age"))],
        );
        let refined = call(
            Method::ThenBy,
            vec![ordered, lambda("x", |x| x.field("name"))],
        );
        let names = call(Method::Select, vec![refined, lambda("x", |x| x.field("name"))]);

        assert_eq!(
            eval(&names).unwrap().into_value(),
            json!(["a", "c", "b"])
        );
    }

    #[test]
    fn test_then_by_requires_ordering() {
        let tree = call(Method::ThenBy, vec![users(), lambda("x", |x| x.field("id"))]);
        let err = eval(&tree).unwrap_err();
        assert_eq!(err.code(), "MEMQUERY_INVALID_OPERATION");
        assert!(LocalEngine::new().validate(&tree).is_err());
    }

    #[test]
    fn test_skip_take() {
        let tree = call(
            Method::Take,
            vec![call(Method::Skip, vec![users(), Expr::constant(1)]), Expr::constant(1)],
        );
        let rows = eval(&tree).unwrap().into_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(2));

        let negative = call(Method::Take, vec![users(), Expr::constant(-1)]);
        assert_eq!(eval(&negative).unwrap().len(), Some(0));
    }

    #[test]
    fn test_count_with_predicate() {
        let tree = call(
            Method::Count,
            vec![users(), lambda("x", |x| x.field("team").equals("y"))],
        );
        assert_eq!(eval(&tree).unwrap(), Evaluated::Scalar(json!(2)));
    }

    #[test]
    fn test_first_on_empty_fails() {
        let tree = call(
            Method::First,
            vec![users(), lambda("x", |x| x.field("id").gt(10))],
        );
        let err = eval(&tree).unwrap_err();
        assert_eq!(err.code(), "MEMQUERY_INVALID_OPERATION");

        let tree = call(
            Method::FirstOrDefault,
            vec![users(), lambda("x", |x| x.field("id").gt(10))],
        );
        assert_eq!(eval(&tree).unwrap(), Evaluated::Scalar(Value::Null));
    }

    #[test]
    fn test_single_with_many_fails() {
        let tree = call(
            Method::Single,
            vec![users(), lambda("x", |x| x.field("age").equals(30))],
        );
        assert!(eval(&tree).is_err());

        let tree = call(
            Method::SingleOrDefault,
            vec![users(), lambda("x", |x| x.field("age").equals(25))],
        );
        assert_eq!(eval(&tree).unwrap().into_value()["name"], json!("b"));
    }

    #[test]
    fn test_aggregates() {
        let age = || lambda("x", |x| x.field("age"));
        let sum = call(Method::Sum, vec![users(), age()]);
        let max = call(Method::Max, vec![users(), age()]);
        let min = call(Method::Min, vec![users(), lambda("x", |x| x.field("name"))]);
        let avg = call(Method::Average, vec![users(), lambda("x", |x| x.field("id"))]);

        assert_eq!(eval(&sum).unwrap(), Evaluated::Scalar(json!(85)));
        assert_eq!(eval(&max).unwrap(), Evaluated::Scalar(json!(30)));
        assert_eq!(eval(&min).unwrap(), Evaluated::Scalar(json!("a")));
        assert_eq!(eval(&avg).unwrap(), Evaluated::Scalar(json!(2.0)));
    }

    #[test]
    fn test_sum_of_strings_fails() {
        let tree = call(Method::Sum, vec![users(), lambda("x", |x| x.field("name"))]);
        assert_eq!(eval(&tree).unwrap_err().code(), "MEMQUERY_EVALUATION_FAILED");
    }

    #[test]
    fn test_empty_sum_and_max() {
        let empty = Expr::Source(SourceRef::new("empty", vec![]));
        assert_eq!(
            eval(&call(Method::Sum, vec![empty.clone()])).unwrap(),
            Evaluated::Scalar(json!(0))
        );
        assert!(eval(&call(Method::Max, vec![empty])).is_err());
    }

    #[test]
    fn test_last_variants() {
        let empty = Expr::Source(SourceRef::new("empty", vec![]));
        assert_eq!(
            eval(&call(Method::LastOrDefault, vec![empty.clone()])).unwrap(),
            Evaluated::Scalar(Value::Null)
        );
        assert_eq!(
            eval(&call(Method::Last, vec![empty])).unwrap_err().code(),
            "MEMQUERY_INVALID_OPERATION"
        );

        let last_y = call(
            Method::Last,
            vec![users(), lambda("x", |x| x.field("team").equals("y"))],
        );
        assert_eq!(eval(&last_y).unwrap().into_value()["id"], json!(3));
    }

    #[test]
    fn test_element_at_in_range() {
        let rows = Expr::Source(SourceRef::new("n", vec![json!(1), json!(2)]));
        let tree = call(Method::ElementAt, vec![rows, Expr::constant(1)]);
        assert_eq!(eval(&tree).unwrap(), Evaluated::Scalar(json!(2)));
    }

    #[test]
    fn test_source_read_at_evaluation() {
        let source = SourceRef::new("n", vec![json!(1)]);
        let tree = call(Method::Count, vec![Expr::Source(source.clone())]);
        assert_eq!(eval(&tree).unwrap(), Evaluated::Scalar(json!(1)));

        source.extend(vec![json!(2), json!(3)]);
        assert_eq!(eval(&tree).unwrap(), Evaluated::Scalar(json!(3)));
    }

    #[test]
    fn test_distinct_and_contains() {
        let teams = call(Method::Select, vec![users(), lambda("x", |x| x.field("team"))]);
        let distinct = call(Method::Distinct, vec![teams]);
        assert_eq!(eval(&distinct).unwrap().into_value(), json!(["x", "y"]));

        let contains = call(Method::Contains, vec![distinct, Expr::constant("y")]);
        assert_eq!(eval(&contains).unwrap(), Evaluated::Scalar(json!(true)));
    }

    #[test]
    fn test_any_all() {
        let any = call(Method::Any, vec![users(), lambda("x", |x| x.field("age").lt(26))]);
        let all = call(Method::All, vec![users(), lambda("x", |x| x.field("age").gte(26))]);
        assert_eq!(eval(&any).unwrap(), Evaluated::Scalar(json!(true)));
        assert_eq!(eval(&all).unwrap(), Evaluated::Scalar(json!(false)));
    }

    #[test]
    fn test_object_projection_and_arithmetic() {
        let tree = call(
            Method::Select,
            vec![
                users(),
                lambda("x", |x| {
                    Expr::object([
                        ("label", x.clone().field("name").plus("!")),
                        ("next", x.field("age").plus(1)),
                    ])
                }),
            ],
        );
        let rows = eval(&tree).unwrap().into_rows().unwrap();
        assert_eq!(rows[0], json!({"label": "a!", "next": 31}));
    }

    #[test]
    fn test_unbound_root_is_unsupported() {
        let tree = call(
            Method::Where,
            vec![Expr::entity_root("users"), lambda("x", |x| x.field("id").equals(1))],
        );
        assert!(eval(&tree).unwrap_err().is_unsupported());
        assert!(LocalEngine::new().validate(&tree).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_missing_lambda_is_unsupported() {
        let tree = call(Method::Where, vec![users(), Expr::constant(true)]);
        assert!(eval(&tree).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_non_boolean_predicate_fails() {
        let tree = call(Method::Where, vec![users(), lambda("x", |x| x.field("id"))]);
        assert_eq!(eval(&tree).unwrap_err().code(), "MEMQUERY_EVALUATION_FAILED");
    }

    #[test]
    fn test_null_comparisons_are_false() {
        let rows = Expr::Source(SourceRef::new("n", vec![json!({"v": null}), json!({"v": 3})]));
        let tree = call(Method::Count, vec![rows, lambda("x", |x| x.field("v").gt(1))]);
        assert_eq!(eval(&tree).unwrap(), Evaluated::Scalar(json!(1)));
    }

    #[test]
    fn test_element_at_out_of_range() {
        let tree = call(Method::ElementAt, vec![users(), Expr::constant(5)]);
        assert_eq!(eval(&tree).unwrap_err().code(), "MEMQUERY_INVALID_OPERATION");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let tree = call(
            Method::OrderBy,
            vec![users(), lambda("x", |x| x.field("team"))],
        );
        let first = eval(&tree).unwrap();
        for _ in 0..3 {
            assert_eq!(eval(&tree).unwrap(), first);
        }
    }
}
