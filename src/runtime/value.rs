//! Runtime values.
//!
//! A [`Value`] is immutable data plus an optional variable binding. The
//! binding records which variable the value was read from, which is what lets
//! assignment targets, `+=` and container writes find their way back to
//! storage without a separate lvalue type. Cloning is cheap: strings share an
//! `Rc`, lists and maps clone their spines.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::runtime::matrix::Matrix;
use crate::runtime::signal::{EvalResult, Flow};

/// Comparison slack for numeric equality and truthiness: 1024 times the
/// smallest positive double.
pub const EPSILON: f64 = 1024.0 * f64::from_bits(1);

/// A function shape captured from the left side of `->`: name, parameter
/// names, and variables pulled in from the defining scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<String>,
    pub outers: Vec<String>,
}

/// Map keys are restricted to scalars so key ordering stays total and cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum MapKey {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Result<MapKey, Flow> {
        match &value.data {
            ValueData::Null => Ok(MapKey::Null),
            ValueData::Bool(b) => Ok(MapKey::Bool(*b)),
            ValueData::Number(n) => Ok(MapKey::Number(*n)),
            ValueData::Str(s) => Ok(MapKey::Str(Rc::clone(s))),
            _ => Err(Flow::internal("Only scalar values can be used as map keys")),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Null => Value::null(),
            MapKey::Bool(b) => Value::bool(*b),
            MapKey::Number(n) => Value::number(*n),
            MapKey::Str(s) => Value::str(Rc::clone(s)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MapKey::Null => 0,
            MapKey::Bool(_) => 1,
            MapKey::Number(_) => 2,
            MapKey::Str(_) => 3,
        }
    }

    pub fn render(&self) -> String {
        match self {
            MapKey::Null => "null".to_string(),
            MapKey::Bool(b) => b.to_string(),
            MapKey::Number(n) => format_number(*n),
            MapKey::Str(s) => s.to_string(),
        }
    }
}

impl Eq for MapKey {}

impl Ord for MapKey {
    fn cmp(&self, other: &MapKey) -> Ordering {
        match (self, other) {
            (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
            (MapKey::Number(a), MapKey::Number(b)) => a.total_cmp(b),
            (MapKey::Str(a), MapKey::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for MapKey {
    fn partial_cmp(&self, other: &MapKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub enum ValueData {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// `constructor` marks a list freshly built by the `l()` form, which is
    /// the only kind that assignment will unpack.
    List {
        items: Vec<Value>,
        constructor: bool,
    },
    Map(BTreeMap<MapKey, Value>),
    Matrix(Matrix),
    Signature(Rc<Signature>),
    /// An `outer(name)` capture request inside a signature.
    Outer(Rc<str>),
}

#[derive(Debug, Clone)]
pub struct Value {
    pub data: ValueData,
    /// Name of the variable this value was read from, if any.
    pub bound: Option<Rc<str>>,
}

impl Value {
    pub fn null() -> Value {
        Value { data: ValueData::Null, bound: None }
    }

    pub fn bool(b: bool) -> Value {
        Value { data: ValueData::Bool(b), bound: None }
    }

    pub fn number(n: f64) -> Value {
        Value { data: ValueData::Number(n), bound: None }
    }

    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value { data: ValueData::Str(s.into()), bound: None }
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value {
            data: ValueData::List { items, constructor: false },
            bound: None,
        }
    }

    /// A list produced by the `l(...)` constructor form, eligible for
    /// unpacking assignment.
    pub fn constructor_list(items: Vec<Value>) -> Value {
        Value {
            data: ValueData::List { items, constructor: true },
            bound: None,
        }
    }

    pub fn map(entries: BTreeMap<MapKey, Value>) -> Value {
        Value { data: ValueData::Map(entries), bound: None }
    }

    pub fn matrix(m: Matrix) -> Value {
        Value { data: ValueData::Matrix(m), bound: None }
    }

    pub fn signature(sig: Signature) -> Value {
        Value { data: ValueData::Signature(Rc::new(sig)), bound: None }
    }

    pub fn outer(name: impl Into<Rc<str>>) -> Value {
        let name = name.into();
        Value {
            bound: Some(Rc::clone(&name)),
            data: ValueData::Outer(name),
        }
    }

    /// The value as read from variable `name`. Loses the constructor mark, so
    /// a list that has been stored once no longer unpacks.
    pub fn rebound_to(&self, name: impl Into<Rc<str>>) -> Value {
        let data = match &self.data {
            ValueData::List { items, .. } => ValueData::List {
                items: items.clone(),
                constructor: false,
            },
            other => other.clone(),
        };
        Value { data, bound: Some(name.into()) }
    }

    pub fn unbound(&self) -> Value {
        Value { data: self.data.clone(), bound: None }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, ValueData::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.data,
            ValueData::Number(_) | ValueData::Bool(_) | ValueData::Null
        )
    }

    /// Numeric reading without a type check. Callers gate on `is_numeric`.
    fn raw_number(&self) -> f64 {
        match &self.data {
            ValueData::Number(n) => *n,
            ValueData::Bool(true) => 1.0,
            _ => 0.0,
        }
    }

    pub fn as_number(&self) -> Result<f64, Flow> {
        if self.is_numeric() {
            Ok(self.raw_number())
        } else {
            Err(Flow::internal("Operand has to be of a numeric type"))
        }
    }

    pub fn as_int(&self) -> Result<i64, Flow> {
        Ok((self.as_number()? + EPSILON) as i64)
    }

    pub fn truthy(&self) -> bool {
        match &self.data {
            ValueData::Null => false,
            ValueData::Bool(b) => *b,
            ValueData::Number(n) => n.abs() > EPSILON,
            ValueData::Str(s) => !s.is_empty(),
            ValueData::List { items, .. } => !items.is_empty(),
            ValueData::Map(m) => !m.is_empty(),
            ValueData::Matrix(m) => !m.is_zero(),
            ValueData::Signature(_) | ValueData::Outer(_) => true,
        }
    }

    /// Printable form. Fails for non-finite numbers, which have no textual
    /// program representation.
    pub fn as_text(&self) -> Result<String, Flow> {
        match &self.data {
            ValueData::Number(n) if !n.is_finite() => {
                Err(Flow::math(format!("Incorrect number format for {n}")))
            }
            ValueData::List { items, .. } => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(item.as_text()?);
                }
                Ok(format!("[{}]", parts.join(", ")))
            }
            ValueData::Map(entries) => {
                let mut parts = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    parts.push(format!("{}: {}", k.render(), v.as_text()?));
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            _ => Ok(self.display()),
        }
    }

    /// Infallible rendering, used for comparisons and debug output. Unlike
    /// [`Value::as_text`] it spells out non-finite numbers.
    pub fn display(&self) -> String {
        match &self.data {
            ValueData::Null => "null".to_string(),
            ValueData::Bool(b) => b.to_string(),
            ValueData::Number(n) => format_number(*n),
            ValueData::Str(s) => s.to_string(),
            ValueData::List { items, .. } => {
                let parts: Vec<String> = items.iter().map(Value::display).collect();
                format!("[{}]", parts.join(", "))
            }
            ValueData::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.render(), v.display()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            ValueData::Matrix(m) => m.render(),
            ValueData::Signature(sig) => format!("{}(...) ->", sig.name),
            ValueData::Outer(name) => format!("outer({name})"),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.data {
            ValueData::Null => "null",
            ValueData::Bool(_) => "boolean",
            ValueData::Number(_) => "number",
            ValueData::Str(_) => "string",
            ValueData::List { .. } => "list",
            ValueData::Map(_) => "map",
            ValueData::Matrix(_) => "matrix",
            ValueData::Signature(_) => "function signature",
            ValueData::Outer(_) => "outer binding",
        }
    }

    /// Language-level equality: null equals only null, numerics compare with
    /// epsilon slack, everything else compares its rendered form, so
    /// `1 == '1'` holds.
    pub fn val_equals(&self, other: &Value) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Null, ValueData::Null) => true,
            (ValueData::Null, _) | (_, ValueData::Null) => false,
            _ if self.is_numeric() && other.is_numeric() => {
                (self.raw_number() - other.raw_number()).abs() < EPSILON
            }
            (ValueData::Matrix(a), ValueData::Matrix(b)) => a == b,
            _ => self.display() == other.display(),
        }
    }

    /// Language-level ordering: null sorts first, numbers numerically,
    /// everything else by rendered form.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (&self.data, &other.data) {
            (ValueData::Null, ValueData::Null) => Ordering::Equal,
            (ValueData::Null, _) => Ordering::Less,
            (_, ValueData::Null) => Ordering::Greater,
            _ if self.is_numeric() && other.is_numeric() => {
                self.raw_number().total_cmp(&other.raw_number())
            }
            _ => self.display().cmp(&other.display()),
        }
    }

    pub fn add(&self, other: &Value) -> EvalResult {
        if self.is_numeric() && other.is_numeric() {
            return Ok(Value::number(self.raw_number() + other.raw_number()));
        }
        match (&self.data, &other.data) {
            (ValueData::Matrix(a), _) => matrix_additive(a, other, Matrix::add),
            (ValueData::List { items, .. }, _) => list_zip(items, other, Value::add),
            _ => Ok(Value::str(format!("{}{}", self.as_text()?, other.as_text()?))),
        }
    }

    pub fn subtract(&self, other: &Value) -> EvalResult {
        if self.is_numeric() && other.is_numeric() {
            return Ok(Value::number(self.raw_number() - other.raw_number()));
        }
        match (&self.data, &other.data) {
            (ValueData::Matrix(a), _) => matrix_additive(a, other, Matrix::subtract),
            (ValueData::List { items, .. }, _) => list_zip(items, other, Value::subtract),
            _ => Err(Flow::internal("Operand has to be of a numeric type")),
        }
    }

    pub fn multiply(&self, other: &Value) -> EvalResult {
        if self.is_numeric() && other.is_numeric() {
            return Ok(Value::number(self.raw_number() * other.raw_number()));
        }
        match (&self.data, &other.data) {
            (ValueData::Str(s), _) if other.is_numeric() => {
                Ok(Value::str(repeat_str(s, other.as_int()?)))
            }
            (_, ValueData::Str(s)) if self.is_numeric() => {
                Ok(Value::str(repeat_str(s, self.as_int()?)))
            }
            (ValueData::Matrix(a), ValueData::Matrix(b)) => Ok(Value::matrix(a.multiply(b)?)),
            (ValueData::Matrix(a), ValueData::List { items, .. }) => {
                Ok(Value::matrix(a.multiply(&Matrix::column(numbers_of(items)?))?))
            }
            (ValueData::Matrix(a), _) if other.is_numeric() => {
                Ok(Value::matrix(a.scale(other.raw_number())))
            }
            (_, ValueData::Matrix(b)) if self.is_numeric() => {
                Ok(Value::matrix(b.scale(self.raw_number())))
            }
            (ValueData::List { items, .. }, _) => list_zip(items, other, Value::multiply),
            (_, ValueData::List { items, .. }) if self.is_numeric() => {
                list_zip(items, self, Value::multiply)
            }
            _ => Err(Flow::internal("Operand has to be of a numeric type")),
        }
    }

    /// Division never traps on a zero divisor: the result follows IEEE 754.
    pub fn divide(&self, other: &Value) -> EvalResult {
        if self.is_numeric() && other.is_numeric() {
            return Ok(Value::number(self.raw_number() / other.raw_number()));
        }
        match (&self.data, &other.data) {
            (ValueData::Matrix(a), _) if other.is_numeric() => {
                Ok(Value::matrix(a.scale(1.0 / other.raw_number())))
            }
            (ValueData::List { items, .. }, _) => list_zip(items, other, Value::divide),
            _ => Err(Flow::internal("Operand has to be of a numeric type")),
        }
    }

    /// Element count for containers, rendered length for scalars.
    pub fn len(&self) -> usize {
        match &self.data {
            ValueData::Str(s) => s.chars().count(),
            ValueData::List { items, .. } => items.len(),
            ValueData::Map(m) => m.len(),
            ValueData::Matrix(m) => m.rows() * m.cols(),
            _ => self.display().chars().count(),
        }
    }
}

fn repeat_str(s: &str, count: i64) -> String {
    if count <= 0 {
        String::new()
    } else {
        s.repeat(count as usize)
    }
}

fn numbers_of(items: &[Value]) -> Result<Vec<f64>, Flow> {
    items.iter().map(Value::as_number).collect()
}

fn matrix_additive(
    a: &Matrix,
    other: &Value,
    op: impl Fn(&Matrix, &Matrix) -> Result<Matrix, Flow>,
) -> EvalResult {
    match &other.data {
        ValueData::Matrix(b) => Ok(Value::matrix(op(a, b)?)),
        ValueData::List { items, .. } => {
            Ok(Value::matrix(op(a, &Matrix::column(numbers_of(items)?))?))
        }
        _ => Err(Flow::internal(
            "Cannot perform operation on a matrix and a non-matrix value",
        )),
    }
}

/// Pairwise when both sides are lists, broadcast otherwise.
fn list_zip(items: &[Value], other: &Value, op: impl Fn(&Value, &Value) -> EvalResult) -> EvalResult {
    match &other.data {
        ValueData::List { items: rhs, .. } => {
            if items.len() != rhs.len() {
                return Err(Flow::internal("Cannot perform operation on lists of uneven sizes"));
            }
            let out: Result<Vec<Value>, Flow> =
                items.iter().zip(rhs).map(|(a, b)| op(a, b)).collect();
            Ok(Value::list(out?))
        }
        _ => {
            let out: Result<Vec<Value>, Flow> = items.iter().map(|a| op(a, other)).collect();
            Ok(Value::list(out?))
        }
    }
}

/// Integral finite numbers render without a fractional part.
pub(crate) fn format_number(v: f64) -> String {
    if v.is_finite() && v == v.trunc() {
        if v.abs() < 9.2e18 {
            format!("{}", v as i64)
        } else {
            format!("{v:.0}")
        }
    } else {
        format!("{v}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.data {
            ValueData::Null => serializer.serialize_unit(),
            ValueData::Bool(b) => serializer.serialize_bool(*b),
            ValueData::Number(n) => {
                if n.is_finite() && *n == n.trunc() && n.abs() < 9.2e18 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            ValueData::Str(s) => serializer.serialize_str(s),
            ValueData::List { items, .. } => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ValueData::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&k.render(), v)?;
                }
                map.end()
            }
            ValueData::Matrix(m) => {
                let mut seq = serializer.serialize_seq(Some(m.rows()))?;
                for r in 0..m.rows() {
                    let row: Vec<f64> = (0..m.cols()).filter_map(|c| m.get(r, c)).collect();
                    seq.serialize_element(&row)?;
                }
                seq.end()
            }
            ValueData::Signature(sig) => serializer.serialize_str(&sig.name),
            ValueData::Outer(name) => serializer.serialize_str(name),
        }
    }
}
