//! Filter primitives and their compilation into WHERE fragments.
//!
//! A [`Predicate`] is one field/operator/values condition. Predicates combine
//! as AND-of-ORs: the outer slice is AND-joined, each inner slice OR-joined
//! and parenthesized. Compilation pushes every bound value into a shared
//! [`ParamList`] so placeholder numbering stays aligned across the statement.
//!
//! Optional scalar functions wrap both sides of a comparison identically,
//! innermost first: `funcs = ["unaccent", "lower"]` turns `x` into
//! `lower(unaccent(x))` for the field reference and each placeholder alike.

use crate::error::{SiftError, SiftResult};
use crate::param::ParamList;
use crate::value::Value;
use std::fmt;

/// Comparison operator of a single predicate.
///
/// Each operator fixes the number of values it takes: `In` accepts any
/// number (including zero), `IsNull` takes none, `Between` exactly two, and
/// the rest exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    In,
    Equals,
    Like,
    IsNull,
    LessThan,
    GreaterThan,
    Between,
}

impl Operator {
    /// Display name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::Equals => "EQUALS",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
            Operator::LessThan => "LESS THAN",
            Operator::GreaterThan => "GREATER THAN",
            Operator::Between => "BETWEEN",
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::Equals => "=",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::Between => "BETWEEN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single filter condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Value>,
    /// Scalar function names applied innermost-first to both sides of the
    /// comparison.
    pub funcs: Vec<String>,
}

impl Predicate {
    /// Create a predicate from its parts.
    pub fn new(field: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            values,
            funcs: Vec::new(),
        }
    }

    /// Attach scalar functions, applied innermost-first.
    pub fn with_funcs<S: Into<String>>(mut self, funcs: impl IntoIterator<Item = S>) -> Self {
        self.funcs = funcs.into_iter().map(Into::into).collect();
        self
    }

    /// field = value
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, vec![value.into()])
    }

    /// field LIKE pattern
    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::new(field, Operator::Like, vec![pattern.into()])
    }

    /// field < value
    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::LessThan, vec![value.into()])
    }

    /// field > value
    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::GreaterThan, vec![value.into()])
    }

    /// field IS NULL
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, Vec::new())
    }

    /// field BETWEEN low AND high
    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::new(field, Operator::Between, vec![low.into(), high.into()])
    }

    /// field IN (values...)
    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(
            field,
            Operator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Wrap an expression in this predicate's scalar functions, innermost
    /// first.
    pub fn wrap_funcs(&self, expr: &str) -> String {
        self.funcs
            .iter()
            .fold(expr.to_string(), |acc, f| format!("{f}({acc})"))
    }

    fn arity_error(&self, expected: usize) -> SiftError {
        SiftError::Arity {
            operator: self.operator.name(),
            expected,
            got: self.values.len(),
        }
    }

    /// Compile this predicate into one boolean SQL fragment, pushing bound
    /// values into `params`.
    pub fn compile(&self, params: &mut ParamList) -> SiftResult<String> {
        let field = self.wrap_funcs(&self.field);
        match self.operator {
            Operator::In => {
                let mut placeholders = Vec::with_capacity(self.values.len());
                for value in &self.values {
                    let idx = params.push(value.clone());
                    placeholders.push(self.wrap_funcs(&format!("${idx}")));
                }
                // An empty list keeps the always-false IN () form.
                Ok(format!("{} IN ({})", field, placeholders.join(", ")))
            }
            Operator::Equals | Operator::Like | Operator::LessThan | Operator::GreaterThan => {
                let [value] = self.values.as_slice() else {
                    return Err(self.arity_error(1));
                };
                let idx = params.push(value.clone());
                Ok(format!(
                    "{} {} {}",
                    field,
                    self.operator.as_sql(),
                    self.wrap_funcs(&format!("${idx}"))
                ))
            }
            Operator::IsNull => {
                if !self.values.is_empty() {
                    return Err(self.arity_error(0));
                }
                Ok(format!("{field} IS NULL"))
            }
            Operator::Between => {
                let [low, high] = self.values.as_slice() else {
                    return Err(self.arity_error(2));
                };
                let low_idx = params.push(low.clone());
                let high_idx = params.push(high.clone());
                Ok(format!(
                    "{} BETWEEN {} AND {}",
                    field,
                    self.wrap_funcs(&format!("${low_idx}")),
                    self.wrap_funcs(&format!("${high_idx}"))
                ))
            }
        }
    }
}

/// Compile AND-of-ORs predicate groups into one fragment per AND group.
///
/// Members of each inner slice are OR-joined and wrapped in parentheses; the
/// caller AND-joins the returned fragments. Empty inner groups are skipped.
/// The first malformed predicate aborts the whole build.
pub fn compile_predicates(
    groups: &[Vec<Predicate>],
    params: &mut ParamList,
) -> SiftResult<Vec<String>> {
    let mut clauses = Vec::with_capacity(groups.len());
    for group in groups {
        if group.is_empty() {
            continue;
        }
        let mut members = Vec::with_capacity(group.len());
        for predicate in group {
            members.push(predicate.compile(params)?);
        }
        clauses.push(format!("({})", members.join(" OR ")));
    }
    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_funcs_applies_innermost_first() {
        let bare = Predicate::equals("table.id", 1);
        assert_eq!(bare.wrap_funcs("table.id"), "table.id");

        let one = Predicate::equals("table.id", 1).with_funcs(["unaccent"]);
        assert_eq!(one.wrap_funcs("table.id"), "unaccent(table.id)");

        let two = Predicate::equals("table.id", 1).with_funcs(["unaccent", "lower"]);
        assert_eq!(two.wrap_funcs("table.id"), "lower(unaccent(table.id))");
        assert_eq!(two.wrap_funcs("$1"), "lower(unaccent($1))");
    }

    #[test]
    fn equals_compiles_with_single_placeholder() {
        let mut params = ParamList::new();
        let sql = Predicate::equals("user.id", 1).compile(&mut params).unwrap();
        assert_eq!(sql, "user.id = $1");
        assert_eq!(params.values(), &[Value::Int(1)]);
    }

    #[test]
    fn funcs_wrap_field_and_placeholder_identically() {
        let mut params = ParamList::new();
        let sql = Predicate::equals("user.name", "Greg")
            .with_funcs(["unaccent", "lower"])
            .compile(&mut params)
            .unwrap();
        assert_eq!(sql, "lower(unaccent(user.name)) = lower(unaccent($1))");
    }

    #[test]
    fn in_list_numbers_each_placeholder() {
        let mut params = ParamList::new();
        let sql = Predicate::in_list("user.id", [1, 2, 3])
            .compile(&mut params)
            .unwrap();
        assert_eq!(sql, "user.id IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_list_stays_always_false() {
        let mut params = ParamList::new();
        let sql = Predicate::in_list("user.id", Vec::<Value>::new())
            .compile(&mut params)
            .unwrap();
        assert_eq!(sql, "user.id IN ()");
        assert!(params.is_empty());
    }

    #[test]
    fn between_takes_two_placeholders() {
        let mut params = ParamList::new();
        let sql = Predicate::between("user.age", 18, 65)
            .compile(&mut params)
            .unwrap();
        assert_eq!(sql, "user.age BETWEEN $1 AND $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn is_null_binds_nothing() {
        let mut params = ParamList::new();
        let sql = Predicate::is_null("user.deleted_at")
            .compile(&mut params)
            .unwrap();
        assert_eq!(sql, "user.deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn wrong_arity_fails_with_operator_name() {
        let mut params = ParamList::new();

        let err = Predicate::new("id", Operator::Equals, vec![1.into(), 2.into()])
            .compile(&mut params)
            .unwrap_err();
        assert!(matches!(
            err,
            SiftError::Arity { operator: "EQUALS", expected: 1, got: 2 }
        ));

        let err = Predicate::new("id", Operator::IsNull, vec![1.into()])
            .compile(&mut params)
            .unwrap_err();
        assert!(matches!(
            err,
            SiftError::Arity { operator: "IS NULL", expected: 0, got: 1 }
        ));

        let err = Predicate::new("id", Operator::Between, vec![1.into()])
            .compile(&mut params)
            .unwrap_err();
        assert!(matches!(
            err,
            SiftError::Arity { operator: "BETWEEN", expected: 2, got: 1 }
        ));

        let err = Predicate::new("id", Operator::LessThan, Vec::new())
            .compile(&mut params)
            .unwrap_err();
        assert!(matches!(err, SiftError::Arity { operator: "LESS THAN", .. }));
    }

    #[test]
    fn groups_or_join_inside_and_between() {
        let groups = vec![
            vec![
                Predicate::equals("user.role", "admin"),
                Predicate::equals("user.role", "owner"),
            ],
            vec![Predicate::greater_than("user.age", 18)],
        ];
        let mut params = ParamList::new();
        let clauses = compile_predicates(&groups, &mut params).unwrap();
        assert_eq!(
            clauses,
            vec![
                "(user.role = $1 OR user.role = $2)".to_string(),
                "(user.age > $3)".to_string(),
            ]
        );
        assert_eq!(
            params.values(),
            &[
                Value::Text("admin".into()),
                Value::Text("owner".into()),
                Value::Int(18),
            ]
        );
    }

    #[test]
    fn empty_groups_compile_to_nothing() {
        let mut params = ParamList::new();
        let clauses = compile_predicates(&[], &mut params).unwrap();
        assert!(clauses.is_empty());

        let clauses = compile_predicates(&[Vec::new()], &mut params).unwrap();
        assert!(clauses.is_empty());
    }

    #[test]
    fn failed_group_aborts_the_build() {
        let groups = vec![
            vec![Predicate::equals("a", 1)],
            vec![Predicate::new("b", Operator::Between, vec![1.into()])],
        ];
        let mut params = ParamList::new();
        assert!(compile_predicates(&groups, &mut params).is_err());
    }
}
