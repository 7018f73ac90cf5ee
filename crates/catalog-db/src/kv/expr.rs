//! # Condition and Update Expressions
//!
//! The small expression language a [`KvTable`](super::KvTable) understands:
//! filter/guard conditions over item attributes, and update actions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Condition                      true when                               │
//! │  ──────────────────────────     ─────────────────────────────────────   │
//! │  Exists                         the item is present                     │
//! │  Missing                        the item is absent                      │
//! │  Eq(a, v)                       item[a] == v                            │
//! │  Ge / Le / Gt (a, n)            item[a] is a number and compares to n   │
//! │  AttrLe(a, b)                   item[a] <= item[b] (both numbers)       │
//! │  SumGe { a, delta, min }        item[a] + delta >= min                  │
//! │  And([..]) / Or([..])           all / any                               │
//! │                                                                         │
//! │  UpdateAction                   effect                                  │
//! │  ──────────────────────────     ─────────────────────────────────────   │
//! │  Set(a, v)                      item[a] = v                             │
//! │  Add(a, n)                      item[a] = item[a] + n (missing = 0)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every condition except `Exists`/`Missing` is false on an absent item.

use serde_json::{Number, Value};

use super::Item;

// =============================================================================
// Condition
// =============================================================================

/// A predicate over a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Exists,
    Missing,
    Eq(String, Value),
    Ge(String, f64),
    Le(String, f64),
    Gt(String, f64),
    AttrLe(String, String),
    SumGe { attr: String, delta: i64, min: i64 },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn eq(attr: &str, value: impl Into<Value>) -> Self {
        Condition::Eq(attr.to_string(), value.into())
    }

    /// Conjunction of `conditions`, or `None` when there are none.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Option<Condition> {
        let mut conditions: Vec<Condition> = conditions.into_iter().collect();
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::And(conditions)),
        }
    }

    /// Evaluates against an item, or against "no item".
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        match self {
            Condition::Exists => item.is_some(),
            Condition::Missing => item.is_none(),
            Condition::And(all) => all.iter().all(|c| c.evaluate(item)),
            Condition::Or(any) => any.iter().any(|c| c.evaluate(item)),
            _ => item.is_some_and(|item| self.evaluate_present(item)),
        }
    }

    fn evaluate_present(&self, item: &Item) -> bool {
        match self {
            Condition::Eq(attr, value) => item.get(attr) == Some(value),
            Condition::Ge(attr, n) => number(item, attr).is_some_and(|v| v >= *n),
            Condition::Le(attr, n) => number(item, attr).is_some_and(|v| v <= *n),
            Condition::Gt(attr, n) => number(item, attr).is_some_and(|v| v > *n),
            Condition::AttrLe(a, b) => match (number(item, a), number(item, b)) {
                (Some(a), Some(b)) => a <= b,
                _ => false,
            },
            Condition::SumGe { attr, delta, min } => item
                .get(attr)
                .and_then(Value::as_i64)
                .and_then(|v| v.checked_add(*delta))
                .is_some_and(|sum| sum >= *min),
            Condition::Exists | Condition::Missing | Condition::And(_) | Condition::Or(_) => {
                self.evaluate(Some(item))
            }
        }
    }
}

fn number(item: &Item, attr: &str) -> Option<f64> {
    item.get(attr).and_then(Value::as_f64)
}

// =============================================================================
// Update Expression
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(String, Value),
    Add(String, i64),
}

/// An ordered list of update actions applied to one item.
///
/// ## Example
/// ```rust,ignore
/// let update = UpdateExpr::new()
///     .add("stock", -2)
///     .set("updated_at", now);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    actions: Vec<UpdateAction>,
}

impl UpdateExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.actions.push(UpdateAction::Set(attr.to_string(), value.into()));
        self
    }

    pub fn add(mut self, attr: &str, delta: i64) -> Self {
        self.actions.push(UpdateAction::Add(attr.to_string(), delta));
        self
    }

    pub fn push(&mut self, action: UpdateAction) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    /// Applies every action in order.
    pub fn apply(&self, item: &mut Item) {
        for action in &self.actions {
            match action {
                UpdateAction::Set(attr, value) => {
                    item.insert(attr.clone(), value.clone());
                }
                UpdateAction::Add(attr, delta) => {
                    let current = item.get(attr).and_then(Value::as_i64).unwrap_or(0);
                    let next = current.saturating_add(*delta);
                    item.insert(attr.clone(), Value::Number(Number::from(next)));
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_absent_item() {
        assert!(Condition::Missing.evaluate(None));
        assert!(!Condition::Exists.evaluate(None));
        assert!(!Condition::eq("id", "x").evaluate(None));
        assert!(!Condition::Ge("stock".into(), 0.0).evaluate(None));
    }

    #[test]
    fn test_comparisons() {
        let product = item(json!({
            "id": "p-1", "stock": 3, "min_stock": 5, "rating": 4.5, "is_active": true
        }));

        assert!(Condition::eq("is_active", true).evaluate(Some(&product)));
        assert!(Condition::Ge("rating".into(), 4.5).evaluate(Some(&product)));
        assert!(!Condition::Gt("rating".into(), 4.5).evaluate(Some(&product)));
        assert!(Condition::Le("stock".into(), 3.0).evaluate(Some(&product)));
        assert!(Condition::AttrLe("stock".into(), "min_stock".into()).evaluate(Some(&product)));
        assert!(!Condition::Ge("missing".into(), 0.0).evaluate(Some(&product)));
    }

    #[test]
    fn test_sum_guard() {
        let product = item(json!({"stock": 10}));
        let guard = |delta| Condition::SumGe {
            attr: "stock".into(),
            delta,
            min: 0,
        };

        assert!(guard(-10).evaluate(Some(&product)));
        assert!(!guard(-11).evaluate(Some(&product)));
        assert!(guard(5).evaluate(Some(&product)));
    }

    #[test]
    fn test_and_or() {
        let product = item(json!({"sku": "A", "slug": "a"}));

        let either = Condition::Or(vec![Condition::eq("sku", "B"), Condition::eq("slug", "a")]);
        assert!(either.evaluate(Some(&product)));

        let both = Condition::And(vec![Condition::eq("sku", "B"), Condition::eq("slug", "a")]);
        assert!(!both.evaluate(Some(&product)));

        assert_eq!(Condition::all(Vec::new()), None);
        assert_eq!(
            Condition::all(vec![Condition::Exists]),
            Some(Condition::Exists)
        );
    }

    #[test]
    fn test_update_apply() {
        let mut product = item(json!({"stock": 10, "name": "Milk"}));

        UpdateExpr::new()
            .add("stock", -4)
            .add("reviews", 1)
            .set("name", "Whole Milk")
            .apply(&mut product);

        assert_eq!(product["stock"], json!(6));
        assert_eq!(product["reviews"], json!(1));
        assert_eq!(product["name"], json!("Whole Milk"));
    }
}
