//! # DynamoDB Tables
//!
//! [`KvTable`] over Amazon DynamoDB (or any endpoint speaking its API,
//! such as DynamoDB Local). Each catalog table is a DynamoDB table with a
//! string partition key `id`.
//!
//! ## Expression Translation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Condition                       DynamoDB expression                    │
//! │  ──────────────────────────      ────────────────────────────────────   │
//! │  Exists / Missing                attribute_exists(#id) / _not_exists    │
//! │  Eq(a, v)                        #a = :v                                │
//! │  Ge / Le / Gt (a, n)             #a >= :n, #a <= :n, #a > :n            │
//! │  AttrLe(a, b)                    #a <= #b                               │
//! │  SumGe { a, delta, min }         (#a >= :min-delta AND #a <= :MAX-delta)│
//! │  And([..]) / Or([..])            ( .. AND .. ) / ( .. OR .. )           │
//! │                                                                         │
//! │  UpdateAction                                                           │
//! │  Set(a, v)                       SET #a = :v                            │
//! │  Add(a, n)                       ADD #a :n                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `SumGe` bounds are computed in 128-bit arithmetic, so the guard also
//! rejects a delta that would push the attribute past `i64::MAX`.
//!
//! Conditions go out as `ConditionExpression` on writes and as
//! `FilterExpression` on scans. A failed guard comes back as
//! `ConditionalCheckFailedException` and becomes
//! [`DbError::ConditionFailed`], the same error [`MemoryTable`](super::MemoryTable)
//! returns.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use serde_json::{Number, Value};
use tracing::{debug, info, trace};

use super::expr::{Condition, UpdateAction, UpdateExpr};
use super::table::{item_key, KvTable};
use super::{Item, KvConfig, KEY_ATTR};
use crate::error::{DbError, DbResult};

/// Attribute map as the SDK sends and receives it.
type Attributes = HashMap<String, AttributeValue>;

/// Builds a DynamoDB client from the default AWS provider chain, with the
/// region and endpoint from `config` taking precedence.
pub async fn connect(config: &KvConfig) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint.clone());
    }

    let sdk_config = loader.load().await;
    info!(
        region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
        endpoint = ?config.endpoint,
        "DynamoDB client configured"
    );
    Client::new(&sdk_config)
}

// =============================================================================
// Attribute Conversion
// =============================================================================

fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_attributes(map)),
    }
}

fn to_attributes(item: &Item) -> Attributes {
    item.iter()
        .map(|(attr, value)| (attr.clone(), to_attribute(value)))
        .collect()
}

/// Integers stay integers; anything else must fit an `f64`.
fn parse_number(text: &str) -> DbResult<Value> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| DbError::Serialization(format!("invalid number attribute '{text}'")))
}

fn from_attribute(value: AttributeValue) -> DbResult<Value> {
    let value = match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::N(n) => parse_number(&n)?,
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute)
                .collect::<DbResult<_>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attributes(map)?),
        AttributeValue::Ss(values) => Value::Array(values.into_iter().map(Value::String).collect()),
        other => {
            return Err(DbError::Serialization(format!(
                "unsupported attribute type: {other:?}"
            )))
        }
    };
    Ok(value)
}

fn from_attributes(attributes: Attributes) -> DbResult<Item> {
    attributes
        .into_iter()
        .map(|(attr, value)| Ok((attr, from_attribute(value)?)))
        .collect()
}

fn key_attributes(key: &str) -> Attributes {
    HashMap::from([(KEY_ATTR.to_string(), AttributeValue::S(key.to_string()))])
}

// =============================================================================
// Expression Rendering
// =============================================================================

/// Placeholders collected while rendering one request's expressions.
#[derive(Debug, Default)]
struct Expressions {
    names: HashMap<String, String>,
    values: Attributes,
}

impl Expressions {
    /// `#nN` placeholder for an attribute name, reused per attribute.
    fn name(&mut self, attr: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, name)| name.as_str() == attr) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attr.to_string());
        placeholder
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn number(&mut self, n: impl ToString) -> String {
        self.value(AttributeValue::N(n.to_string()))
    }

    fn compare(&mut self, attr: &str, op: &str, n: f64) -> String {
        format!("{} {op} {}", self.name(attr), self.number(n))
    }

    fn join(&mut self, conditions: &[Condition], op: &str) -> String {
        if conditions.is_empty() {
            // And([]) is true, Or([]) is false
            let id = self.name(KEY_ATTR);
            let inverse = if op == "AND" { "OR" } else { "AND" };
            return format!("(attribute_exists({id}) {inverse} attribute_not_exists({id}))");
        }
        let parts: Vec<String> = conditions.iter().map(|c| self.condition(c)).collect();
        format!("({})", parts.join(&format!(" {op} ")))
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Exists => format!("attribute_exists({})", self.name(KEY_ATTR)),
            Condition::Missing => format!("attribute_not_exists({})", self.name(KEY_ATTR)),
            Condition::Eq(attr, value) => {
                format!("{} = {}", self.name(attr), self.value(to_attribute(value)))
            }
            Condition::Ge(attr, n) => self.compare(attr, ">=", *n),
            Condition::Le(attr, n) => self.compare(attr, "<=", *n),
            Condition::Gt(attr, n) => self.compare(attr, ">", *n),
            Condition::AttrLe(a, b) => format!("{} <= {}", self.name(a), self.name(b)),
            Condition::SumGe { attr, delta, min } => {
                let attr = self.name(attr);
                let low = self.number(i128::from(*min) - i128::from(*delta));
                let high = self.number(i128::from(i64::MAX) - i128::from(*delta));
                format!("({attr} >= {low} AND {attr} <= {high})")
            }
            Condition::And(all) => self.join(all, "AND"),
            Condition::Or(any) => self.join(any, "OR"),
        }
    }

    /// `SET ... ADD ...`, or `None` for an empty update.
    fn update(&mut self, update: &UpdateExpr) -> Option<String> {
        let mut set = Vec::new();
        let mut add = Vec::new();
        for action in update.actions() {
            match action {
                UpdateAction::Set(attr, value) => {
                    let name = self.name(attr);
                    let value = self.value(to_attribute(value));
                    set.push(format!("{name} = {value}"));
                }
                UpdateAction::Add(attr, delta) => {
                    let name = self.name(attr);
                    let delta = self.number(delta);
                    add.push(format!("{name} {delta}"));
                }
            }
        }

        let mut clauses = Vec::new();
        if !set.is_empty() {
            clauses.push(format!("SET {}", set.join(", ")));
        }
        if !add.is_empty() {
            clauses.push(format!("ADD {}", add.join(", ")));
        }
        (!clauses.is_empty()).then(|| clauses.join(" "))
    }

    /// Name and value maps, `None` when empty (the API rejects empty maps).
    fn into_parts(self) -> (Option<HashMap<String, String>>, Option<Attributes>) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}

// =============================================================================
// DynamoTable
// =============================================================================

/// One DynamoDB table holding catalog items.
#[derive(Debug, Clone)]
pub struct DynamoTable {
    client: Client,
    name: String,
}

impl DynamoTable {
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        DynamoTable {
            client,
            name: name.into(),
        }
    }

    fn condition_failed(&self, key: &str) -> DbError {
        DbError::ConditionFailed {
            table: self.name.clone(),
            key: key.to_string(),
        }
    }

    fn failure<E, R>(&self, operation: &str, err: SdkError<E, R>) -> DbError
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        let message = format!("{operation} on {}: {}", self.name, DisplayErrorContext(&err));
        match err {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                DbError::ConnectionFailed(message)
            }
            _ => DbError::QueryFailed(message),
        }
    }

    /// Maps a failed conditional write to [`DbError::ConditionFailed`].
    fn write_failure<E, R>(&self, operation: &str, key: &str, err: SdkError<E, R>) -> DbError
    where
        E: std::error::Error + ProvideErrorMetadata + 'static,
        R: std::fmt::Debug,
    {
        let guard_failed = err
            .as_service_error()
            .and_then(ProvideErrorMetadata::code)
            .is_some_and(|code| code == "ConditionalCheckFailedException");
        if guard_failed {
            debug!(table = %self.name, key, operation, "Condition failed");
            return self.condition_failed(key);
        }
        self.failure(operation, err)
    }
}

#[async_trait]
impl KvTable for DynamoTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> DbResult<()> {
        self.client
            .describe_table()
            .table_name(&self.name)
            .send()
            .await
            .map_err(|err| self.failure("DescribeTable", err))?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> DbResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.name)
            .set_key(Some(key_attributes(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| self.failure("GetItem", err))?;

        output.item.map(from_attributes).transpose()
    }

    async fn scan(&self, filter: Option<&Condition>) -> DbResult<Vec<Item>> {
        let mut expressions = Expressions::default();
        let filter_expression = filter.map(|c| expressions.condition(c));
        let (names, values) = expressions.into_parts();

        let mut items = Vec::new();
        let mut start_key: Option<Attributes> = None;
        let mut pages = 0usize;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.name)
                .set_filter_expression(filter_expression.clone())
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(values.clone())
                .set_exclusive_start_key(start_key.take())
                .consistent_read(true)
                .send()
                .await
                .map_err(|err| self.failure("Scan", err))?;
            pages += 1;

            for raw in output.items.unwrap_or_default() {
                items.push(from_attributes(raw)?);
            }
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        items.sort_by(|a, b| {
            let key = |item: &Item| item.get(KEY_ATTR).and_then(Value::as_str).map(str::to_owned);
            key(a).cmp(&key(b))
        });
        trace!(table = %self.name, pages, matched = items.len(), "Scan");
        Ok(items)
    }

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> DbResult<()> {
        let key = item_key(&item)?;
        let mut expressions = Expressions::default();
        let condition_expression = condition.map(|c| expressions.condition(c));
        let (names, values) = expressions.into_parts();

        self.client
            .put_item()
            .table_name(&self.name)
            .set_item(Some(to_attributes(&item)))
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(|err| self.write_failure("PutItem", &key, err))?;
        Ok(())
    }

    async fn update_item(
        &self,
        key: &str,
        update: &UpdateExpr,
        condition: Option<&Condition>,
    ) -> DbResult<Item> {
        let mut expressions = Expressions::default();
        let update_expression = expressions.update(update);
        let condition_expression = condition.map(|c| expressions.condition(c));
        let (names, values) = expressions.into_parts();

        let output = self
            .client
            .update_item()
            .table_name(&self.name)
            .set_key(Some(key_attributes(key)))
            .set_update_expression(update_expression)
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|err| self.write_failure("UpdateItem", key, err))?;

        match output.attributes {
            Some(attributes) => from_attributes(attributes),
            None => from_attributes(key_attributes(key)),
        }
    }

    async fn delete_item(&self, key: &str) -> DbResult<()> {
        self.client
            .delete_item()
            .table_name(&self.name)
            .set_key(Some(key_attributes(key)))
            .send()
            .await
            .map_err(|err| self.failure("DeleteItem", err))?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(condition: &Condition) -> (String, Expressions) {
        let mut expressions = Expressions::default();
        let text = expressions.condition(condition);
        (text, expressions)
    }

    fn n(expressions: &Expressions, placeholder: &str) -> String {
        match &expressions.values[placeholder] {
            AttributeValue::N(n) => n.clone(),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_listing_filter_expression() {
        let filter = Condition::And(vec![
            Condition::eq("is_active", true),
            Condition::eq("department_id", "d-1"),
            Condition::Le("price".into(), 250.0),
            Condition::Gt("stock".into(), 0.0),
        ]);
        let (text, expressions) = render(&filter);

        assert_eq!(
            text,
            "(#n0 = :v0 AND #n1 = :v1 AND #n2 <= :v2 AND #n3 > :v3)"
        );
        assert_eq!(expressions.names["#n1"], "department_id");
        assert_eq!(expressions.values[":v0"], AttributeValue::Bool(true));
        assert_eq!(expressions.values[":v1"], AttributeValue::S("d-1".into()));
        assert_eq!(n(&expressions, ":v2"), "250");
        assert_eq!(n(&expressions, ":v3"), "0");
    }

    #[test]
    fn test_attribute_names_are_reused() {
        let (text, expressions) = render(&Condition::And(vec![
            Condition::Exists,
            Condition::eq("is_active", true),
            Condition::AttrLe("stock".into(), "min_stock".into()),
            Condition::Ge("stock".into(), 1.0),
        ]));

        assert_eq!(
            text,
            "(attribute_exists(#n0) AND #n1 = :v0 AND #n2 <= #n3 AND #n2 >= :v1)"
        );
        assert_eq!(expressions.names.len(), 4);
        assert_eq!(expressions.names["#n0"], KEY_ATTR);
    }

    #[test]
    fn test_stock_guard_bounds() {
        let (text, expressions) = render(&Condition::SumGe {
            attr: "stock".into(),
            delta: -3,
            min: 0,
        });
        assert_eq!(text, "(#n0 >= :v0 AND #n0 <= :v1)");
        assert_eq!(n(&expressions, ":v0"), "3");
        assert_eq!(n(&expressions, ":v1"), "9223372036854775810");

        // the upper bound is what refuses an overflowing increment
        let (_, expressions) = render(&Condition::SumGe {
            attr: "stock".into(),
            delta: i64::MAX,
            min: 0,
        });
        assert_eq!(n(&expressions, ":v0"), (-i128::from(i64::MAX)).to_string());
        assert_eq!(n(&expressions, ":v1"), "0");

        let (_, expressions) = render(&Condition::SumGe {
            attr: "stock".into(),
            delta: i64::MIN,
            min: 0,
        });
        assert_eq!(n(&expressions, ":v0"), "9223372036854775808");
    }

    #[test]
    fn test_empty_groups() {
        let (text, _) = render(&Condition::And(vec![]));
        assert_eq!(text, "(attribute_exists(#n0) OR attribute_not_exists(#n0))");
        let (text, _) = render(&Condition::Or(vec![]));
        assert_eq!(text, "(attribute_exists(#n0) AND attribute_not_exists(#n0))");
    }

    #[test]
    fn test_update_expression() {
        let mut expressions = Expressions::default();
        let update = UpdateExpr::new()
            .add("stock", -2)
            .set("updated_at", "2024-01-01T00:00:00Z")
            .set("name", "Milk");
        let text = expressions.update(&update).unwrap();
        let condition = expressions.condition(&Condition::Missing);

        assert_eq!(text, "SET #n1 = :v1, #n2 = :v2 ADD #n0 :v0");
        assert_eq!(condition, "attribute_not_exists(#n3)");
        assert_eq!(n(&expressions, ":v0"), "-2");
        assert!(Expressions::default().update(&UpdateExpr::new()).is_none());
    }

    #[test]
    fn test_item_conversion_keeps_shape() {
        let Value::Object(item) = json!({
            "id": "p-1",
            "price": 199,
            "weight": 1.5,
            "discount": null,
            "is_active": true,
            "tags": ["organic"],
            "dimensions": { "length": 2.0, "width": 0.5 }
        }) else {
            unreachable!()
        };

        let attributes = to_attributes(&item);
        assert_eq!(attributes["price"], AttributeValue::N("199".into()));
        assert_eq!(attributes["discount"], AttributeValue::Null(true));

        let back = from_attributes(attributes).unwrap();
        assert_eq!(back["id"], json!("p-1"));
        assert_eq!(back["price"].as_i64(), Some(199));
        assert_eq!(back["weight"].as_f64(), Some(1.5));
        assert_eq!(back["tags"], json!(["organic"]));
        assert_eq!(back["dimensions"]["width"].as_f64(), Some(0.5));
        assert!(back["discount"].is_null());
    }

    #[test]
    fn test_rejects_unsupported_numbers() {
        assert!(parse_number("1e400").is_err());
        assert_eq!(parse_number("-7").unwrap(), json!(-7));
    }
}
