//! Filter/order/limit queries over JSON documents

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gte,
    Lte,
}

/// Field predicate; `field` may be a dotted path such as `attributes.strength`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        let Some(actual) = field(document, &self.field) else {
            return false;
        };
        let ordering = compare(actual, &self.value);
        match self.op {
            FilterOp::Eq => ordering == Some(Ordering::Equal),
            FilterOp::Ne => ordering != Some(Ordering::Equal),
            FilterOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(document))
    }

    /// Filter, sort, then page a set of documents
    pub fn apply<'a>(&self, documents: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut matched: Vec<&Value> = documents.into_iter().filter(|d| self.matches(d)).collect();

        if !self.order_by.is_empty() {
            matched.sort_by(|a, b| {
                for order in &self.order_by {
                    let ordering = match (field(a, &order.field), field(b, &order.field)) {
                        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    };
                    let ordering = if order.descending { ordering.reverse() } else { ordering };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |value, key| value.get(key))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs() -> Vec<Value> {
        vec![
            json!({"id": "a", "level": 10, "stats": {"str": 5}}),
            json!({"id": "b", "level": 14, "stats": {"str": 1}}),
            json!({"id": "c", "level": 12, "stats": {"str": 9}}),
            json!({"id": "d", "level": 30, "stats": {"str": 9}}),
        ]
    }

    #[test]
    fn test_range_filter_and_descending_order() {
        let query = Query::new()
            .filter("level", FilterOp::Gte, 10)
            .filter("level", FilterOp::Lte, 15)
            .filter("id", FilterOp::Ne, "c")
            .order_by("level", true);

        let ids: Vec<String> = query
            .apply(&docs())
            .iter()
            .map(|d| d["id"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_nested_field_and_paging() {
        let query = Query::new()
            .filter("stats.str", FilterOp::Gte, 5)
            .order_by("level", false)
            .offset(1)
            .limit(1);

        let page = query.apply(&docs());
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["id"], "c");
    }

    #[test]
    fn test_missing_field_never_matches() {
        let filter = Filter::new("missing", FilterOp::Ne, 1);
        assert!(!filter.matches(&json!({"level": 1})));
    }
}
