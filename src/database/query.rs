use serde_json::{Map, Number, Value};

use crate::database::error::{invalid_argument, DatabaseResult};
use crate::database::snapshot::{Index, Path};
use crate::database::view::filter::NodeFilter;

/// One end of a query range.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryBound {
    pub value: Value,
    pub name: Option<String>,
    pub inclusive: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryLimit {
    First(u32),
    Last(u32),
}

impl QueryLimit {
    pub fn count(&self) -> u32 {
        match self {
            QueryLimit::First(count) | QueryLimit::Last(count) => *count,
        }
    }
}

/// Ordering, range and limit constraints of a query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryParams {
    index: Index,
    start: Option<QueryBound>,
    end: Option<QueryBound>,
    limit: Option<QueryLimit>,
    order_by_called: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            index: Index::Priority,
            start: None,
            end: None,
            limit: None,
            order_by_called: false,
        }
    }
}

impl QueryParams {
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn start(&self) -> Option<&QueryBound> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&QueryBound> {
        self.end.as_ref()
    }

    pub fn limit(&self) -> Option<QueryLimit> {
        self.limit
    }

    pub fn set_index(&mut self, index: Index) -> DatabaseResult<()> {
        if self.order_by_called {
            return Err(invalid_argument("orderBy has already been specified"));
        }
        self.index = index;
        self.order_by_called = true;
        Ok(())
    }

    pub fn set_start(&mut self, bound: QueryBound) -> DatabaseResult<()> {
        if self.start.is_some() {
            return Err(invalid_argument(
                "startAt/startAfter has already been specified",
            ));
        }
        self.start = Some(bound);
        Ok(())
    }

    pub fn set_end(&mut self, bound: QueryBound) -> DatabaseResult<()> {
        if self.end.is_some() {
            return Err(invalid_argument(
                "endAt/endBefore has already been specified",
            ));
        }
        self.end = Some(bound);
        Ok(())
    }

    pub fn set_limit(&mut self, limit: QueryLimit) -> DatabaseResult<()> {
        if self.limit.is_some() {
            return Err(invalid_argument("limit has already been specified"));
        }
        if limit.count() == 0 {
            return Err(invalid_argument("limit must be greater than zero"));
        }
        self.limit = Some(limit);
        Ok(())
    }

    /// Orders children by the given path, mirroring `orderByChild()`.
    pub fn order_by_child(mut self, path: &str) -> DatabaseResult<Self> {
        validate_order_by_child_target(path)?;
        let path = Path::parse(path)?;
        if path.is_empty() {
            return Err(invalid_argument("orderByChild path cannot be empty"));
        }
        self.set_index(Index::Path(path))?;
        self.validated()
    }

    pub fn order_by_key(mut self) -> DatabaseResult<Self> {
        self.set_index(Index::Key)?;
        self.validated()
    }

    pub fn order_by_value(mut self) -> DatabaseResult<Self> {
        self.set_index(Index::Value)?;
        self.validated()
    }

    pub fn order_by_priority(mut self) -> DatabaseResult<Self> {
        self.set_index(Index::Priority)?;
        self.validated()
    }

    pub fn start_at(self, value: Value) -> DatabaseResult<Self> {
        self.start_at_with_key(value, None)
    }

    pub fn start_at_with_key(mut self, value: Value, name: Option<String>) -> DatabaseResult<Self> {
        self.set_start(QueryBound {
            value,
            name,
            inclusive: true,
        })?;
        self.validated()
    }

    pub fn start_after(self, value: Value) -> DatabaseResult<Self> {
        self.start_after_with_key(value, None)
    }

    pub fn start_after_with_key(
        mut self,
        value: Value,
        name: Option<String>,
    ) -> DatabaseResult<Self> {
        self.set_start(QueryBound {
            value,
            name,
            inclusive: false,
        })?;
        self.validated()
    }

    pub fn end_at(self, value: Value) -> DatabaseResult<Self> {
        self.end_at_with_key(value, None)
    }

    pub fn end_at_with_key(mut self, value: Value, name: Option<String>) -> DatabaseResult<Self> {
        self.set_end(QueryBound {
            value,
            name,
            inclusive: true,
        })?;
        self.validated()
    }

    pub fn end_before(self, value: Value) -> DatabaseResult<Self> {
        self.end_before_with_key(value, None)
    }

    pub fn end_before_with_key(
        mut self,
        value: Value,
        name: Option<String>,
    ) -> DatabaseResult<Self> {
        self.set_end(QueryBound {
            value,
            name,
            inclusive: false,
        })?;
        self.validated()
    }

    pub fn equal_to(self, value: Value) -> DatabaseResult<Self> {
        self.equal_to_with_key(value, None)
    }

    pub fn equal_to_with_key(mut self, value: Value, name: Option<String>) -> DatabaseResult<Self> {
        let start_bound = QueryBound {
            value: value.clone(),
            name: name.clone(),
            inclusive: true,
        };
        let end_bound = QueryBound {
            value,
            name,
            inclusive: true,
        };
        self.set_start(start_bound)?;
        self.set_end(end_bound)?;
        self.validated()
    }

    pub fn limit_to_first(mut self, limit: u32) -> DatabaseResult<Self> {
        if limit == 0 {
            return Err(invalid_argument("limitToFirst must be greater than zero"));
        }
        self.set_limit(QueryLimit::First(limit))?;
        Ok(self)
    }

    pub fn limit_to_last(mut self, limit: u32) -> DatabaseResult<Self> {
        if limit == 0 {
            return Err(invalid_argument("limitToLast must be greater than zero"));
        }
        self.set_limit(QueryLimit::Last(limit))?;
        Ok(self)
    }

    fn validated(self) -> DatabaseResult<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Checks that the bounds make sense for the chosen index.
    pub fn validate(&self) -> DatabaseResult<()> {
        let bounds = self.start.iter().chain(self.end.iter());
        for bound in bounds {
            match &self.index {
                Index::Key => {
                    if bound.name.is_some() {
                        return Err(invalid_argument(
                            "When ordering by key, you may only pass one argument to startAt(), endAt(), or equalTo()",
                        ));
                    }
                    if !bound.value.is_string() {
                        return Err(invalid_argument(
                            "When ordering by key, the argument passed to startAt(), startAfter(), endAt(), endBefore(), or equalTo() must be a string",
                        ));
                    }
                }
                Index::Priority => {
                    if !matches!(bound.value, Value::Null | Value::Number(_) | Value::String(_)) {
                        return Err(invalid_argument(
                            "When ordering by priority, the first argument passed to startAt(), startAfter(), endAt(), endBefore(), or equalTo() must be a valid priority value (null, a number, or a string)",
                        ));
                    }
                }
                Index::Value | Index::Path(_) => {
                    if bound.value.is_object() || bound.value.is_array() {
                        return Err(invalid_argument(
                            "Query range bounds must be null, a boolean, a number, or a string",
                        ));
                    }
                }
            }
        }
        if let Some(limit) = self.limit {
            if limit.count() == 0 {
                return Err(invalid_argument("limit must be greater than zero"));
            }
        }
        Ok(())
    }

    /// Whether the query reads every child of its location.
    pub fn loads_all_data(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.limit.is_none()
    }

    pub fn is_default(&self) -> bool {
        self.loads_all_data() && self.index == Index::Priority
    }

    /// Whether a limited window is anchored on the first children.
    pub fn is_view_from_left(&self) -> bool {
        match self.limit {
            Some(QueryLimit::First(_)) => true,
            Some(QueryLimit::Last(_)) => false,
            None => self.start.is_some(),
        }
    }

    /// Filter that maintains a cache matching these parameters.
    pub fn node_filter(&self) -> NodeFilter {
        NodeFilter::for_query(self)
    }

    /// Canonical JSON form of the parameters, used for logging and identity.
    pub fn query_object(&self) -> Value {
        let mut object = Map::new();
        if let Some(start) = &self.start {
            object.insert("sp".to_string(), start.value.clone());
            if let Some(name) = &start.name {
                object.insert("sn".to_string(), Value::String(name.clone()));
            }
            object.insert("sin".to_string(), Value::Bool(start.inclusive));
        }
        if let Some(end) = &self.end {
            object.insert("ep".to_string(), end.value.clone());
            if let Some(name) = &end.name {
                object.insert("en".to_string(), Value::String(name.clone()));
            }
            object.insert("ein".to_string(), Value::Bool(end.inclusive));
        }
        if let Some(limit) = self.limit {
            object.insert("l".to_string(), Value::Number(Number::from(limit.count())));
            let view_from = if self.is_view_from_left() { "l" } else { "r" };
            object.insert("vf".to_string(), Value::String(view_from.to_string()));
        }
        if self.index != Index::Priority {
            object.insert("i".to_string(), Value::String(self.index.query_definition()));
        }
        Value::Object(object)
    }
}

fn validate_order_by_child_target(path: &str) -> DatabaseResult<()> {
    match path {
        "$key" => Err(invalid_argument(
            "order_by_child(\"$key\") is invalid; call order_by_key() instead",
        )),
        "$priority" => Err(invalid_argument(
            "order_by_child(\"$priority\") is invalid; call order_by_priority() instead",
        )),
        "$value" => Err(invalid_argument(
            "order_by_child(\"$value\") is invalid; call order_by_value() instead",
        )),
        _ => Ok(()),
    }
}

/// A location plus the parameters of the query listening there.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    pub path: Path,
    pub params: QueryParams,
}

impl QuerySpec {
    pub fn new(path: Path, params: QueryParams) -> DatabaseResult<Self> {
        params.validate()?;
        Ok(Self { path, params })
    }

    /// The unfiltered query at `path`.
    pub fn default_at(path: Path) -> Self {
        Self {
            path,
            params: QueryParams::default(),
        }
    }

    pub fn index(&self) -> &Index {
        self.params.index()
    }

    pub fn loads_all_data(&self) -> bool {
        self.params.loads_all_data()
    }

    pub fn is_default(&self) -> bool {
        self.params.is_default()
    }
}
