//! Structured query parameters (`$top`, `$skip`, `$select`, `$orderby`, `$filter`).

use crate::errors::ODataError;
use crate::filter::{FilterNode, FilterNodeSerde};
use serde::{Deserialize, Serialize};

/// Marker meaning "every field" in `$select`.
pub const SELECT_ALL: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub field: String,
    #[serde(default)]
    pub direction: Option<Direction>,
}

impl OrderItem {
    /// Builds an item from the raw direction word; only `desc` sorts descending.
    #[must_use]
    pub fn new(field: &str, direction: Option<&str>) -> Self {
        let direction = direction.map(|d| {
            if d.eq_ignore_ascii_case("desc") { Direction::Desc } else { Direction::Asc }
        });
        Self { field: field.to_string(), direction }
    }

    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.direction == Some(Direction::Desc)
    }
}

/// Output of the query-string parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub select: Option<Vec<String>>,
    pub order_by: Option<Vec<OrderItem>>,
    pub filter: Option<FilterNode>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_top(mut self, top: i64) -> Self {
        self.top = Some(top);
        self
    }

    #[must_use]
    pub const fn with_skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn with_select<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.select = Some(fields.iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, items: Vec<OrderItem>) -> Self {
        self.order_by = Some(items);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Fields to project, or `None` when the result is unrestricted.
    ///
    /// A restriction applies only when at least two fields are listed and the
    /// first one is not `*`.
    #[must_use]
    pub fn projection_fields(&self) -> Option<&[String]> {
        match self.select.as_deref() {
            Some(fields) if fields.len() > 1 && fields[0] != SELECT_ALL => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn order_items(&self) -> &[OrderItem] {
        self.order_by.as_deref().unwrap_or(&[])
    }
}

// Serde-facing order item; the direction word stays raw until `OrderItem::new`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItemSerde {
    pub field: String,
    #[serde(default)]
    pub direction: Option<String>,
}

impl From<OrderItemSerde> for OrderItem {
    fn from(o: OrderItemSerde) -> Self {
        Self::new(&o.field, o.direction.as_deref())
    }
}

// Serde-facing parameter map, keyed like the query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSetSerde {
    #[serde(default, alias = "$top")]
    pub top: Option<i64>,
    #[serde(default, alias = "$skip")]
    pub skip: Option<i64>,
    #[serde(default, alias = "$select")]
    pub select: Option<Vec<String>>,
    #[serde(default, alias = "$orderby", alias = "orderby")]
    pub order_by: Option<Vec<OrderItemSerde>>,
    #[serde(default, alias = "$filter")]
    pub filter: Option<FilterNodeSerde>,
}

impl TryFrom<ParameterSetSerde> for ParameterSet {
    type Error = ODataError;
    fn try_from(ps: ParameterSetSerde) -> Result<Self, Self::Error> {
        Ok(Self {
            top: ps.top,
            skip: ps.skip,
            select: ps.select,
            order_by: ps.order_by.map(|items| items.into_iter().map(OrderItem::from).collect()),
            filter: ps.filter.map(FilterNode::try_from).transpose()?,
        })
    }
}

/// # Errors
/// Returns `InvalidFilterSyntax` if the JSON cannot be decoded into a parameter set.
pub fn parse_params_json(json: &str) -> Result<ParameterSet, ODataError> {
    let ps: ParameterSetSerde =
        serde_json::from_str(json).map_err(|e| ODataError::syntax(e.to_string()))?;
    ParameterSet::try_from(ps)
}
