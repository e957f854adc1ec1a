//! Search criteria, the compiler that turns them into parameterized SQL plans,
//! and the page envelope returned to callers.
//!
//! Column identifiers in a compiled plan always come from the compiler's
//! static whitelists. Values supplied by the caller only ever travel as bound
//! parameters.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::error::ApplicationError;

/// Sort direction, ascending unless the caller says otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Missing or unrecognised input falls back to ascending
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()) {
            Some(s) if s == "DESC" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Generic filter/sort/page request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchCriteria {
    /// Column name to raw value. Ordered so parameter numbering is stable.
    pub filters: BTreeMap<String, String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    /// Zero-based
    pub page: u32,
    pub size: u32,
}

/// Physical type of a filterable column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// Parameter value in binding order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundParam {
    Text(String),
    Integer(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortClause {
    pub column: &'static str,
    pub direction: SortDirection,
}

/// Compiled data query: filters, optional ordering and a page window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    table: &'static str,
    columns: &'static [&'static str],
    filter_clauses: Vec<String>,
    sort: Option<SortClause>,
    limit: i64,
    offset: i64,
    params: Vec<BoundParam>,
    page: u32,
    size: u32,
}

/// Count query sharing the data plan's filters and parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountPlan {
    table: &'static str,
    filter_clauses: Vec<String>,
    params: Vec<BoundParam>,
}

fn where_sql(filter_clauses: &[String]) -> String {
    if filter_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", filter_clauses.join(" AND "))
    }
}

impl QueryPlan {
    pub fn filter_clauses(&self) -> &[String] {
        &self.filter_clauses
    }

    pub fn sort(&self) -> Option<SortClause> {
        self.sort
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Filter parameters in binding order. `LIMIT` and `OFFSET` are bound
    /// after these, in that order.
    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data_sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            self.columns.join(", "),
            self.table,
            where_sql(&self.filter_clauses)
        );
        if let Some(sort) = self.sort {
            sql.push_str(&format!(" ORDER BY {} {}", sort.column, sort.direction.as_sql()));
        }
        let next = self.params.len() + 1;
        sql.push_str(&format!(" LIMIT ${} OFFSET ${}", next, next + 1));
        sql
    }

    pub fn count_plan(&self) -> CountPlan {
        CountPlan {
            table: self.table,
            filter_clauses: self.filter_clauses.clone(),
            params: self.params.clone(),
        }
    }
}

impl CountPlan {
    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    pub fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {}{}",
            self.table,
            where_sql(&self.filter_clauses)
        )
    }
}

const APPLICATION_COLUMNS: &[&str] = &[
    "application_id",
    "owner_ref",
    "loan_amount",
    "loan_term",
    "loan_type_id",
    "loan_status_id",
];

const APPLICATION_FILTERS: &[FilterColumn] = &[
    FilterColumn {
        name: "owner_ref",
        kind: ColumnKind::Text,
    },
    FilterColumn {
        name: "loan_type_id",
        kind: ColumnKind::Integer,
    },
    FilterColumn {
        name: "loan_status_id",
        kind: ColumnKind::Integer,
    },
];

const APPLICATION_SORTS: &[&str] = &["application_id", "owner_ref", "loan_amount", "loan_term"];

/// Whitelist-driven compiler for one table
#[derive(Debug, Clone)]
pub struct CriteriaCompiler {
    table: &'static str,
    columns: &'static [&'static str],
    filter_columns: &'static [FilterColumn],
    sort_columns: &'static [&'static str],
    max_page_size: u32,
}

impl CriteriaCompiler {
    /// Compiler over the `applications` table
    pub fn for_applications(max_page_size: u32) -> Self {
        Self {
            table: "applications",
            columns: APPLICATION_COLUMNS,
            filter_columns: APPLICATION_FILTERS,
            sort_columns: APPLICATION_SORTS,
            max_page_size,
        }
    }

    /// Validate the whole request and build the plan. Nothing is executed
    /// here, so a rejected request has no side effects.
    pub fn compile(&self, criteria: &SearchCriteria) -> Result<QueryPlan, ApplicationError> {
        if criteria.size == 0 {
            return Err(ApplicationError::InvalidData(
                "page size must be greater than 0".to_string(),
            ));
        }
        if criteria.size > self.max_page_size {
            return Err(ApplicationError::InvalidData(format!(
                "page size must not exceed {}",
                self.max_page_size
            )));
        }

        let mut filter_clauses = Vec::with_capacity(criteria.filters.len());
        let mut params = Vec::with_capacity(criteria.filters.len());

        for (key, raw) in &criteria.filters {
            let column = self
                .filter_columns
                .iter()
                .find(|c| c.name == key.as_str())
                .ok_or_else(|| ApplicationError::InvalidFilterColumn(key.clone()))?;

            params.push(bind_value(column, raw)?);
            filter_clauses.push(format!("{} = ${}", column.name, params.len()));
        }

        let sort = match criteria.sort_by.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(requested) => {
                let column = self
                    .sort_columns
                    .iter()
                    .copied()
                    .find(|c| *c == requested)
                    .ok_or_else(|| ApplicationError::InvalidSortColumn(requested.to_string()))?;
                Some(SortClause {
                    column,
                    direction: SortDirection::parse_lenient(criteria.sort_direction.as_deref()),
                })
            }
        };

        let limit = i64::from(criteria.size);
        let offset = i64::from(criteria.page) * limit;

        Ok(QueryPlan {
            table: self.table,
            columns: self.columns,
            filter_clauses,
            sort,
            limit,
            offset,
            params,
            page: criteria.page,
            size: criteria.size,
        })
    }
}

fn bind_value(column: &FilterColumn, raw: &str) -> Result<BoundParam, ApplicationError> {
    let raw = raw.trim();
    let invalid = || {
        ApplicationError::InvalidData(format!(
            "invalid value '{}' for filter {}",
            raw, column.name
        ))
    };
    match column.kind {
        ColumnKind::Text => Ok(BoundParam::Text(raw.to_string())),
        ColumnKind::Integer => raw.parse().map(BoundParam::Integer).map_err(|_| invalid()),
    }
}

/// One page of results. The derived fields (`total_pages`, `has_next`,
/// `has_previous`) are always computed from the stored ones.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    content: Vec<T>,
    total_elements: u64,
    size: u32,
    current_page: u32,
}

impl<T> PageResult<T> {
    pub fn new(content: Vec<T>, total_elements: u64, current_page: u32, size: u32) -> Self {
        Self {
            content,
            total_elements,
            size,
            current_page,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.current_page) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }
}

impl<T: Serialize> Serialize for PageResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PageResult", 7)?;
        state.serialize_field("content", &self.content)?;
        state.serialize_field("total_elements", &self.total_elements)?;
        state.serialize_field("total_pages", &self.total_pages())?;
        state.serialize_field("current_page", &self.current_page)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("has_next", &self.has_next())?;
        state.serialize_field("has_previous", &self.has_previous())?;
        state.end()
    }
}
