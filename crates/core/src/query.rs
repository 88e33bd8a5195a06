//! Query-string translation for listing endpoints.
//!
//! Turns the untyped `key -> value` pairs of an HTTP query string into a
//! structured [`ListQuery`]: a filter tree, a sort order, a field
//! projection and a pagination window. Nothing here knows about a concrete
//! entity; field names stay opaque strings until a schema resolves them
//! (see [`crate::video::VideoField`]).
//!
//! Filter syntax, both forms accepted:
//!
//! ```text
//! views[gte]=100      bracketed operator key
//! views=gte:100       operator-tagged value
//! title=cats          case-insensitive substring match
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::num::IntErrorKind;

use chrono::{NaiveDate, Utc};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Keys that control pagination, sorting and projection; never filters.
pub const RESERVED_KEYS: &[&str] = &["page", "sort", "fields", "limit"];

/// Default page number when none (or garbage) is supplied.
pub const DEFAULT_PAGE: u64 = 1;

/// Default page size.
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Largest page size a client may request; larger values are clamped.
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Field used for the default newest-first ordering.
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Internal revision field hidden by the default projection.
pub const VERSION_FIELD: &str = "version";

/// Field always kept by an include-projection.
pub const ID_FIELD: &str = "id";

/// Raw query-string parameters. A `BTreeMap` keeps translation deterministic.
pub type QueryParams = BTreeMap<String, String>;

/// A JSON object produced by projecting an entity.
pub type Document = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Filter tree
// ---------------------------------------------------------------------------

/// Operand of a comparison predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(Timestamp),
    Id(DbId),
}

/// Comparison operators recognised in query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Parse the query-string token (`gte`, `gt`, `lte`, `lt`, `eq`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    /// `true` for the ordering operators, which need a numeric or time operand.
    pub fn is_range(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Whether `ordering` (of the stored value relative to the operand)
    /// satisfies this operator.
    pub fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Eq => ordering == Equal,
            Self::Gt => ordering == Greater,
            Self::Gte => ordering != Less,
            Self::Lt => ordering == Less,
            Self::Lte => ordering != Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Compare(CompareOp, FilterValue),
    /// Case-insensitive substring match.
    Contains(String),
}

/// A single `field <op> value` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate<F> {
    pub field: F,
    pub op: FilterOp,
}

/// Conjunctive filter tree, generic over the field representation.
///
/// The translator produces `Filter<String>`; a schema turns it into a
/// filter over its own typed fields via [`Filter::try_map`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter<F> {
    All(Vec<Filter<F>>),
    Pred(Predicate<F>),
}

impl<F> Filter<F> {
    /// Filter that matches every record.
    pub fn everything() -> Self {
        Filter::All(Vec::new())
    }

    pub fn pred(field: F, op: FilterOp) -> Self {
        Filter::Pred(Predicate { field, op })
    }

    /// Conjunction of `self` and `other`, flattening nested `All` nodes.
    pub fn and(self, other: Filter<F>) -> Self {
        let mut parts = match self {
            Filter::All(parts) => parts,
            single => vec![single],
        };
        match other {
            Filter::All(more) => parts.extend(more),
            single => parts.push(single),
        }
        Filter::All(parts)
    }

    /// All leaf predicates, depth first.
    pub fn predicates(&self) -> Vec<&Predicate<F>> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate<F>>) {
        match self {
            Filter::All(parts) => parts.iter().for_each(|p| p.collect_predicates(out)),
            Filter::Pred(p) => out.push(p),
        }
    }

    /// Rebuild the tree, converting every predicate with `f`.
    pub fn try_map<G, E>(
        self,
        f: &mut impl FnMut(Predicate<F>) -> Result<Predicate<G>, E>,
    ) -> Result<Filter<G>, E> {
        match self {
            Filter::All(parts) => parts
                .into_iter()
                .map(|p| p.try_map(&mut *f))
                .collect::<Result<Vec<_>, E>>()
                .map(Filter::All),
            Filter::Pred(p) => f(p).map(Filter::Pred),
        }
    }
}

// ---------------------------------------------------------------------------
// Sort, projection, pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey<F> {
    pub field: F,
    pub direction: SortDirection,
}

/// Which fields of a returned document survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(BTreeSet::from([VERSION_FIELD.to_string()]))
    }
}

impl Projection {
    /// Field names mentioned by the projection.
    pub fn fields(&self) -> &BTreeSet<String> {
        match self {
            Projection::Include(f) | Projection::Exclude(f) => f,
        }
    }

    /// Apply the projection to a document. `id` always survives an include.
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Projection::Include(fields) => {
                doc.retain(|key, _| key == ID_FIELD || fields.contains(key));
            }
            Projection::Exclude(fields) => {
                doc.retain(|key, _| !fields.contains(key));
            }
        }
        doc
    }
}

/// Page window derived from `page` and `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWindow {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

impl Default for PaginationWindow {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Complete, schema-agnostic description of a listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Filter<String>,
    pub sort: Vec<SortKey<String>>,
    pub projection: Projection,
    pub window: PaginationWindow,
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate raw query parameters using the default [`RESERVED_KEYS`].
pub fn translate(params: &QueryParams) -> Result<ListQuery, CoreError> {
    let param = |key: &str| params.get(key).map(String::as_str);
    Ok(ListQuery {
        filter: build_filter(params, RESERVED_KEYS)?,
        sort: build_sort(param("sort"))?,
        projection: build_projection(param("fields"))?,
        window: build_pagination(param("page"), param("limit"))?,
    })
}

/// Build the filter tree from every non-reserved parameter.
///
/// Keys whose field name is empty are dropped: an empty field must never
/// reach a store, where it could turn into a match-everything clause.
pub fn build_filter(params: &QueryParams, reserved: &[&str]) -> Result<Filter<String>, CoreError> {
    let mut predicates = Vec::new();

    for (key, value) in params {
        if reserved.contains(&key.as_str()) {
            continue;
        }

        let (field, bracket_op) = split_bracketed_key(key)?;
        if field.is_empty() || reserved.contains(&field) {
            continue;
        }

        let (op, operand) = match bracket_op {
            Some(op) => (Some(op), value.as_str()),
            None => match split_tagged_value(value) {
                Some((op, operand)) => (Some(op), operand),
                None => (None, value.as_str()),
            },
        };

        let op = match op {
            Some(op) => FilterOp::Compare(op, parse_operand(field, op, operand)?),
            None if value.is_empty() => continue,
            None => FilterOp::Contains(value.clone()),
        };

        predicates.push(Filter::pred(field.to_string(), op));
    }

    Ok(Filter::All(predicates))
}

/// Parse a comma-separated sort list; `-field` sorts descending.
///
/// Absent or blank input sorts newest first on [`DEFAULT_SORT_FIELD`].
pub fn build_sort(raw: Option<&str>) -> Result<Vec<SortKey<String>>, CoreError> {
    let mut keys = Vec::new();

    for entry in raw.unwrap_or_default().split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        let (field, direction) = match entry.strip_prefix('-') {
            Some(rest) => (rest.trim(), SortDirection::Desc),
            None => (entry, SortDirection::Asc),
        };
        if field.is_empty() {
            return Err(CoreError::InvalidQuery(format!(
                "Sort entry '{entry}' has no field name"
            )));
        }
        keys.push(SortKey {
            field: field.to_string(),
            direction,
        });
    }

    if keys.is_empty() {
        keys.push(SortKey {
            field: DEFAULT_SORT_FIELD.to_string(),
            direction: SortDirection::Desc,
        });
    }

    Ok(keys)
}

/// Parse a comma-separated field list into a [`Projection`].
///
/// Plain names include, `-name` excludes; the two cannot be mixed.
pub fn build_projection(raw: Option<&str>) -> Result<Projection, CoreError> {
    let mut include = BTreeSet::new();
    let mut exclude = BTreeSet::new();

    for entry in raw.unwrap_or_default().split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        match entry.strip_prefix('-') {
            Some(rest) if rest.trim().is_empty() => {
                return Err(CoreError::InvalidQuery(
                    "Projection entry '-' has no field name".into(),
                ));
            }
            Some(rest) => {
                exclude.insert(rest.trim().to_string());
            }
            None => {
                include.insert(entry.to_string());
            }
        }
    }

    match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Ok(Projection::default()),
        (false, true) => Ok(Projection::Include(include)),
        (true, false) => Ok(Projection::Exclude(exclude)),
        (false, false) => Err(CoreError::InvalidQuery(
            "Projection cannot mix included and excluded fields".into(),
        )),
    }
}

/// Derive the pagination window from raw `page` / `limit` values.
///
/// Missing, non-numeric or zero values fall back to the defaults; negative
/// values are rejected. `limit` is clamped to [`MAX_PAGE_LIMIT`]; a page
/// whose offset does not fit is rejected.
pub fn build_pagination(
    raw_page: Option<&str>,
    raw_limit: Option<&str>,
) -> Result<PaginationWindow, CoreError> {
    let page = parse_positive("page", raw_page, DEFAULT_PAGE)?;
    let limit = parse_positive("limit", raw_limit, DEFAULT_PAGE_LIMIT)?.min(MAX_PAGE_LIMIT);

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| CoreError::InvalidQuery(format!("Page {page} is out of range")))?;

    Ok(PaginationWindow {
        page,
        limit,
        offset,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Split `field[op]` into its field name and operator.
fn split_bracketed_key(key: &str) -> Result<(&str, Option<CompareOp>), CoreError> {
    let key = key.trim();
    let Some(open) = key.find('[') else {
        return Ok((key, None));
    };
    let Some(token) = key[open + 1..].strip_suffix(']') else {
        return Ok((key, None));
    };

    let op = CompareOp::from_token(token.trim()).ok_or_else(|| {
        CoreError::InvalidQuery(format!("Unknown filter operator '{token}' in '{key}'"))
    })?;
    Ok((key[..open].trim(), Some(op)))
}

/// Split an operator-tagged value such as `gte:100`.
fn split_tagged_value(value: &str) -> Option<(CompareOp, &str)> {
    let (token, operand) = value.split_once(':')?;
    CompareOp::from_token(token.trim()).map(|op| (op, operand))
}

fn parse_operand(field: &str, op: CompareOp, operand: &str) -> Result<FilterValue, CoreError> {
    let operand = operand.trim();
    if operand.is_empty() {
        return Err(CoreError::InvalidQuery(format!(
            "Operator '{}' on '{field}' needs a value",
            op.as_str()
        )));
    }

    if !op.is_range() {
        return Ok(FilterValue::Text(operand.to_string()));
    }

    if let Some(n) = parse_number(operand) {
        return Ok(FilterValue::Number(n));
    }
    if let Some(ts) = parse_timestamp(operand) {
        return Ok(FilterValue::Timestamp(ts));
    }
    Err(CoreError::InvalidQuery(format!(
        "Operator '{}' on '{field}' expects a number or timestamp, got '{operand}'",
        op.as_str()
    )))
}

/// Parse a finite number.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_positive(name: &str, raw: Option<&str>, default: u64) -> Result<u64, CoreError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let raw = raw.trim();
    let n = match raw.parse::<i64>() {
        Ok(n) => n,
        // Digits too wide for i64 saturate and meet the same range checks.
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => i64::MIN,
        Err(_) => return Ok(default),
    };
    match n {
        0 => Ok(default),
        n if n > 0 => Ok(n as u64),
        _ => Err(CoreError::InvalidQuery(format!(
            "'{name}' must be a positive integer, got {raw}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn only_predicate(filter: &Filter<String>) -> &Predicate<String> {
        let preds = filter.predicates();
        assert_eq!(preds.len(), 1, "expected exactly one predicate: {filter:?}");
        preds[0]
    }

    // -- build_filter --------------------------------------------------------

    #[test]
    fn tagged_value_maps_to_range_operator() {
        let filter = build_filter(&params(&[("views", "gte:100")]), RESERVED_KEYS).unwrap();
        let pred = only_predicate(&filter);
        assert_eq!(pred.field, "views");
        assert_eq!(
            pred.op,
            FilterOp::Compare(CompareOp::Gte, FilterValue::Number(100.0))
        );
    }

    #[test]
    fn bracketed_key_matches_tagged_value() {
        let bracketed = build_filter(&params(&[("views[gte]", "100")]), RESERVED_KEYS).unwrap();
        let tagged = build_filter(&params(&[("views", "gte:100")]), RESERVED_KEYS).unwrap();
        assert_eq!(bracketed, tagged);
    }

    #[test]
    fn non_numeric_range_operand_is_rejected() {
        let result = build_filter(&params(&[("views", "gt:lots")]), RESERVED_KEYS);
        assert_matches!(result, Err(CoreError::InvalidQuery(_)));

        let result = build_filter(&params(&[("views[lt]", "NaN")]), RESERVED_KEYS);
        assert_matches!(result, Err(CoreError::InvalidQuery(_)));
    }

    #[test]
    fn range_operand_accepts_timestamps() {
        let filter =
            build_filter(&params(&[("createdAt[gte]", "2024-03-01")]), RESERVED_KEYS).unwrap();
        assert_matches!(
            &only_predicate(&filter).op,
            FilterOp::Compare(CompareOp::Gte, FilterValue::Timestamp(_))
        );
    }

    #[test]
    fn eq_keeps_lexical_operand() {
        let filter = build_filter(&params(&[("title", "eq:Intro")]), RESERVED_KEYS).unwrap();
        assert_eq!(
            only_predicate(&filter).op,
            FilterOp::Compare(CompareOp::Eq, FilterValue::Text("Intro".into()))
        );
    }

    #[test]
    fn plain_value_becomes_substring_match() {
        let filter = build_filter(&params(&[("title", "Rust")]), RESERVED_KEYS).unwrap();
        assert_eq!(only_predicate(&filter).op, FilterOp::Contains("Rust".into()));
    }

    #[test]
    fn timestamp_value_is_not_mistaken_for_operator() {
        let filter =
            build_filter(&params(&[("note", "2024-01-01T10:00:00Z")]), RESERVED_KEYS).unwrap();
        assert_eq!(
            only_predicate(&filter).op,
            FilterOp::Contains("2024-01-01T10:00:00Z".into())
        );
    }

    #[test]
    fn reserved_keys_are_not_filters() {
        let filter = build_filter(
            &params(&[
                ("page", "2"),
                ("sort", "-views"),
                ("fields", "title"),
                ("limit", "5"),
            ]),
            RESERVED_KEYS,
        )
        .unwrap();
        assert!(filter.predicates().is_empty());
    }

    #[test]
    fn empty_field_names_never_become_predicates() {
        let filter = build_filter(
            &params(&[("", "x"), ("  ", "y"), ("[gte]", "5"), ("title", "ok")]),
            RESERVED_KEYS,
        )
        .unwrap();
        let preds = filter.predicates();
        assert_eq!(preds.len(), 1);
        assert!(preds.iter().all(|p| !p.field.is_empty()));
    }

    #[test]
    fn unknown_bracket_operator_is_rejected() {
        let result = build_filter(&params(&[("views[ne]", "1")]), RESERVED_KEYS);
        assert_matches!(result, Err(CoreError::InvalidQuery(_)));
    }

    #[test]
    fn missing_operand_is_rejected() {
        let result = build_filter(&params(&[("views", "gte:")]), RESERVED_KEYS);
        assert_matches!(result, Err(CoreError::InvalidQuery(_)));
    }

    #[test]
    fn several_operators_on_one_field_are_conjoined() {
        let filter = build_filter(
            &params(&[("views[gte]", "10"), ("views[lt]", "20")]),
            RESERVED_KEYS,
        )
        .unwrap();
        assert_eq!(filter.predicates().len(), 2);
    }

    // -- build_sort ----------------------------------------------------------

    #[test]
    fn sort_defaults_to_newest_first() {
        let sort = build_sort(None).unwrap();
        assert_eq!(
            sort,
            vec![SortKey {
                field: "createdAt".to_string(),
                direction: SortDirection::Desc,
            }]
        );
        assert_eq!(build_sort(Some("  ")).unwrap(), sort);
    }

    #[test]
    fn sort_parses_directions_in_order() {
        let sort = build_sort(Some("title,-views")).unwrap();
        assert_eq!(
            sort,
            vec![
                SortKey {
                    field: "title".to_string(),
                    direction: SortDirection::Asc,
                },
                SortKey {
                    field: "views".to_string(),
                    direction: SortDirection::Desc,
                },
            ]
        );
    }

    #[test]
    fn bare_minus_sort_entry_is_rejected() {
        assert_matches!(build_sort(Some("title,-")), Err(CoreError::InvalidQuery(_)));
    }

    // -- build_projection ----------------------------------------------------

    #[test]
    fn projection_defaults_to_hiding_version() {
        let projection = build_projection(None).unwrap();
        assert_eq!(projection, Projection::default());
        assert!(projection.fields().contains(VERSION_FIELD));
    }

    #[test]
    fn projection_include_keeps_id() {
        let projection = build_projection(Some("title, views")).unwrap();
        let doc: Document = serde_json::from_value(serde_json::json!({
            "id": "abc", "title": "t", "views": 3, "description": "d"
        }))
        .unwrap();
        let projected = projection.apply(doc);
        let keys: Vec<_> = projected.keys().cloned().collect();
        assert_eq!(keys, vec!["id", "title", "views"]);
    }

    #[test]
    fn projection_mixing_modes_is_rejected() {
        assert_matches!(
            build_projection(Some("title,-views")),
            Err(CoreError::InvalidQuery(_))
        );
    }

    // -- build_pagination ----------------------------------------------------

    #[test]
    fn pagination_computes_offset() {
        let window = build_pagination(Some("2"), Some("5")).unwrap();
        assert_eq!((window.offset, window.limit), (5, 5));
    }

    #[test]
    fn pagination_defaults() {
        let window = build_pagination(None, None).unwrap();
        assert_eq!((window.offset, window.limit), (0, 10));

        let window = build_pagination(Some("abc"), Some("0")).unwrap();
        assert_eq!((window.page, window.offset, window.limit), (1, 0, 10));
    }

    #[test]
    fn pagination_clamps_limit() {
        let window = build_pagination(Some("1"), Some("10000")).unwrap();
        assert_eq!(window.limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn negative_pagination_is_rejected() {
        assert_matches!(
            build_pagination(Some("-1"), None),
            Err(CoreError::InvalidQuery(_))
        );
    }

    #[test]
    fn oversized_page_numbers_are_out_of_range() {
        for raw in ["9223372036854775807", "99999999999999999999"] {
            assert_matches!(
                build_pagination(Some(raw), None),
                Err(CoreError::InvalidQuery(msg)) if msg.contains("out of range")
            );
        }
        assert_matches!(
            build_pagination(Some("-99999999999999999999"), None),
            Err(CoreError::InvalidQuery(_))
        );
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let window = build_pagination(Some("2"), Some("99999999999999999999")).unwrap();
        assert_eq!((window.limit, window.offset), (MAX_PAGE_LIMIT, MAX_PAGE_LIMIT));
    }

    // -- translate -----------------------------------------------------------

    #[test]
    fn translate_combines_all_parts() {
        let query = translate(&params(&[
            ("title", "rust"),
            ("sort", "-views"),
            ("fields", "title"),
            ("page", "3"),
            ("limit", "4"),
        ]))
        .unwrap();
        assert_eq!(query.filter.predicates().len(), 1);
        assert_eq!(query.sort[0].direction, SortDirection::Desc);
        assert_matches!(query.projection, Projection::Include(_));
        assert_eq!(query.window.offset, 8);
    }
}
