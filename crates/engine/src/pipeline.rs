//! Aggregation pipelines as plain data.
//!
//! A [`Pipeline`] is a list of stages (match one document, unwind an embedded
//! array into rows, group the rows into reductions) that a
//! [`DocumentStore`](crate::store::DocumentStore) executes on its side. The
//! builders [`count_array_elements`] and [`sum_array_field`] are shared by
//! the address quota enforcer and the cart aggregator.
//!
//! Grouping follows document-store semantics: when no rows reach the group
//! stage the result is empty, not a row of zeros. Callers read an empty
//! result as "count 0, total 0".

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

/// Name of the count accumulator produced by the builders.
pub const COUNT: &str = "count";
/// Name of the sum accumulator produced by [`sum_array_field`].
pub const TOTAL: &str = "total";

/// A logical collection in the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Products,
}

impl Collection {
    /// Collection (table) name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Products => "products",
        }
    }
}

/// An embedded array on a user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayField {
    Addresses,
    Cart,
}

impl ArrayField {
    /// Field name inside the document.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Addresses => "addresses",
            Self::Cart => "cart",
        }
    }
}

/// Document filter for a match stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Exactly the document with this id.
    Id(Uuid),
}

/// How a group stage reduces its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Number of rows.
    Count,
    /// Sum of a decimal field of each unwound element.
    Sum(&'static str),
}

/// A named output of a group stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator {
    pub name: &'static str,
    pub reduction: Reduction,
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Match(Filter),
    Unwind(ArrayField),
    Group(Vec<Accumulator>),
}

/// A sequence of stages over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub collection: Collection,
    pub stages: Vec<Stage>,
}

/// Count the elements of `array` on the documents matching `filter`.
///
/// Produces a single [`COUNT`] accumulator.
#[must_use]
pub fn count_array_elements(collection: Collection, filter: Filter, array: ArrayField) -> Pipeline {
    Pipeline {
        collection,
        stages: vec![
            Stage::Match(filter),
            Stage::Unwind(array),
            Stage::Group(vec![Accumulator {
                name: COUNT,
                reduction: Reduction::Count,
            }]),
        ],
    }
}

/// Sum `value_field` over the elements of `array` on the documents matching `filter`.
///
/// Produces a [`TOTAL`] accumulator and a [`COUNT`] of the summed elements.
#[must_use]
pub fn sum_array_field(
    collection: Collection,
    filter: Filter,
    array: ArrayField,
    value_field: &'static str,
) -> Pipeline {
    Pipeline {
        collection,
        stages: vec![
            Stage::Match(filter),
            Stage::Unwind(array),
            Stage::Group(vec![
                Accumulator {
                    name: TOTAL,
                    reduction: Reduction::Sum(value_field),
                },
                Accumulator {
                    name: COUNT,
                    reduction: Reduction::Count,
                },
            ]),
        ],
    }
}

impl Pipeline {
    /// The id of the single document a leading match stage selects, if any.
    #[must_use]
    pub fn matched_id(&self) -> Option<Uuid> {
        self.stages.iter().find_map(|stage| match stage {
            Stage::Match(Filter::Id(id)) => Some(*id),
            _ => None,
        })
    }

    /// Evaluate the pipeline over in-process documents.
    ///
    /// `documents` pairs each document's id with its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unsupported` for a sum before any unwind, and
    /// `StoreError::DataCorruption` when an unwound field is not an array or a
    /// summed value is not a decimal.
    pub fn evaluate<I>(&self, documents: I) -> Result<Vec<AggregateRow>, StoreError>
    where
        I: IntoIterator<Item = (Uuid, Value)>,
    {
        let mut rows: Vec<(Uuid, Value)> = documents.into_iter().collect();
        let mut unwound = false;
        let mut grouped: Option<Vec<AggregateRow>> = None;

        for stage in &self.stages {
            if grouped.is_some() {
                return Err(StoreError::Unsupported(
                    "stages after a group stage".to_string(),
                ));
            }
            match stage {
                Stage::Match(Filter::Id(id)) => rows.retain(|(doc_id, _)| doc_id == id),
                Stage::Unwind(field) => {
                    rows = unwind(rows, *field)?;
                    unwound = true;
                }
                Stage::Group(accumulators) => {
                    grouped = Some(group(&rows, accumulators, unwound)?);
                }
            }
        }

        grouped.ok_or_else(|| StoreError::Unsupported("pipeline has no group stage".to_string()))
    }
}

fn unwind(rows: Vec<(Uuid, Value)>, field: ArrayField) -> Result<Vec<(Uuid, Value)>, StoreError> {
    let mut out = Vec::new();
    for (id, mut doc) in rows {
        match doc.get_mut(field.name()).map(Value::take) {
            Some(Value::Array(elements)) => out.extend(elements.into_iter().map(|e| (id, e))),
            // Missing or null arrays unwind to nothing
            None | Some(Value::Null) => {}
            Some(other) => {
                return Err(StoreError::DataCorruption(format!(
                    "field `{}` is not an array: {other}",
                    field.name()
                )));
            }
        }
    }
    Ok(out)
}

fn group(
    rows: &[(Uuid, Value)],
    accumulators: &[Accumulator],
    unwound: bool,
) -> Result<Vec<AggregateRow>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut values = BTreeMap::new();
    for acc in accumulators {
        let value = match acc.reduction {
            Reduction::Count => Decimal::from(rows.len()),
            Reduction::Sum(field) => {
                if !unwound {
                    return Err(StoreError::Unsupported(format!(
                        "sum of `{field}` requires an unwind stage"
                    )));
                }
                let mut total = Decimal::ZERO;
                for (_, element) in rows {
                    total += decimal_field(element, field)?;
                }
                total
            }
        };
        values.insert(acc.name.to_string(), value);
    }
    Ok(vec![AggregateRow { values }])
}

/// Read a decimal from a JSON field; missing and null count as zero.
fn decimal_field(element: &Value, field: &str) -> Result<Decimal, StoreError> {
    match element.get(field) {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(s)) => s
            .parse::<Decimal>()
            .map_err(|_| StoreError::DataCorruption(format!("`{field}` is not a decimal: {s}"))),
        Some(Value::Number(n)) => n
            .to_string()
            .parse::<Decimal>()
            .map_err(|_| StoreError::DataCorruption(format!("`{field}` is not a decimal: {n}"))),
        Some(other) => Err(StoreError::DataCorruption(format!(
            "`{field}` is not a decimal: {other}"
        ))),
    }
}

/// One output row of a group stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateRow {
    values: BTreeMap<String, Decimal>,
}

impl AggregateRow {
    /// Build a row from named values.
    #[must_use]
    pub fn new(values: BTreeMap<String, Decimal>) -> Self {
        Self { values }
    }

    /// Read a count accumulator.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the accumulator is missing or
    /// not a non-negative integer.
    pub fn count(&self, name: &str) -> Result<usize, StoreError> {
        let value = self.get(name)?;
        if !value.fract().is_zero() || value.is_sign_negative() {
            return Err(StoreError::DataCorruption(format!(
                "`{name}` is not a count: {value}"
            )));
        }
        value
            .to_string()
            .parse::<usize>()
            .map_err(|_| StoreError::DataCorruption(format!("`{name}` is not a count: {value}")))
    }

    /// Read a sum accumulator.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the accumulator is missing.
    pub fn sum(&self, name: &str) -> Result<Decimal, StoreError> {
        self.get(name)
    }

    fn get(&self, name: &str) -> Result<Decimal, StoreError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::DataCorruption(format!("missing accumulator `{name}`")))
    }
}

/// Reduce a single-document pipeline's result to at most one row.
///
/// # Errors
///
/// Returns `StoreError::DataCorruption` if the store produced several groups.
pub fn single_row(rows: Vec<AggregateRow>) -> Result<Option<AggregateRow>, StoreError> {
    let mut rows = rows.into_iter();
    let first = rows.next();
    if rows.next().is_some() {
        return Err(StoreError::DataCorruption(
            "expected at most one group for a single document".to_string(),
        ));
    }
    Ok(first)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(cart_prices: &[&str], addresses: usize) -> (Uuid, Value) {
        let id = Uuid::new_v4();
        let cart: Vec<Value> = cart_prices.iter().map(|p| json!({ "price": p })).collect();
        let addresses: Vec<Value> = (0..addresses).map(|i| json!({ "house": i })).collect();
        (id, json!({ "_id": id, "cart": cart, "addresses": addresses }))
    }

    #[test]
    fn test_count_pipeline_shape() {
        let id = Uuid::new_v4();
        let pipeline =
            count_array_elements(Collection::Users, Filter::Id(id), ArrayField::Addresses);
        assert_eq!(pipeline.matched_id(), Some(id));
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(pipeline.stages[1], Stage::Unwind(ArrayField::Addresses));
    }

    #[test]
    fn test_count_only_matched_document() {
        let (id, doc) = user(&[], 2);
        let other = user(&[], 1);
        let pipeline =
            count_array_elements(Collection::Users, Filter::Id(id), ArrayField::Addresses);

        let rows = pipeline.evaluate([(id, doc), other]).unwrap();
        let row = single_row(rows).unwrap().unwrap();
        assert_eq!(row.count(COUNT).unwrap(), 2);
    }

    #[test]
    fn test_empty_array_yields_no_rows() {
        let (id, doc) = user(&[], 0);
        let pipeline =
            count_array_elements(Collection::Users, Filter::Id(id), ArrayField::Addresses);
        assert!(pipeline.evaluate([(id, doc)]).unwrap().is_empty());
    }

    #[test]
    fn test_sum_prices() {
        let (id, doc) = user(&["10", "25"], 0);
        let pipeline =
            sum_array_field(Collection::Users, Filter::Id(id), ArrayField::Cart, "price");

        let row = single_row(pipeline.evaluate([(id, doc)]).unwrap()).unwrap().unwrap();
        assert_eq!(row.sum(TOTAL).unwrap(), Decimal::new(35, 0));
        assert_eq!(row.count(COUNT).unwrap(), 2);
    }

    #[test]
    fn test_sum_accepts_numbers() {
        let id = Uuid::new_v4();
        let doc = json!({ "cart": [{ "price": 1.5 }, { "price": 2 }] });
        let pipeline =
            sum_array_field(Collection::Users, Filter::Id(id), ArrayField::Cart, "price");
        let row = single_row(pipeline.evaluate([(id, doc)]).unwrap()).unwrap().unwrap();
        assert_eq!(row.sum(TOTAL).unwrap(), Decimal::new(35, 1));
    }

    #[test]
    fn test_sum_rejects_garbage() {
        let id = Uuid::new_v4();
        let doc = json!({ "cart": [{ "price": "ten" }] });
        let pipeline =
            sum_array_field(Collection::Users, Filter::Id(id), ArrayField::Cart, "price");
        assert!(matches!(
            pipeline.evaluate([(id, doc)]),
            Err(StoreError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_unwind_non_array_is_corruption() {
        let id = Uuid::new_v4();
        let doc = json!({ "addresses": "home" });
        let pipeline =
            count_array_elements(Collection::Users, Filter::Id(id), ArrayField::Addresses);
        assert!(matches!(
            pipeline.evaluate([(id, doc)]),
            Err(StoreError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_sum_without_unwind_unsupported() {
        let id = Uuid::new_v4();
        let pipeline = Pipeline {
            collection: Collection::Users,
            stages: vec![Stage::Group(vec![Accumulator {
                name: TOTAL,
                reduction: Reduction::Sum("price"),
            }])],
        };
        assert!(matches!(
            pipeline.evaluate([(id, json!({}))]),
            Err(StoreError::Unsupported(_))
        ));
    }

    #[test]
    fn test_single_row_rejects_many() {
        let rows = vec![AggregateRow::default(), AggregateRow::default()];
        assert!(single_row(rows).is_err());
    }

    #[test]
    fn test_missing_accumulator() {
        let row = AggregateRow::default();
        assert!(matches!(row.count(COUNT), Err(StoreError::DataCorruption(_))));
    }
}
