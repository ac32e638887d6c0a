//! Data preparation verbs.
//!
//! Every verb borrows its input and returns a new [`Dataset`]; nothing is
//! mutated in place, so recipes can branch from one prepared table.

use crate::data::{Dataset, Value, ValueKey};
use crate::error::{Error, Result};
use crate::expr::{evaluate, parse_expr, validate_columns, Predicate};
use crate::parser::Expr;
use crate::stat;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Summary function applied to one column of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reducer {
    Mean,
    Sum,
    /// Number of rows in the group, missing or not
    Count,
    Min,
    Max,
    Median,
    /// Sample standard deviation
    Sd,
    /// Type-7 quantile, `p` in `[0, 1]`
    Quantile(f64),
}

impl Reducer {
    fn reduce(self, values: &[f64], rows: usize) -> Value {
        let result = match self {
            Reducer::Count => return Value::Num(rows as f64),
            Reducer::Mean => stat::mean(values),
            Reducer::Sum => (!values.is_empty()).then(|| values.iter().sum()),
            Reducer::Min => values.iter().copied().reduce(f64::min),
            Reducer::Max => values.iter().copied().reduce(f64::max),
            Reducer::Median => stat::median(values),
            Reducer::Sd => stat::sample_sd(values),
            Reducer::Quantile(p) => stat::quantile(values, p),
        };
        result.map(Value::Num).unwrap_or(Value::Missing)
    }
}

/// One output column of [`Dataset::group_aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub column: String,
    pub reducer: Reducer,
    pub output: String,
}

impl Aggregation {
    pub fn new(column: impl Into<String>, reducer: Reducer, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reducer,
            output: output.into(),
        }
    }

    pub fn mean(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(column, Reducer::Mean, output)
    }

    pub fn sum(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(column, Reducer::Sum, output)
    }

    pub fn sd(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(column, Reducer::Sd, output)
    }

    /// Row count; reads no column.
    pub fn count(output: impl Into<String>) -> Self {
        Self::new(String::new(), Reducer::Count, output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Descending,
        }
    }
}

/// Where a rolling window sits relative to the row it produces a value for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowAlign {
    /// The row and the `W - 1` rows before it
    #[default]
    Trailing,
    /// `(W - 1) / 2` rows before, the rest after
    Centered,
}

impl Dataset {
    /// Keep rows where the predicate holds. Missing results drop the row.
    pub fn filter(&self, predicate: &Predicate) -> Result<Dataset> {
        predicate.validate(self)?;
        let mut rows = Vec::new();
        for (idx, row) in self.iter().enumerate() {
            if predicate.matches(&row)? {
                rows.push(self.rows()[idx].clone());
            }
        }
        debug!(filter = %predicate, kept = rows.len(), of = self.len(), "filter");
        Ok(self.with_rows(rows))
    }

    pub fn filter_expr(&self, source: &str) -> Result<Dataset> {
        self.filter(&Predicate::parse(source)?)
    }

    /// Partition rows by `keys` and summarize each group into one row.
    ///
    /// Output columns are the keys followed by one column per aggregation;
    /// groups appear in order of first encounter. Use [`Dataset::arrange`]
    /// for any other order.
    pub fn group_aggregate(&self, keys: &[&str], aggregations: &[Aggregation]) -> Result<Dataset> {
        let key_idx = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>>>()?;

        let mut inputs = Vec::with_capacity(aggregations.len());
        for agg in aggregations {
            if let Reducer::Quantile(p) = agg.reducer {
                if !(0.0..=1.0).contains(&p) {
                    return Err(Error::InvalidArgument(format!(
                        "quantile probability {} is outside [0, 1]",
                        p
                    )));
                }
            }
            if agg.reducer == Reducer::Count {
                inputs.push(None);
            } else {
                inputs.push(Some(self.numeric_column(&agg.column)?));
            }
        }

        let mut columns: Vec<String> = key_idx.iter().map(|&i| self.columns()[i].clone()).collect();
        columns.extend(aggregations.iter().map(|a| a.output.clone()));

        let groups = self.partition(&key_idx);
        let mut rows = Vec::with_capacity(groups.len());
        for members in &groups {
            let first = &self.rows()[members[0]];
            let mut out: Vec<Value> = key_idx.iter().map(|&i| first[i].clone()).collect();
            for (agg, input) in aggregations.iter().zip(&inputs) {
                let values: Vec<f64> = match input {
                    Some(col) => members.iter().filter_map(|&r| col[r]).collect(),
                    None => Vec::new(),
                };
                out.push(agg.reducer.reduce(&values, members.len()));
            }
            rows.push(out);
        }

        debug!(keys = ?keys, groups = rows.len(), "group_aggregate");
        Ok(Dataset::from_parts(columns, rows))
    }

    /// Stable sort by one or more columns. Missing values sort last in
    /// either direction.
    pub fn arrange(&self, keys: &[SortKey]) -> Result<Dataset> {
        let idx = keys
            .iter()
            .map(|k| Ok((self.column_index(&k.column)?, k.order)))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = self.rows().to_vec();
        rows.sort_by(|a, b| compare_rows(a, b, &idx));
        Ok(self.with_rows(rows))
    }

    /// Add a column computed from each row, or replace one of the same name.
    /// Boolean results are stored as `"true"` / `"false"`.
    pub fn derive_column(&self, name: &str, expr: &Expr) -> Result<Dataset> {
        validate_columns(expr, self)?;
        let values = self
            .iter()
            .map(|row| evaluate(expr, &row).map(|d| d.into_value()))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_column(name, values))
    }

    pub fn derive(&self, name: &str, source: &str) -> Result<Dataset> {
        let expr = parse_expr(source)?;
        self.derive_column(name, &expr).map_err(|e| match e {
            Error::Expression { message, .. } => Error::Expression {
                input: source.to_string(),
                message,
            },
            other => other,
        })
    }

    /// Simple moving average of `column` over `window` rows, computed per
    /// `group_by` group in `order_by` order. Rows keep their original order.
    ///
    /// Positions without a full window, and windows containing a missing
    /// value, are `Missing`.
    pub fn rolling_mean(
        &self,
        column: &str,
        window: usize,
        order_by: &str,
        group_by: &[&str],
        align: WindowAlign,
        output: &str,
    ) -> Result<Dataset> {
        if window == 0 {
            return Err(Error::InvalidArgument("rolling window must be at least 1".to_string()));
        }
        let values = self.numeric_column(column)?;
        let groups = self.ordered_groups(order_by, group_by)?;

        let before = match align {
            WindowAlign::Trailing => window - 1,
            WindowAlign::Centered => (window - 1) / 2,
        };
        let after = window - 1 - before;

        let mut out = vec![Value::Missing; self.len()];
        for members in &groups {
            for pos in before..members.len().saturating_sub(after) {
                let span = &members[pos - before..=pos + after];
                let window_values: Option<Vec<f64>> = span.iter().map(|&r| values[r]).collect();
                if let Some(w) = window_values {
                    out[members[pos]] = Value::Num(w.iter().sum::<f64>() / window as f64);
                }
            }
        }
        Ok(self.with_column(output, out))
    }

    /// Running total of `column` per group in `order_by` order. Once a
    /// missing value is met, the rest of that group is `Missing`.
    pub fn cumulative_sum(
        &self,
        column: &str,
        order_by: &str,
        group_by: &[&str],
        output: &str,
    ) -> Result<Dataset> {
        let values = self.numeric_column(column)?;
        let groups = self.ordered_groups(order_by, group_by)?;

        let mut out = vec![Value::Missing; self.len()];
        for members in &groups {
            let mut total = Some(0.0);
            for &r in members {
                total = total.zip(values[r]).map(|(t, v)| t + v);
                out[r] = total.map(Value::Num).unwrap_or(Value::Missing);
            }
        }
        Ok(self.with_column(output, out))
    }

    /// Keep only `columns`, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Dataset> {
        let idx = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let names = idx.iter().map(|&i| self.columns()[i].clone()).collect();
        let rows = self
            .rows()
            .iter()
            .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Dataset::from_parts(names, rows))
    }

    /// Row indices per distinct key, groups in first-encounter order.
    pub(crate) fn partition(&self, key_idx: &[usize]) -> Vec<Vec<usize>> {
        let mut lookup: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (r, row) in self.rows().iter().enumerate() {
            let key = group_key(row, key_idx);
            let slot = *lookup.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(r);
        }
        groups
    }

    fn ordered_groups(&self, order_by: &str, group_by: &[&str]) -> Result<Vec<Vec<usize>>> {
        let order_idx = self.column_index(order_by)?;
        let key_idx = group_by
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>>>()?;

        let mut groups = self.partition(&key_idx);
        for members in &mut groups {
            members.sort_by(|&a, &b| self.rows()[a][order_idx].sort_cmp(&self.rows()[b][order_idx]));
        }
        Ok(groups)
    }

    fn with_column(&self, name: &str, values: Vec<Value>) -> Dataset {
        let existing = self.column_index(name).ok();
        let (mut columns, mut rows) = self.clone().into_parts();
        match existing {
            Some(idx) => {
                for (row, v) in rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                columns.push(name.to_string());
                for (row, v) in rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
        Dataset::from_parts(columns, rows)
    }
}

fn group_key(row: &[Value], key_idx: &[usize]) -> Vec<ValueKey> {
    key_idx.iter().map(|&i| row[i].key()).collect()
}

fn compare_rows(a: &[Value], b: &[Value], keys: &[(usize, SortOrder)]) -> Ordering {
    for &(idx, order) in keys {
        let (x, y) = (&a[idx], &b[idx]);
        let ord = match (x.is_missing(), y.is_missing()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => match order {
                SortOrder::Ascending => x.sort_cmp(y),
                SortOrder::Descending => y.sort_cmp(x),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(csv: &str) -> Dataset {
        Dataset::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn nums(data: &Dataset, column: &str) -> Vec<Option<f64>> {
        data.numeric_column(column).unwrap()
    }

    #[test]
    fn test_group_mean_by_species() {
        let data = table("species,length\nA,5\nA,6\nB,7\n");
        let out = data
            .group_aggregate(&["species"], &[Aggregation::mean("length", "mean_length")])
            .unwrap();
        assert_eq!(out.columns(), &["species".to_string(), "mean_length".to_string()]);
        assert_eq!(out.rows()[0], vec![Value::from("A"), Value::Num(5.5)]);
        assert_eq!(out.rows()[1], vec![Value::from("B"), Value::Num(7.0)]);
    }

    #[test]
    fn test_group_partition_counts_add_up() {
        let data = crate::datasets::iris().unwrap();
        let out = data
            .group_aggregate(&["species"], &[Aggregation::count("n")])
            .unwrap();
        assert_eq!(out.len(), 3);
        let total: f64 = nums(&out, "n").into_iter().flatten().sum();
        assert_eq!(total as usize, data.len());
    }

    #[test]
    fn test_negative_zero_shares_a_group_with_zero() {
        let data = table("k,v\n0,1\n-0,2\n0.0,3\n");
        let out = data
            .group_aggregate(&["k"], &[Aggregation::sum("v", "total")])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(nums(&out, "total"), vec![Some(6.0)]);
        assert_eq!(out.rows()[0][0].to_string(), "0");
    }

    #[test]
    fn test_group_aggregate_by_key_tuple() {
        let data = table("a,b,v\nx,1,1\nx,2,2\nx,1,3\ny,1,4\n");
        let out = data
            .group_aggregate(&["a", "b"], &[Aggregation::sum("v", "total")])
            .unwrap();
        assert_eq!(out.columns(), &["a".to_string(), "b".to_string(), "total".to_string()]);
        assert_eq!(
            out.rows(),
            &[
                vec![Value::from("x"), Value::Num(1.0), Value::Num(4.0)],
                vec![Value::from("x"), Value::Num(2.0), Value::Num(2.0)],
                vec![Value::from("y"), Value::Num(1.0), Value::Num(4.0)],
            ]
        );
    }

    #[test]
    fn test_quantile_reducer() {
        let data = table("g,v\na,1\na,2\na,3\na,4\na,5\n");
        let out = data
            .group_aggregate(
                &["g"],
                &[
                    Aggregation::new("v", Reducer::Quantile(0.25), "q1"),
                    Aggregation::new("v", Reducer::Quantile(0.9), "p90"),
                    Aggregation::new("v", Reducer::Median, "median"),
                ],
            )
            .unwrap();
        assert_relative_eq!(nums(&out, "q1")[0].unwrap(), 2.0);
        assert_relative_eq!(nums(&out, "p90")[0].unwrap(), 4.6);
        assert_relative_eq!(nums(&out, "median")[0].unwrap(), 3.0);

        for p in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                data.group_aggregate(&["g"], &[Aggregation::new("v", Reducer::Quantile(p), "q")]),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_group_aggregate_ignores_missing() {
        let data = table("g,v\na,1\na,NA\na,3\nb,NA\n");
        let out = data
            .group_aggregate(
                &["g"],
                &[Aggregation::sum("v", "total"), Aggregation::count("n")],
            )
            .unwrap();
        assert_eq!(nums(&out, "total"), vec![Some(4.0), None]);
        assert_eq!(nums(&out, "n"), vec![Some(3.0), Some(1.0)]);
    }

    #[test]
    fn test_group_aggregate_empty_keeps_schema() {
        let data = table("g,v\na,1\n").filter_expr("v > 10").unwrap();
        let out = data
            .group_aggregate(&["g"], &[Aggregation::mean("v", "m")])
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.columns().len(), 2);
    }

    #[test]
    fn test_group_aggregate_text_column_is_schema_mismatch() {
        let data = table("g,v\na,x\n");
        let err = data
            .group_aggregate(&["g"], &[Aggregation::mean("v", "m")])
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn test_filter_unknown_column_on_empty_dataset() {
        let data = Dataset::empty(vec!["cases".to_string()]);
        assert!(matches!(
            data.filter_expr("deaths > 0"),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_rolling_mean_trailing() {
        let data = table("t,v\n1,1\n2,2\n3,3\n4,4\n5,5\n6,6\n7,7\n");
        let out = data
            .rolling_mean("v", 3, "t", &[], WindowAlign::Trailing, "avg")
            .unwrap();
        assert_eq!(
            nums(&out, "avg"),
            vec![None, None, Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)]
        );
    }

    #[test]
    fn test_rolling_mean_centered() {
        let data = table("t,v\n1,1\n2,2\n3,3\n4,4\n5,5\n");
        let out = data
            .rolling_mean("v", 3, "t", &[], WindowAlign::Centered, "avg")
            .unwrap();
        assert_eq!(nums(&out, "avg"), vec![None, Some(2.0), Some(3.0), Some(4.0), None]);
    }

    #[test]
    fn test_rolling_mean_per_group_keeps_row_order() {
        // interleaved groups, reverse time order within each
        let data = table("g,t,v\na,2,4\nb,2,40\na,1,2\nb,1,20\n");
        let out = data
            .rolling_mean("v", 2, "t", &["g"], WindowAlign::Trailing, "avg")
            .unwrap();
        assert_eq!(nums(&out, "avg"), vec![Some(3.0), Some(30.0), None, None]);
    }

    #[test]
    fn test_rolling_mean_rejects_zero_window() {
        let data = table("t,v\n1,1\n");
        assert!(matches!(
            data.rolling_mean("v", 0, "t", &[], WindowAlign::Trailing, "avg"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cumulative_sum() {
        let data = table("t,v\n1,3\n2,5\n3,2\n");
        let out = data.cumulative_sum("v", "t", &[], "total").unwrap();
        assert_eq!(nums(&out, "total"), vec![Some(3.0), Some(8.0), Some(10.0)]);
    }

    #[test]
    fn test_cumulative_sum_missing_poisons_rest_of_group() {
        let data = table("g,t,v\na,1,1\na,2,NA\na,3,2\nb,1,4\n");
        let out = data.cumulative_sum("v", "t", &["g"], "total").unwrap();
        assert_eq!(nums(&out, "total"), vec![Some(1.0), None, None, Some(4.0)]);
    }

    #[test]
    fn test_arrange_descending_with_missing_last() {
        let data = table("k,v\na,1\nb,NA\nc,3\n");
        let out = data.arrange(&[SortKey::desc("v")]).unwrap();
        assert_eq!(nums(&out, "v"), vec![Some(3.0), Some(1.0), None]);
    }

    #[test]
    fn test_derive_replaces_and_adds() {
        let data = table("a,b\n1,2\n");
        let out = data.derive("c", "a + b").unwrap().derive("a", "a * 10").unwrap();
        assert_eq!(out.columns().len(), 3);
        assert_relative_eq!(nums(&out, "a")[0].unwrap(), 10.0);
        assert_relative_eq!(nums(&out, "c")[0].unwrap(), 3.0);
    }

    #[test]
    fn test_select_projects() {
        let data = table("a,b,c\n1,2,3\n");
        let out = data.select(&["c", "A"]).unwrap();
        assert_eq!(out.columns(), &["c".to_string(), "a".to_string()]);
        assert!(data.select(&["z"]).is_err());
    }
}
