//! Row shapes and materialization of raw cells into rows.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use foldhash::{HashMap, HashMapExt};

use crate::dialect::DialectConfig;
use crate::intern::{StringComparer, StringInternPool};

/// Raw cells of one record, fixed to the file's column count.
pub type RawRow = Vec<Option<String>>;

/// A materialized cell value.
pub type Cell = Option<Arc<str>>;

/// Describes the fields of an output row and how to build one.
///
/// Fields are matched to header columns by name using the table's comparer.
pub trait RowShape {
    type Row;

    /// Output field names, in order.
    fn fields(&self) -> Vec<String>;

    /// Identity of the shape in the mapping cache.
    fn fingerprint(&self) -> String {
        self.fields().join("\u{1f}")
    }

    /// Build a row from cells ordered like [`RowShape::fields`].
    fn build(&self, cells: Vec<Cell>) -> Self::Row;
}

/// Shape whose fields are exactly the table's header columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    columns: Arc<[String]>,
}

impl RecordShape {
    pub fn new(columns: impl Into<Arc<[String]>>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl RowShape for RecordShape {
    type Row = Record;

    fn fields(&self) -> Vec<String> {
        self.columns.to_vec()
    }

    fn build(&self, cells: Vec<Cell>) -> Record {
        Record {
            columns: Arc::clone(&self.columns),
            values: cells,
        }
    }
}

/// A row as ordered name/value pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Cell>,
}

impl Record {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at column `index`; `None` for a null cell or an out of range index.
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.values.get(index)?.as_deref()
    }

    /// Shared value at column `index`, for identity comparisons.
    pub fn cell(&self, index: usize) -> Option<&Arc<str>> {
        self.values.get(index)?.as_ref()
    }

    /// Value of the first column named `name` (exact match).
    pub fn get(&self, name: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.get_index(index)
    }

    /// Ordered `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(|v| v.as_deref()))
    }

    /// Values as owned strings, nulls included.
    pub fn to_vec(&self) -> Vec<Option<String>> {
        self.values
            .iter()
            .map(|v| v.as_deref().map(str::to_string))
            .collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={}", value.unwrap_or("null"))?;
        }
        Ok(())
    }
}

/// For each output field, the header column it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    positions: Vec<Option<usize>>,
}

impl ColumnMapping {
    /// Match every field to the first header column equal to it.
    pub fn build(fields: &[String], header: &[String], comparer: StringComparer) -> Self {
        let positions = fields
            .iter()
            .map(|field| header.iter().position(|column| comparer.equals(column, field)))
            .collect();
        Self { positions }
    }

    pub fn positions(&self) -> &[Option<usize>] {
        &self.positions
    }

    /// Reorder `raw` into field order, interning values when a pool is given.
    pub fn apply(&self, mut raw: RawRow, pool: Option<&StringInternPool>) -> Vec<Cell> {
        self.positions
            .iter()
            .map(|position| {
                let value = position.and_then(|p| raw.get_mut(p)?.take())?;
                Some(match pool {
                    Some(pool) => pool.intern(&value),
                    None => Arc::from(value),
                })
            })
            .collect()
    }
}

/// Key of the mapping cache.
///
/// Files which share a shape but were parsed or matched differently never
/// share a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub shape: String,
    pub dialect: DialectConfig,
    pub header: Vec<String>,
    pub comparer: StringComparer,
}

/// Column mappings built once per key and reused for every row.
#[derive(Debug, Default)]
pub struct MappingCache {
    mappings: Mutex<HashMap<MappingKey, Arc<ColumnMapping>>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self {
            mappings: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_build(
        &self,
        key: MappingKey,
        build: impl FnOnce() -> ColumnMapping,
    ) -> Arc<ColumnMapping> {
        let mut mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(mappings.entry(key).or_insert_with(|| Arc::new(build())))
    }

    pub fn len(&self) -> usize {
        self.mappings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns raw rows of one table into rows of shape `S`.
pub struct RowMaterializer<S> {
    shape: S,
    mapping: Arc<ColumnMapping>,
    pool: Option<Arc<StringInternPool>>,
}

impl<S: RowShape> RowMaterializer<S> {
    pub fn new(shape: S, mapping: Arc<ColumnMapping>, pool: Option<Arc<StringInternPool>>) -> Self {
        Self {
            shape,
            mapping,
            pool,
        }
    }

    pub fn materialize(&self, raw: RawRow) -> S::Row {
        let cells = self.mapping.apply(raw, self.pool.as_deref());
        self.shape.build(cells)
    }
}
