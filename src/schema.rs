//! Schema resolution: field kinds, byte offsets, and stride.

use crate::error::{HocError, Result};
use serde::{Deserialize, Serialize};

/// A field's storage kind and its fixed on-disk width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    I64,
    U64,
    F64,
    Bool,
    String,
}

impl FieldKind {
    /// Width of a slot of this kind, in bytes.
    pub const fn width(self) -> usize {
        match self {
            FieldKind::I64 | FieldKind::U64 | FieldKind::F64 => 8,
            FieldKind::Bool => 1,
            FieldKind::String => 128,
        }
    }

    /// Whether this kind can participate in numeric aggregation (`get_stats`).
    pub const fn is_numeric(self) -> bool {
        matches!(self, FieldKind::I64 | FieldKind::U64 | FieldKind::F64)
    }

    /// The integer constant used on the C ABI (§6). `BOOL` extends the
    /// original `I64=1, F64=2, U64=3, STRING=5` mapping with the lowest
    /// unused slot, since the original header never assigned one.
    pub const fn abi_code(self) -> i32 {
        match self {
            FieldKind::I64 => 1,
            FieldKind::F64 => 2,
            FieldKind::U64 => 3,
            FieldKind::Bool => 4,
            FieldKind::String => 5,
        }
    }

    pub(crate) fn from_abi_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(FieldKind::I64),
            2 => Some(FieldKind::F64),
            3 => Some(FieldKind::U64),
            4 => Some(FieldKind::Bool),
            5 => Some(FieldKind::String),
            _ => None,
        }
    }
}

/// A single `(name, kind)` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A resolved schema: fields plus their precomputed byte offsets, stride,
/// and the index of the mandatory `timestamp` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
    offsets: Vec<usize>,
    stride: usize,
    timestamp_index: usize,
}

impl Schema {
    /// Resolve a declared field list into offsets and stride.
    ///
    /// Fails with [`HocError::BadSchema`] if no field named `timestamp` of
    /// kind `I64` exists, or a field name is repeated.
    pub fn resolve(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(HocError::BadSchema("schema has no fields".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(HocError::BadSchema(format!(
                    "duplicate field name '{}'",
                    f.name
                )));
            }
        }

        let timestamp_index = fields
            .iter()
            .position(|f| f.name == "timestamp")
            .ok_or_else(|| HocError::BadSchema("no field named 'timestamp'".into()))?;
        if fields[timestamp_index].kind != FieldKind::I64 {
            return Err(HocError::BadSchema(
                "'timestamp' field must be of kind I64".into(),
            ));
        }

        let mut offsets = Vec::with_capacity(fields.len());
        let mut stride = 0usize;
        for f in &fields {
            offsets.push(stride);
            stride += f.kind.width();
        }

        Ok(Self {
            fields,
            offsets,
            stride,
            timestamp_index,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn timestamp_index(&self) -> usize {
        self.timestamp_index
    }

    pub fn offset_of(&self, field_index: usize) -> Option<usize> {
        self.offsets.get(field_index).copied()
    }

    pub fn kind_of(&self, field_index: usize) -> Option<FieldKind> {
        self.fields.get(field_index).map(|f| f.kind)
    }

    pub fn field_index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Validate this schema against a schema persisted on a previous
    /// creation of the same dataset: same field count, names, kinds, order.
    pub fn validate_against(&self, persisted: &Schema) -> Result<()> {
        if self.fields != persisted.fields {
            return Err(HocError::SchemaMismatch(format!(
                "dataset was created with {:?}, but {:?} was supplied",
                persisted.fields, self.fields
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(name: &str, kind: FieldKind) -> Field {
        Field::new(name, kind)
    }

    #[test]
    fn resolves_offsets_and_stride() {
        let schema = Schema::resolve(vec![
            f("timestamp", FieldKind::I64),
            f("usd", FieldKind::F64),
            f("volume", FieldKind::F64),
        ])
        .unwrap();

        assert_eq!(schema.stride(), 24);
        assert_eq!(schema.timestamp_index(), 0);
        assert_eq!(schema.offset_of(0), Some(0));
        assert_eq!(schema.offset_of(1), Some(8));
        assert_eq!(schema.offset_of(2), Some(16));
    }

    #[test]
    fn rejects_missing_timestamp() {
        let err = Schema::resolve(vec![f("usd", FieldKind::F64)]).unwrap_err();
        assert!(matches!(err, HocError::BadSchema(_)));
    }

    #[test]
    fn rejects_wrong_timestamp_kind() {
        let err = Schema::resolve(vec![f("timestamp", FieldKind::F64)]).unwrap_err();
        assert!(matches!(err, HocError::BadSchema(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Schema::resolve(vec![
            f("timestamp", FieldKind::I64),
            f("price", FieldKind::F64),
            f("price", FieldKind::F64),
        ])
        .unwrap_err();
        assert!(matches!(err, HocError::BadSchema(_)));
    }

    #[test]
    fn finds_field_by_name() {
        let schema = Schema::resolve(vec![
            f("timestamp", FieldKind::I64),
            f("event", FieldKind::I64),
        ])
        .unwrap();
        assert_eq!(schema.field_index_of("event"), Some(1));
        assert_eq!(schema.field_index_of("missing"), None);
    }

    #[test]
    fn validates_against_persisted() {
        let a = Schema::resolve(vec![f("timestamp", FieldKind::I64), f("usd", FieldKind::F64)])
            .unwrap();
        let b = Schema::resolve(vec![f("timestamp", FieldKind::I64), f("usd", FieldKind::F64)])
            .unwrap();
        assert!(a.validate_against(&b).is_ok());

        let c = Schema::resolve(vec![f("timestamp", FieldKind::I64), f("usd", FieldKind::I64)])
            .unwrap();
        assert!(matches!(
            a.validate_against(&c),
            Err(HocError::SchemaMismatch(_))
        ));
    }
}
