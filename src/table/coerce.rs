//! Null-tolerant numeric coercion.
//!
//! Casts are non-strict: text that is not a number becomes null instead of
//! failing the query, the same as a null marker.

use polars::prelude::*;

/// IMDb's null marker.
pub const NULL_MARKER: &str = "\\N";

/// Decimal view of a text column.
pub fn to_float(name: &str) -> Expr {
    col(name).cast(DataType::Float64)
}

/// Integer view of a text column. Fractional values are truncated toward
/// zero (`"90.5"` → 90); non-numeric text is null.
pub fn to_int(name: &str) -> Expr {
    to_float(name).cast(DataType::Int64)
}

/// Null where `expr` is the empty string. The result needs an alias.
pub fn null_if_empty(expr: Expr) -> Expr {
    when(expr.clone().eq(lit("")))
        .then(lit(NULL).cast(DataType::String))
        .otherwise(expr)
}
