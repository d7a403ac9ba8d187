//! Required-field validation

use shared::{MessageKey, ValidateErrors};

use crate::db::{EntityFields, ResourceDef};

/// Field → message code for every missing required field.
///
/// Every localized name is required, and so is the parent id of a parented
/// resource (absent or `0` counts as missing).
pub fn missing_fields(def: &ResourceDef, fields: &EntityFields) -> ValidateErrors {
    let mut errors = ValidateErrors::new();

    for (column, name) in def.name_columns.iter().zip(&fields.names) {
        if name.trim().is_empty() {
            errors.insert((*column).to_string(), MessageKey::Require.code());
        }
    }
    if let Some(column) = def.parent_column()
        && fields.parent_id.unwrap_or(0) == 0
    {
        errors.insert(column.to_string(), MessageKey::Require.code());
    }

    errors
}

/// Errors of the first invalid item, if any
pub fn first_invalid<'a>(
    def: &ResourceDef,
    items: impl IntoIterator<Item = &'a EntityFields>,
) -> Option<ValidateErrors> {
    items
        .into_iter()
        .map(|fields| missing_fields(def, fields))
        .find(|errors| !errors.is_empty())
}
