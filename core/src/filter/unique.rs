use super::compile::{coerce, compile_where};
use super::predicate::Predicate;
use super::WhereInput;
use crate::error::{QuarryError, Result};
use crate::schema::{EntityDef, Schema};
use crate::value::Value;

/// Lookup by a declared unique key, plus optional extra non-unique filters.
#[derive(Debug, Clone, Default)]
pub struct WhereUniqueInput {
    pub fields: Vec<(String, Value)>,
    pub filter: Option<WhereInput>,
}

impl WhereUniqueInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{ field: value }`
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and_field(field, value)
    }

    pub fn and_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// Additional conditions that must hold for the located row.
    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A resolved unique lookup.
#[derive(Debug, Clone)]
pub struct UniqueLookup {
    /// The unique key that identifies the row.
    pub key: &'static [&'static str],
    /// Coerced values for every supplied field, key fields included.
    pub values: Vec<(String, Value)>,
    /// Equality on all supplied fields AND the extra filter.
    pub predicate: Predicate,
}

/// Picks the first declared unique key (primary key first) whose fields are all
/// supplied; remaining fields become plain equality filters.
pub fn resolve_unique(
    schema: &Schema,
    entity: &'static EntityDef,
    input: &WhereUniqueInput,
) -> Result<UniqueLookup> {
    let supplied = |name: &str| input.fields.iter().any(|(f, _)| f == name);
    let key = entity
        .lookup_keys()
        .find(|key| key.iter().all(|f| supplied(f)))
        .ok_or_else(|| {
            let keys = entity
                .lookup_keys()
                .map(|k| format!("`{}`", k.join("`, `")))
                .collect::<Vec<_>>()
                .join(" or ");
            QuarryError::validation(format!(
                "Argument `where` of type {}WhereUniqueInput needs at least one of {keys}",
                entity.name
            ))
        })?;

    let mut values = Vec::with_capacity(input.fields.len());
    let mut parts = Vec::with_capacity(input.fields.len() + 1);
    for (name, value) in &input.fields {
        let field = entity.field_or_err(name)?;
        if value.is_null() {
            return Err(QuarryError::validation(format!(
                "`{}.{name}` cannot be null in a unique lookup",
                entity.name
            )));
        }
        let value = coerce(schema, field.ty, value, name)?;
        parts.push(Predicate::eq(name.clone(), value.clone()));
        values.push((name.clone(), value));
    }
    if let Some(filter) = &input.filter {
        parts.push(compile_where(schema, entity, filter)?);
    }

    Ok(UniqueLookup {
        key,
        values,
        predicate: Predicate::all(parts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::{self, AUTHOR};
    use crate::value::Row;

    #[test]
    fn primary_key_wins_when_both_keys_are_supplied() {
        let schema = fixtures::schema();
        let input = WhereUniqueInput::by("email", "a@x.io").and_field("id", "a1");
        let lookup = resolve_unique(&schema, &AUTHOR, &input).unwrap();
        assert_eq!(lookup.key, &["id"]);
        assert!(lookup.predicate.matches(&Row::new().with("id", "a1").with("email", "a@x.io")));
        assert!(!lookup.predicate.matches(&Row::new().with("id", "a1").with("email", "b@x.io")));
    }

    #[test]
    fn secondary_unique_key_is_accepted() {
        let schema = fixtures::schema();
        let lookup = resolve_unique(&schema, &AUTHOR, &WhereUniqueInput::by("email", "a@x.io")).unwrap();
        assert_eq!(lookup.key, &["email"]);
    }

    #[test]
    fn non_unique_fields_alone_are_rejected() {
        let schema = fixtures::schema();
        let err = resolve_unique(&schema, &AUTHOR, &WhereUniqueInput::by("name", "Ann")).unwrap_err();
        assert!(matches!(err, QuarryError::Validation(ref m) if m.contains("AuthorWhereUniqueInput")));
        assert!(resolve_unique(&schema, &AUTHOR, &WhereUniqueInput::new()).is_err());
    }
}
