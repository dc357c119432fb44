//! Schema registry: static per-entity metadata produced by codegen.
//!
//! Entities, fields, relations and enum domains are `'static` descriptors. A
//! [`Schema`] indexes them by name and is validated once at construction;
//! everything downstream reads it without further checks.

use hashbrown::HashMap;

use crate::error::{QuarryError, Result};
use crate::value::Value;

// =============================================================================
// Fields
// =============================================================================

/// Scalar column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Json,
    /// Closed enum domain, by registered enum name.
    Enum(&'static str),
}

impl ScalarType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    /// Types usable in `lt/gt` comparisons, `_min/_max` and ordering.
    pub fn is_orderable(self) -> bool {
        !matches!(self, ScalarType::Json)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::DateTime => "DateTime",
            ScalarType::Json => "Json",
            ScalarType::Enum(name) => name,
        }
    }
}

/// Value assigned to a field when a create omits it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// A fresh v4 UUID rendered as a string.
    Uuid,
    /// The current UTC timestamp.
    Now,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    Enum(&'static str),
}

impl DefaultValue {
    pub fn generate(self) -> Value {
        match self {
            DefaultValue::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            DefaultValue::Now => Value::DateTime(chrono::Utc::now()),
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(i) => Value::Int(i),
            DefaultValue::Float(f) => Value::Float(f),
            DefaultValue::Str(s) => Value::String(s.to_owned()),
            DefaultValue::Enum(tag) => Value::Enum(tag.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: ScalarType,
    pub optional: bool,
    pub default: Option<DefaultValue>,
    /// Refreshed to the current time on every update.
    pub updated_at: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, ty: ScalarType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            default: None,
            updated_at: false,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub const fn default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// `@updatedAt`: defaults to now on create, refreshed on update.
    pub const fn updated_at(mut self) -> Self {
        self.updated_at = true;
        self.default = Some(DefaultValue::Now);
        self
    }

    /// Must be supplied by the caller on create.
    pub fn is_required_on_create(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

// =============================================================================
// Relations
// =============================================================================

/// Cardinality of a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelCardinality {
    /// `Vec<T>`
    Many,
    /// `T`, backed by a required foreign key
    One,
    /// `Option<T>`
    OptionalOne,
}

/// What the store does to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    pub target: &'static str,
    pub cardinality: RelCardinality,
    /// Join pairs `(local, remote)`: `self.local = target.remote`.
    pub fk_columns: &'static [(&'static str, &'static str)],
    /// True when the local side holds the foreign key.
    pub owns_fk: bool,
    /// Meaningful on the owning side only.
    pub on_delete: ReferentialAction,
}

impl RelationDef {
    /// Owning to-one relation; `fk_columns` are `(local fk, target key)`.
    pub const fn to_one(
        name: &'static str,
        target: &'static str,
        fk_columns: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            target,
            cardinality: RelCardinality::One,
            fk_columns,
            owns_fk: true,
            on_delete: ReferentialAction::Restrict,
        }
    }

    /// Back-relation to many rows; `fk_columns` are `(local key, target fk)`.
    pub const fn to_many(
        name: &'static str,
        target: &'static str,
        fk_columns: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            target,
            cardinality: RelCardinality::Many,
            fk_columns,
            owns_fk: false,
            on_delete: ReferentialAction::Restrict,
        }
    }

    /// Back-relation to at most one row (inverse side of a one-to-one).
    pub const fn back_one(
        name: &'static str,
        target: &'static str,
        fk_columns: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            target,
            cardinality: RelCardinality::OptionalOne,
            fk_columns,
            owns_fk: false,
            on_delete: ReferentialAction::Restrict,
        }
    }

    /// Marks an owning to-one relation as optional (nullable foreign key).
    /// Optional relations default to `SetNull` on delete.
    pub const fn optional(mut self) -> Self {
        self.cardinality = RelCardinality::OptionalOne;
        self.on_delete = ReferentialAction::SetNull;
        self
    }

    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn is_many(&self) -> bool {
        self.cardinality == RelCardinality::Many
    }

    pub fn local_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fk_columns.iter().map(|(l, _)| *l)
    }

    pub fn remote_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fk_columns.iter().map(|(_, r)| *r)
    }
}

// =============================================================================
// Entities & enums
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct UniqueKey {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

#[derive(Debug)]
pub struct EntityDef {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
    pub primary_key: &'static str,
    /// Declared unique keys other than the primary key.
    pub unique_keys: &'static [UniqueKey],
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.field(name).is_some() || self.relation(name).is_some()
    }

    /// All unique lookup keys, primary key first.
    pub fn lookup_keys(&self) -> impl Iterator<Item = &[&'static str]> + '_ {
        let pk: &[&'static str] = core::slice::from_ref(&self.primary_key);
        core::iter::once(pk).chain(self.unique_keys.iter().map(|k| k.fields))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn field_or_err(&self, name: &str) -> Result<&'static FieldDef> {
        self.field(name).ok_or_else(|| {
            QuarryError::validation(format!(
                "Unknown field `{name}` for model `{}`",
                self.name
            ))
        })
    }

    pub fn relation_or_err(&self, name: &str) -> Result<&'static RelationDef> {
        self.relation(name).ok_or_else(|| {
            QuarryError::validation(format!(
                "Unknown relation `{name}` for model `{}`",
                self.name
            ))
        })
    }
}

/// A closed set of string tags.
#[derive(Debug)]
pub struct EnumDef {
    pub name: &'static str,
    pub values: &'static [&'static str],
}

impl EnumDef {
    pub fn contains(&self, tag: &str) -> bool {
        self.values.contains(&tag)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Index of an entity inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(usize);

/// Validated, name-indexed entity and enum metadata.
#[derive(Debug)]
pub struct Schema {
    entities: Vec<&'static EntityDef>,
    enums: Vec<&'static EnumDef>,
    by_name: HashMap<&'static str, EntityId>,
}

impl Schema {
    /// Builds the registry and checks that it is internally consistent.
    pub fn new(entities: &[&'static EntityDef], enums: &[&'static EnumDef]) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(entities.len());
        for (i, e) in entities.iter().enumerate() {
            if by_name.insert(e.name, EntityId(i)).is_some() {
                return Err(init_err(format!("duplicate model `{}`", e.name)));
            }
        }
        let schema = Self {
            entities: entities.to_vec(),
            enums: enums.to_vec(),
            by_name,
        };
        for entity in &schema.entities {
            schema.check_entity(entity)?;
        }
        Ok(schema)
    }

    fn check_entity(&self, entity: &EntityDef) -> Result<()> {
        if entity.field(entity.primary_key).is_none() {
            return Err(init_err(format!(
                "model `{}` has no primary key field `{}`",
                entity.name, entity.primary_key
            )));
        }
        for field in entity.fields {
            if let ScalarType::Enum(name) = field.ty {
                let domain = self
                    .enum_def(name)
                    .ok_or_else(|| init_err(format!("unknown enum `{name}` on `{}.{}`", entity.name, field.name)))?;
                if let Some(DefaultValue::Enum(tag)) = field.default {
                    if !domain.contains(tag) {
                        return Err(init_err(format!(
                            "default `{tag}` is not a member of `{name}`"
                        )));
                    }
                }
            }
        }
        for key in entity.unique_keys {
            for f in key.fields {
                if entity.field(f).is_none() {
                    return Err(init_err(format!(
                        "unique key `{}` names unknown field `{f}`",
                        key.name
                    )));
                }
            }
        }
        for rel in entity.relations {
            let target = self
                .get(rel.target)
                .ok_or_else(|| init_err(format!("relation `{}.{}` targets unknown model `{}`", entity.name, rel.name, rel.target)))?;
            if rel.fk_columns.is_empty() {
                return Err(init_err(format!(
                    "relation `{}.{}` has no join columns",
                    entity.name, rel.name
                )));
            }
            for (local, remote) in rel.fk_columns {
                if entity.field(local).is_none() || target.field(remote).is_none() {
                    return Err(init_err(format!(
                        "relation `{}.{}` joins unknown fields ({local}, {remote})",
                        entity.name, rel.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&'static EntityDef> {
        self.by_name.get(name).map(|id| self.entities[id.0])
    }

    /// Looks up an entity, failing with a validation error for unknown names.
    pub fn entity(&self, name: &str) -> Result<&'static EntityDef> {
        self.get(name)
            .ok_or_else(|| QuarryError::validation(format!("Unknown model `{name}`")))
    }

    pub fn id_of(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    pub fn by_id(&self, id: EntityId) -> &'static EntityDef {
        self.entities[id.0]
    }

    pub fn enum_def(&self, name: &str) -> Option<&'static EnumDef> {
        self.enums.iter().copied().find(|e| e.name == name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &'static EntityDef> + '_ {
        self.entities.iter().copied()
    }

    /// Owning relations (on any entity) whose foreign key points at `target`.
    pub fn referencing<'s>(
        &'s self,
        target: &'s str,
    ) -> impl Iterator<Item = (&'static EntityDef, &'static RelationDef)> + 's {
        self.entities.iter().flat_map(move |e| {
            e.relations
                .iter()
                .filter(move |r| r.owns_fk && r.target == target)
                .map(move |r| (*e, r))
        })
    }
}

/// A generated model type with static metadata.
///
/// Implemented by the schema crate for each entity so that clients can be
/// addressed as `client.entity::<User>()` and payloads decoded into `Self`.
pub trait Entity: serde::de::DeserializeOwned + Send + 'static {
    const NAME: &'static str;

    fn def() -> &'static EntityDef;
}

fn init_err(msg: String) -> QuarryError {
    QuarryError::Initialization(format!("invalid schema: {msg}"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A small blog-shaped schema for unit tests.
    use super::*;

    pub static STATUS: EnumDef = EnumDef {
        name: "Status",
        values: &["DRAFT", "PUBLISHED"],
    };

    pub static AUTHOR: EntityDef = EntityDef {
        name: "Author",
        fields: &[
            FieldDef::new("id", ScalarType::String).default(DefaultValue::Uuid),
            FieldDef::new("email", ScalarType::String),
            FieldDef::new("name", ScalarType::String).optional(),
            FieldDef::new("age", ScalarType::Int).optional(),
        ],
        relations: &[RelationDef::to_many("posts", "Post", &[("id", "authorId")])],
        primary_key: "id",
        unique_keys: &[UniqueKey {
            name: "email",
            fields: &["email"],
        }],
    };

    pub static POST: EntityDef = EntityDef {
        name: "Post",
        fields: &[
            FieldDef::new("id", ScalarType::String).default(DefaultValue::Uuid),
            FieldDef::new("title", ScalarType::String),
            FieldDef::new("status", ScalarType::Enum("Status")).default(DefaultValue::Enum("DRAFT")),
            FieldDef::new("score", ScalarType::Float).optional(),
            FieldDef::new("meta", ScalarType::Json).optional(),
            FieldDef::new("authorId", ScalarType::String).optional(),
        ],
        relations: &[RelationDef::to_one("author", "Author", &[("authorId", "id")]).optional()],
        primary_key: "id",
        unique_keys: &[],
    };

    pub fn schema() -> Schema {
        Schema::new(&[&AUTHOR, &POST], &[&STATUS]).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn lookup_keys_start_with_primary_key() {
        let keys: Vec<_> = AUTHOR.lookup_keys().collect();
        assert_eq!(keys, vec![&["id"][..], &["email"][..]]);
    }

    #[test]
    fn referencing_finds_owning_side() {
        let schema = schema();
        let refs: Vec<_> = schema
            .referencing("Author")
            .map(|(e, r)| (e.name, r.name))
            .collect();
        assert_eq!(refs, vec![("Post", "author")]);
    }

    #[test]
    fn unknown_relation_target_is_rejected() {
        static BROKEN: EntityDef = EntityDef {
            name: "Broken",
            fields: &[FieldDef::new("id", ScalarType::String)],
            relations: &[RelationDef::to_many("ghosts", "Ghost", &[("id", "brokenId")])],
            primary_key: "id",
            unique_keys: &[],
        };
        let err = Schema::new(&[&BROKEN], &[]).unwrap_err();
        assert!(matches!(err, QuarryError::Initialization(_)));
    }

    #[test]
    fn unknown_model_is_a_validation_error() {
        let err = schema().entity("Comment").unwrap_err();
        assert!(matches!(err, QuarryError::Validation(_)));
    }
}
