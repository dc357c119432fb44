//! Resolution of `select` / `include` / `omit` into a concrete projection.

use hashbrown::HashMap;

use crate::args::{CountSelect, FindManyArgs, IncludeEntry, SelectEntry, Selection};
use crate::error::{QuarryError, Result};
use crate::filter::WhereInput;
use crate::schema::{EntityDef, RelationDef, Schema};

/// Client-level omit configuration: fields hidden from every payload of an
/// entity unless a query re-includes them.
#[derive(Debug, Clone, Default)]
pub struct GlobalOmit {
    by_entity: HashMap<String, Vec<String>>,
}

impl GlobalOmit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, entity: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_entity
            .entry(entity.into())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
    }

    pub fn is_omitted(&self, entity: &str, field: &str) -> bool {
        self.by_entity
            .get(entity)
            .is_some_and(|fields| fields.iter().any(|f| f == field))
    }

    /// Every entry must name a scalar field of a known entity.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for (entity, fields) in &self.by_entity {
            let def = schema.get(entity).ok_or_else(|| {
                QuarryError::validation(format!("omit configured for unknown model `{entity}`"))
            })?;
            for f in fields {
                if def.field(f).is_none() {
                    return Err(QuarryError::validation(format!(
                        "omit configured for unknown field `{entity}.{f}`"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

/// A relation to load alongside the parent rows.
#[derive(Debug, Clone)]
pub struct RelationLoad {
    pub relation: &'static RelationDef,
    /// Window arguments for the related rows; `selection` is already resolved
    /// into `projection`.
    pub args: FindManyArgs,
    pub projection: Projection,
}

impl RelationLoad {
    /// Resolves one relation of `entity`, checking that window arguments are
    /// only used on to-many relations.
    pub fn resolve(
        schema: &Schema,
        entity: &EntityDef,
        rel: &'static RelationDef,
        args: &FindManyArgs,
        global: &GlobalOmit,
    ) -> Result<RelationLoad> {
        if !rel.is_many() && args.has_window() {
            return Err(QuarryError::validation(format!(
                "to-one relation `{}.{}` does not accept where/orderBy/cursor/take/skip/distinct",
                entity.name, rel.name
            )));
        }
        let target = schema.entity(rel.target)?;
        let projection = Projection::resolve(schema, target, &args.selection, global)?;
        let mut window = args.clone();
        window.selection = Selection::default();
        Ok(RelationLoad {
            relation: rel,
            args: window,
            projection,
        })
    }
}

/// A `_count` entry.
#[derive(Debug, Clone)]
pub struct CountLoad {
    pub relation: &'static RelationDef,
    pub filter: Option<WhereInput>,
}

/// The exact shape of a returned record.
#[derive(Debug, Clone)]
pub struct Projection {
    pub entity: &'static EntityDef,
    /// Scalar fields, in schema order.
    pub scalars: Vec<&'static str>,
    pub relations: Vec<RelationLoad>,
    pub counts: Vec<CountLoad>,
}

impl Projection {
    pub fn resolve(
        schema: &Schema,
        entity: &'static EntityDef,
        selection: &Selection,
        global: &GlobalOmit,
    ) -> Result<Self> {
        match (&selection.select, &selection.include, &selection.omit) {
            (Some(_), Some(_), _) => Err(QuarryError::validation(
                "Please either use `include` or `select`, but not both at the same time.",
            )),
            (Some(_), _, Some(_)) => Err(QuarryError::validation(
                "Please either use `omit` or `select`, but not both at the same time.",
            )),
            (Some(select), None, None) => {
                let mut projection = Self::empty(entity);
                let mut picked = Vec::new();
                for (name, entry) in &select.entries {
                    match entry {
                        SelectEntry::Count(count) => {
                            check_count_key(entity, name)?;
                            projection.counts = resolve_counts(entity, count)?;
                        }
                        SelectEntry::Field(keep) => {
                            if let Some(field) = entity.field(name) {
                                if *keep {
                                    picked.push(field.name);
                                }
                            } else if let Some(rel) = entity.relation(name) {
                                if *keep {
                                    projection.relations.push(RelationLoad::resolve(
                                        schema,
                                        entity,
                                        rel,
                                        &FindManyArgs::default(),
                                        global,
                                    )?);
                                }
                            } else {
                                return Err(unknown_member(entity, name, "select"));
                            }
                        }
                        SelectEntry::Relation(args) => {
                            let rel = entity
                                .relation(name)
                                .ok_or_else(|| unknown_member(entity, name, "select"))?;
                            projection
                                .relations
                                .push(RelationLoad::resolve(schema, entity, rel, args, global)?);
                        }
                    }
                }
                if picked.is_empty() && projection.relations.is_empty() && projection.counts.is_empty() {
                    return Err(QuarryError::validation(format!(
                        "The `select` statement for type {} must not be empty.",
                        entity.name
                    )));
                }
                projection.scalars = entity
                    .field_names()
                    .filter(|f| picked.contains(f))
                    .collect();
                Ok(projection)
            }
            (None, include, omit) => {
                let mut local_omit: Vec<(&str, bool)> = Vec::new();
                if let Some(omit) = omit {
                    for (name, hide) in &omit.entries {
                        if entity.field(name).is_none() {
                            return Err(unknown_member(entity, name, "omit"));
                        }
                        local_omit.push((name.as_str(), *hide));
                    }
                }
                let mut projection = Self::empty(entity);
                projection.scalars = entity
                    .field_names()
                    .filter(|f| {
                        match local_omit.iter().rev().find(|(name, _)| name == f) {
                            Some((_, hide)) => !hide,
                            None => !global.is_omitted(entity.name, f),
                        }
                    })
                    .collect();

                if let Some(include) = include {
                    for (name, entry) in &include.entries {
                        match entry {
                            IncludeEntry::Count(count) => {
                                check_count_key(entity, name)?;
                                projection.counts = resolve_counts(entity, count)?;
                            }
                            IncludeEntry::Skip => {
                                if !entity.has_member(name) {
                                    return Err(unknown_member(entity, name, "include"));
                                }
                            }
                            IncludeEntry::Relation(args) => {
                                let Some(rel) = entity.relation(name) else {
                                    return Err(if entity.field(name).is_some() {
                                        QuarryError::validation(format!(
                                            "Invalid scalar field `{name}` for include statement on model {}",
                                            entity.name
                                        ))
                                    } else {
                                        unknown_member(entity, name, "include")
                                    });
                                };
                                projection
                                    .relations
                                    .push(RelationLoad::resolve(schema, entity, rel, args, global)?);
                            }
                        }
                    }
                }
                Ok(projection)
            }
        }
    }

    /// The default shape: every scalar not globally omitted, no relations.
    pub fn scalars_only(entity: &'static EntityDef, global: &GlobalOmit) -> Self {
        Self {
            entity,
            scalars: entity
                .field_names()
                .filter(|f| !global.is_omitted(entity.name, f))
                .collect(),
            relations: Vec::new(),
            counts: Vec::new(),
        }
    }

    fn empty(entity: &'static EntityDef) -> Self {
        Self {
            entity,
            scalars: Vec::new(),
            relations: Vec::new(),
            counts: Vec::new(),
        }
    }

    /// Columns the store must return so that scalars, relation joins and
    /// counts can all be produced.
    pub fn fetch_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self.scalars.iter().map(|s| (*s).to_owned()).collect();
        let mut need = |c: &str| {
            if !cols.iter().any(|x| x == c) {
                cols.push(c.to_owned());
            }
        };
        need(self.entity.primary_key);
        for load in &self.relations {
            load.relation.local_fields().for_each(&mut need);
        }
        for count in &self.counts {
            count.relation.local_fields().for_each(&mut need);
        }
        cols
    }
}


fn resolve_counts(entity: &EntityDef, count: &CountSelect) -> Result<Vec<CountLoad>> {
    match &count.relations {
        None => Ok(entity
            .relations
            .iter()
            .filter(|r| r.is_many())
            .map(|relation| CountLoad {
                relation,
                filter: None,
            })
            .collect()),
        Some(list) => list
            .iter()
            .map(|(name, filter)| {
                let relation = entity.relation_or_err(name)?;
                if !relation.is_many() {
                    return Err(QuarryError::validation(format!(
                        "`_count` is only available on to-many relations, `{}.{name}` is to-one",
                        entity.name
                    )));
                }
                Ok(CountLoad {
                    relation,
                    filter: filter.clone(),
                })
            })
            .collect(),
    }
}

fn check_count_key(entity: &EntityDef, name: &str) -> Result<()> {
    if name == "_count" {
        Ok(())
    } else {
        Err(unknown_member(entity, name, "_count"))
    }
}

fn unknown_member(entity: &EntityDef, name: &str, clause: &str) -> QuarryError {
    QuarryError::validation(format!(
        "Unknown field `{name}` for {clause} statement on model `{}`. Available options: {}",
        entity.name,
        entity
            .field_names()
            .chain(entity.relations.iter().map(|r| r.name))
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Include, Omit, Select};
    use crate::schema::fixtures::{self, AUTHOR, POST};

    fn omit_email() -> GlobalOmit {
        let mut g = GlobalOmit::new();
        g.insert("Author", ["email"]);
        g
    }

    #[test]
    fn select_and_include_together_is_rejected() {
        let schema = fixtures::schema();
        let selection = Selection {
            select: Some(Select::new().field("id")),
            include: Some(Include::new().relation("posts")),
            omit: None,
        };
        let err = Projection::resolve(&schema, &AUTHOR, &selection, &GlobalOmit::new()).unwrap_err();
        assert!(matches!(err, QuarryError::Validation(_)));
    }

    #[test]
    fn global_omit_applies_unless_overridden() {
        let schema = fixtures::schema();
        let global = omit_email();

        let default = Projection::resolve(&schema, &AUTHOR, &Selection::default(), &global).unwrap();
        assert!(!default.scalars.contains(&"email"));

        let kept = Selection {
            omit: Some(Omit::new().keep("email")),
            ..Selection::default()
        };
        let p = Projection::resolve(&schema, &AUTHOR, &kept, &global).unwrap();
        assert!(p.scalars.contains(&"email"));

        let selected = Selection {
            select: Some(Select::new().field("email")),
            ..Selection::default()
        };
        let p = Projection::resolve(&schema, &AUTHOR, &selected, &global).unwrap();
        assert_eq!(p.scalars, vec!["email"]);
    }

    #[test]
    fn include_adds_relations_and_counts() {
        let schema = fixtures::schema();
        let selection = Selection {
            include: Some(Include::new().relation("posts").count(CountSelect::all())),
            ..Selection::default()
        };
        let p = Projection::resolve(&schema, &AUTHOR, &selection, &GlobalOmit::new()).unwrap();
        assert_eq!(p.scalars.len(), AUTHOR.fields.len());
        assert_eq!(p.relations[0].relation.name, "posts");
        assert_eq!(p.counts.len(), 1);
    }

    #[test]
    fn to_one_relation_rejects_window_args_and_counts() {
        let schema = fixtures::schema();
        let selection = Selection {
            include: Some(Include::new().relation_with("author", FindManyArgs::new().take(1))),
            ..Selection::default()
        };
        assert!(Projection::resolve(&schema, &POST, &selection, &GlobalOmit::new()).is_err());

        let count = Selection {
            include: Some(Include::new().count(CountSelect::all().relation("author"))),
            ..Selection::default()
        };
        assert!(Projection::resolve(&schema, &POST, &count, &GlobalOmit::new()).is_err());
    }

    #[test]
    fn fetch_columns_include_join_keys() {
        let schema = fixtures::schema();
        let selection = Selection {
            select: Some(Select::new().field("title").field("author")),
            ..Selection::default()
        };
        let p = Projection::resolve(&schema, &POST, &selection, &GlobalOmit::new()).unwrap();
        assert_eq!(p.fetch_columns(), vec!["title", "id", "authorId"]);
    }
}
