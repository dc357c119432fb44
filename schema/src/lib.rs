//! Monitoring-dashboard schema: 13 entities and 7 enums, in the shape a
//! schema compiler emits for quarry.

pub mod entities;
pub mod enums;
pub mod models;

pub use enums::{
    AlertStatus, AlertType, ComponentType, NotificationType, Role, Severity, Status,
};
pub use models::{
    Alert, Component, HelpDoc, Incident, Log, Metric, Notification, Session, Setting,
    SystemEvent, SystemHealth, SystemUptime, User,
};

use quarry_core::{Result, Schema};

/// The validated registry for every entity and enum in this crate.
pub fn schema() -> Result<Schema> {
    Schema::new(&entities::ALL, &enums::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Entity;

    #[test]
    fn schema_is_consistent() {
        let schema = schema().unwrap();
        assert_eq!(schema.entities().count(), 13);
        assert_eq!(schema.entity(Component::NAME).unwrap().name, "Component");
        assert_eq!(
            schema.enum_def("ComponentType").unwrap().values,
            ComponentType::VALUES
        );
    }

    #[test]
    fn deleting_a_component_cascades_to_metrics_and_alerts() {
        let schema = schema().unwrap();
        let mut referencing: Vec<_> = schema
            .referencing("Component")
            .map(|(e, r)| (e.name, r.on_delete))
            .collect();
        referencing.sort_by_key(|(name, _)| *name);
        assert_eq!(
            referencing,
            vec![
                ("Alert", quarry_core::ReferentialAction::Cascade),
                ("Metric", quarry_core::ReferentialAction::Cascade),
            ]
        );
    }

    #[test]
    fn enums_serialize_as_tags() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"SUPER_ADMIN\"");
        assert_eq!(
            quarry_core::Value::from(Severity::High),
            quarry_core::Value::Enum("HIGH".into())
        );
    }
}
