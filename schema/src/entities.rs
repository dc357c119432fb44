//! Entity descriptors for the monitoring schema.

use quarry_core::schema::{
    DefaultValue, EntityDef, FieldDef, ReferentialAction, RelationDef, ScalarType, UniqueKey,
};

const fn id() -> FieldDef {
    FieldDef::new("id", ScalarType::String).default(DefaultValue::Uuid)
}

const fn created_at() -> FieldDef {
    FieldDef::new("createdAt", ScalarType::DateTime).default(DefaultValue::Now)
}

const fn updated_at() -> FieldDef {
    FieldDef::new("updatedAt", ScalarType::DateTime).updated_at()
}

const fn timestamp() -> FieldDef {
    FieldDef::new("timestamp", ScalarType::DateTime).default(DefaultValue::Now)
}

pub static USER: EntityDef = EntityDef {
    name: "User",
    fields: &[
        id(),
        FieldDef::new("email", ScalarType::String),
        FieldDef::new("name", ScalarType::String).optional(),
        FieldDef::new("password", ScalarType::String).optional(),
        FieldDef::new("role", ScalarType::Enum("Role")).default(DefaultValue::Enum("USER")),
        FieldDef::new("image", ScalarType::String).optional(),
        FieldDef::new("lastLogin", ScalarType::DateTime).optional(),
        created_at(),
        updated_at(),
    ],
    relations: &[
        RelationDef::to_many("sessions", "Session", &[("id", "userId")]),
        RelationDef::to_many("alerts", "Alert", &[("id", "userId")]),
        RelationDef::to_many("notifications", "Notification", &[("id", "userId")]),
    ],
    primary_key: "id",
    unique_keys: &[UniqueKey {
        name: "User_email_key",
        fields: &["email"],
    }],
};

pub static SESSION: EntityDef = EntityDef {
    name: "Session",
    fields: &[
        id(),
        FieldDef::new("token", ScalarType::String),
        FieldDef::new("userId", ScalarType::String),
        FieldDef::new("expiresAt", ScalarType::DateTime),
        created_at(),
    ],
    relations: &[RelationDef::to_one("user", "User", &[("userId", "id")])
        .on_delete(ReferentialAction::Cascade)],
    primary_key: "id",
    unique_keys: &[UniqueKey {
        name: "Session_token_key",
        fields: &["token"],
    }],
};

pub static COMPONENT: EntityDef = EntityDef {
    name: "Component",
    fields: &[
        id(),
        FieldDef::new("name", ScalarType::String),
        FieldDef::new("type", ScalarType::Enum("ComponentType")),
        FieldDef::new("status", ScalarType::Enum("Status")).default(DefaultValue::Enum("UNKNOWN")),
        FieldDef::new("health", ScalarType::Float).default(DefaultValue::Float(100.0)),
        FieldDef::new("responseTime", ScalarType::Int).optional(),
        FieldDef::new("lastCheck", ScalarType::DateTime).default(DefaultValue::Now),
        created_at(),
        updated_at(),
    ],
    relations: &[
        RelationDef::to_many("metrics", "Metric", &[("id", "componentId")]),
        RelationDef::to_many("alerts", "Alert", &[("id", "componentId")]),
    ],
    primary_key: "id",
    unique_keys: &[],
};

pub static METRIC: EntityDef = EntityDef {
    name: "Metric",
    fields: &[
        id(),
        FieldDef::new("componentId", ScalarType::String),
        FieldDef::new("name", ScalarType::String),
        FieldDef::new("value", ScalarType::Float),
        FieldDef::new("unit", ScalarType::String).optional(),
        timestamp(),
        FieldDef::new("metadata", ScalarType::Json).optional(),
    ],
    relations: &[RelationDef::to_one("component", "Component", &[("componentId", "id")])
        .on_delete(ReferentialAction::Cascade)],
    primary_key: "id",
    unique_keys: &[],
};

pub static ALERT: EntityDef = EntityDef {
    name: "Alert",
    fields: &[
        id(),
        FieldDef::new("componentId", ScalarType::String),
        FieldDef::new("userId", ScalarType::String).optional(),
        FieldDef::new("type", ScalarType::Enum("AlertType")),
        FieldDef::new("severity", ScalarType::Enum("Severity")).default(DefaultValue::Enum("MEDIUM")),
        FieldDef::new("status", ScalarType::Enum("AlertStatus")).default(DefaultValue::Enum("ACTIVE")),
        FieldDef::new("message", ScalarType::String),
        created_at(),
        FieldDef::new("resolvedAt", ScalarType::DateTime).optional(),
    ],
    relations: &[
        RelationDef::to_one("component", "Component", &[("componentId", "id")])
            .on_delete(ReferentialAction::Cascade),
        RelationDef::to_one("user", "User", &[("userId", "id")]).optional(),
    ],
    primary_key: "id",
    unique_keys: &[],
};

pub static NOTIFICATION: EntityDef = EntityDef {
    name: "Notification",
    fields: &[
        id(),
        FieldDef::new("userId", ScalarType::String),
        FieldDef::new("type", ScalarType::Enum("NotificationType")),
        FieldDef::new("title", ScalarType::String),
        FieldDef::new("message", ScalarType::String),
        FieldDef::new("read", ScalarType::Boolean).default(DefaultValue::Bool(false)),
        created_at(),
    ],
    relations: &[RelationDef::to_one("user", "User", &[("userId", "id")])
        .on_delete(ReferentialAction::Cascade)],
    primary_key: "id",
    unique_keys: &[],
};

pub static LOG: EntityDef = EntityDef {
    name: "Log",
    fields: &[
        id(),
        FieldDef::new("level", ScalarType::String),
        FieldDef::new("message", ScalarType::String),
        FieldDef::new("source", ScalarType::String).optional(),
        FieldDef::new("userId", ScalarType::String).optional(),
        timestamp(),
    ],
    relations: &[],
    primary_key: "id",
    unique_keys: &[],
};

pub static SETTING: EntityDef = EntityDef {
    name: "Setting",
    fields: &[
        id(),
        FieldDef::new("key", ScalarType::String),
        FieldDef::new("value", ScalarType::String),
        FieldDef::new("description", ScalarType::String).optional(),
        created_at(),
        updated_at(),
    ],
    relations: &[],
    primary_key: "id",
    unique_keys: &[UniqueKey {
        name: "Setting_key_key",
        fields: &["key"],
    }],
};

pub static HELP_DOC: EntityDef = EntityDef {
    name: "HelpDoc",
    fields: &[
        id(),
        FieldDef::new("title", ScalarType::String),
        FieldDef::new("content", ScalarType::String),
        FieldDef::new("category", ScalarType::String).optional(),
        created_at(),
        updated_at(),
    ],
    relations: &[],
    primary_key: "id",
    unique_keys: &[],
};

pub static SYSTEM_HEALTH: EntityDef = EntityDef {
    name: "SystemHealth",
    fields: &[
        id(),
        FieldDef::new("status", ScalarType::Enum("Status")),
        FieldDef::new("healthPercentage", ScalarType::Float),
        FieldDef::new("cpuUsage", ScalarType::Float).optional(),
        FieldDef::new("memoryUsage", ScalarType::Float).optional(),
        FieldDef::new("diskUsage", ScalarType::Float).optional(),
        FieldDef::new("metadata", ScalarType::Json).optional(),
        timestamp(),
    ],
    relations: &[],
    primary_key: "id",
    unique_keys: &[],
};

pub static SYSTEM_EVENT: EntityDef = EntityDef {
    name: "SystemEvent",
    fields: &[
        id(),
        FieldDef::new("type", ScalarType::String),
        FieldDef::new("description", ScalarType::String),
        FieldDef::new("severity", ScalarType::Enum("Severity")),
        FieldDef::new("incidentId", ScalarType::String).optional(),
        timestamp(),
    ],
    relations: &[RelationDef::to_one("incident", "Incident", &[("incidentId", "id")]).optional()],
    primary_key: "id",
    unique_keys: &[],
};

pub static SYSTEM_UPTIME: EntityDef = EntityDef {
    name: "SystemUptime",
    fields: &[
        id(),
        FieldDef::new("status", ScalarType::String),
        FieldDef::new("duration", ScalarType::Int),
        timestamp(),
    ],
    relations: &[],
    primary_key: "id",
    unique_keys: &[],
};

pub static INCIDENT: EntityDef = EntityDef {
    name: "Incident",
    fields: &[
        id(),
        FieldDef::new("title", ScalarType::String),
        FieldDef::new("description", ScalarType::String).optional(),
        FieldDef::new("status", ScalarType::String),
        FieldDef::new("severity", ScalarType::Enum("Severity")),
        created_at(),
        FieldDef::new("resolvedAt", ScalarType::DateTime).optional(),
    ],
    relations: &[RelationDef::to_many("events", "SystemEvent", &[("id", "incidentId")])],
    primary_key: "id",
    unique_keys: &[],
};

pub static ALL: [&EntityDef; 13] = [
    &USER,
    &SESSION,
    &COMPONENT,
    &METRIC,
    &ALERT,
    &NOTIFICATION,
    &LOG,
    &SETTING,
    &HELP_DOC,
    &SYSTEM_HEALTH,
    &SYSTEM_EVENT,
    &SYSTEM_UPTIME,
    &INCIDENT,
];
