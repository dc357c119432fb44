//! Closed enum domains.

use quarry_core::{EnumDef, Value};
use serde::{Deserialize, Serialize};

/// Declares a schema enum: the Rust type, its tags, and the registry entry
/// (`Role` -> `ROLE`).
macro_rules! schema_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $tag:literal),* $(,)? }) => {
        paste::paste! {
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            pub enum $name {
                $(
                    #[serde(rename = $tag)]
                    $variant,
                )*
            }

            impl $name {
                pub const VALUES: &'static [&'static str] = &[$($tag),*];

                pub fn as_str(self) -> &'static str {
                    match self {
                        $($name::$variant => $tag,)*
                    }
                }
            }

            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl From<$name> for Value {
                fn from(v: $name) -> Self {
                    Value::Enum(v.as_str().to_owned())
                }
            }

            pub static [<$name:snake:upper>]: EnumDef = EnumDef {
                name: stringify!($name),
                values: $name::VALUES,
            };
        }
    };
}

schema_enum! {
    Role {
        User => "USER",
        Admin => "ADMIN",
        SuperAdmin => "SUPER_ADMIN",
    }
}

schema_enum! {
    ComponentType {
        Database => "DATABASE",
        ApiServer => "API_SERVER",
        CacheLayer => "CACHE_LAYER",
        LoadBalancer => "LOAD_BALANCER",
        QueueSystem => "QUEUE_SYSTEM",
        StorageSystem => "STORAGE_SYSTEM",
        Custom => "CUSTOM",
    }
}

schema_enum! {
    /// Health classification shared by components and system snapshots.
    Status {
        Healthy => "HEALTHY",
        Warning => "WARNING",
        Critical => "CRITICAL",
        Unknown => "UNKNOWN",
    }
}

schema_enum! {
    AlertType {
        Error => "ERROR",
        Warning => "WARNING",
        Info => "INFO",
        Success => "SUCCESS",
    }
}

schema_enum! {
    Severity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

schema_enum! {
    AlertStatus {
        Active => "ACTIVE",
        Acknowledged => "ACKNOWLEDGED",
        Resolved => "RESOLVED",
    }
}

schema_enum! {
    NotificationType {
        Alert => "ALERT",
        System => "SYSTEM",
        Update => "UPDATE",
        Maintenance => "MAINTENANCE",
    }
}

pub static ALL: [&EnumDef; 7] = [
    &ROLE,
    &COMPONENT_TYPE,
    &STATUS,
    &ALERT_TYPE,
    &SEVERITY,
    &ALERT_STATUS,
    &NOTIFICATION_TYPE,
];
