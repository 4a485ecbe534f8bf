use crate::db::StoreError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The wire name doubles as the serde name so JSON and SQLite agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Pillar {
    Vision => "vision",
    Execution => "execution",
    People => "people",
    Resilience => "resilience",
});

str_enum!(Role {
    Founder => "founder",
    Executive => "executive",
    Manager => "manager",
});

str_enum!(GenerationSource {
    Ai => "ai",
    RetryFallback => "retry-fallback",
    Fallback => "fallback",
    Unknown => "unknown",
});

str_enum!(FailureReason {
    Timeout => "timeout",
    PolicyViolation => "policy_violation",
    ParseError => "parse_error",
    ApiError => "api_error",
});

impl Pillar {
    pub const ALL: [Pillar; 4] = [
        Pillar::Vision,
        Pillar::Execution,
        Pillar::People,
        Pillar::Resilience,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn generation_source_uses_kebab_wire_names() {
        let json = serde_json::to_string(&GenerationSource::RetryFallback).unwrap();
        assert_eq!(json, "\"retry-fallback\"");
        assert_eq!(GenerationSource::Ai.as_str(), "ai");
    }

    #[test]
    fn failure_reason_uses_snake_wire_names() {
        let json = serde_json::to_string(&FailureReason::PolicyViolation).unwrap();
        assert_eq!(json, "\"policy_violation\"");
        let back: FailureReason = serde_json::from_str("\"api_error\"").unwrap();
        assert_eq!(back, FailureReason::ApiError);
    }

    #[test]
    fn role_round_trips_through_from_str() {
        for role in [Role::Founder, Role::Executive, Role::Manager] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_pillar_is_rejected() {
        let err = Pillar::from_str("finance").unwrap_err();
        assert!(err.to_string().contains("finance"));
    }
}
