use thiserror::Error;

/// Raised when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum whose wire and storage form is a fixed string.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` and string-based serde impls,
/// so the same spelling is used in JSON bodies, query strings and TEXT columns.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub mod application;
pub mod job;
pub mod user;

#[cfg(test)]
mod tests {
    use super::job::JobCategory;
    use super::user::Role;

    #[test]
    fn test_text_enum_parses_wire_spelling() {
        assert_eq!("customer-service".parse::<JobCategory>().unwrap(), JobCategory::CustomerService);
        assert_eq!(Role::Business.as_str(), "business");
    }

    #[test]
    fn test_text_enum_rejects_unknown_value() {
        let err = "admin".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "Role");
        assert_eq!(err.value, "admin");
    }

    #[test]
    fn test_text_enum_serde_uses_same_spelling() {
        let json = serde_json::to_string(&JobCategory::FoodService).unwrap();
        assert_eq!(json, "\"food-service\"");
        let back: JobCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JobCategory::FoodService);
        assert!(serde_json::from_str::<JobCategory>("\"gardening\"").is_err());
    }
}
