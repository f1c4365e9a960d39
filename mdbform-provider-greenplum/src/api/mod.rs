//! Managed Greenplum API model (`greenplum/v1`)
//!
//! Typed mirror of the service's messages as the REST gateway encodes them:
//! camelCase keys, int64 and `Int64Value` wrappers as decimal strings, enums
//! by name, oneofs as sibling optional fields, omitted fields as defaults.

/// Declare a protobuf enum with its unspecified zero value
///
/// Unrecognized names decode as `Unspecified` so newer API versions do not
/// break reads.
macro_rules! api_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $unspecified:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
            #[default]
            #[serde(rename = $unspecified, other)]
            Unspecified,
        }

        impl $name {
            /// Names accepted in configuration (all but the unspecified value)
            pub const VARIANTS: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    Self::Unspecified => $unspecified,
                    $(Self::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn is_unspecified(&self) -> bool {
                matches!(self, Self::Unspecified)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mod cluster;
mod config;
mod operation;
mod requests;

pub use cluster::*;
pub use config::*;
pub use operation::*;
pub use requests::*;

/// int64 fields travel as decimal strings; numbers are accepted on input
pub(crate) mod int64 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid int64 '{}': {}", s, e))),
            Raw::Number(n) => Ok(n),
        }
    }

    /// `google.protobuf.Int64Value` wrapper: absent means unset
    pub mod option {
        use super::Raw;
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<i64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_str(&v.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            match Option::<Raw>::deserialize(deserializer)? {
                Some(Raw::Text(s)) => s
                    .parse()
                    .map(Some)
                    .map_err(|e| D::Error::custom(format!("invalid int64 '{}': {}", s, e))),
                Some(Raw::Number(n)) => Ok(Some(n)),
                None => Ok(None),
            }
        }
    }
}

/// Update masks travel as one comma-separated string
pub(crate) mod field_mask {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(paths: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&paths.join(","))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }
}
