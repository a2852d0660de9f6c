//! Typed identifiers.
//!
//! Every id entering the system goes through [`parse`](ActorId::parse) once;
//! downstream code only ever sees the newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::PulseError;

const MAX_ID_LEN: usize = 64;

fn normalize(table: &str, raw: &str) -> Result<String, PulseError> {
    let trimmed = raw.trim();
    let body = match trimmed.split_once(':') {
        Some((prefix, rest)) if prefix == table => rest,
        Some(_) => {
            return Err(PulseError::Validation(format!(
                "{table} id has a foreign prefix: {trimmed:?}"
            )))
        }
        None => trimmed,
    };
    if body.is_empty() {
        return Err(PulseError::Validation(format!("{table} id is empty")));
    }
    if body.len() > MAX_ID_LEN {
        return Err(PulseError::Validation(format!(
            "{table} id longer than {MAX_ID_LEN} characters"
        )));
    }
    if !body
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(PulseError::Validation(format!(
            "{table} id contains invalid characters: {body:?}"
        )));
    }
    Ok(body.to_string())
}

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident, $table:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Table name used as an optional prefix (`table:id`).
            pub const TABLE: &'static str = $table;

            /// Fresh ULID-backed id.
            pub fn new() -> Self {
                Self(Ulid::new().to_string())
            }

            /// Validates and normalizes an external id.
            pub fn parse(raw: &str) -> Result<Self, PulseError> {
                normalize($table, raw).map(Self)
            }

            /// Borrow the raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = PulseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

id_newtype!(
    /// Synthetic actor.
    ActorId,
    "actor"
);
id_newtype!(
    /// Scheduled social action.
    TaskId,
    "task"
);
id_newtype!(
    /// Published content entity.
    ContentId,
    "content"
);
id_newtype!(
    /// Secondary artifact attached to a content entity.
    ArtifactId,
    "artifact"
);
id_newtype!(
    /// Platform user (content owner, notification recipient).
    UserId,
    "user"
);
id_newtype!(
    /// Human curator.
    CuratorId,
    "curator"
);
id_newtype!(
    /// Visual identity asset assignable to one actor.
    IdentityId,
    "identity"
);
id_newtype!(
    /// Curated queue entry.
    QueueItemId,
    "queue"
);
id_newtype!(
    /// Persisted pipeline stage.
    StageId,
    "stage"
);
id_newtype!(
    /// Curator review request.
    ReviewRequestId,
    "review"
);
id_newtype!(
    /// Target of a task: content, artifact or user id depending on the target kind.
    TargetId,
    "target"
);

impl From<&ContentId> for TargetId {
    fn from(id: &ContentId) -> Self {
        Self(id.0.clone())
    }
}

impl From<&ArtifactId> for TargetId {
    fn from(id: &ArtifactId) -> Self {
        Self(id.0.clone())
    }
}

impl From<&UserId> for TargetId {
    fn from(id: &UserId) -> Self {
        Self(id.0.clone())
    }
}

impl TargetId {
    /// Reinterpret as a content id.
    pub fn to_content(&self) -> ContentId {
        ContentId(self.0.clone())
    }

    /// Reinterpret as an artifact id.
    pub fn to_artifact(&self) -> ArtifactId {
        ArtifactId(self.0.clone())
    }

    /// Reinterpret as a user id.
    pub fn to_user(&self) -> UserId {
        UserId(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_matching_prefix() {
        let id = ContentId::parse("  content:01HX9Z  ").unwrap();
        assert_eq!(id.as_str(), "01HX9Z");
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        assert!(ContentId::parse("actor:abc").is_err());
    }

    #[test]
    fn parse_rejects_empty_and_garbage() {
        assert!(ActorId::parse("").is_err());
        assert!(ActorId::parse("   ").is_err());
        assert!(ActorId::parse("actor:").is_err());
        assert!(ActorId::parse("a b").is_err());
        assert!(ActorId::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn new_ids_are_unique_and_parseable() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert_eq!(TaskId::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn serde_is_transparent() {
        let id = UserId::parse("u-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""u-1""#);
    }
}
