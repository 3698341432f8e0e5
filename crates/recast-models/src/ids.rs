//! Opaque string identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $gen:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self($gen.to_string())
            }

            /// Create from an existing string.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string.
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
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a transcoding job.
    ///
    /// Time-ordered (UUIDv7) so that lexicographic ordering of job ids
    /// agrees with creation order; the paginated job listing relies on
    /// this when resuming from a page token.
    JobId,
    Uuid::now_v7()
);

id_type!(
    /// Identifier assigned to a successfully assembled source video.
    VideoId,
    Uuid::new_v4()
);

id_type!(
    /// Identifier for an in-flight chunked upload session.
    UploadId,
    Uuid::new_v4()
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_sort_by_creation() {
        let a = JobId::new();
        let b = JobId::new();
        let c = JobId::new();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_id_round_trip() {
        let id = VideoId::from_string("abc-123");
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(id.to_string(), "abc-123");
    }
}
