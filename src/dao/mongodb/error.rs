//! MongoDB-specific error taxonomy.

use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A required environment variable is not set.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// The client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the initial ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made before giving up.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A health-check ping failed on an established connection.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index bootstrap failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document save failed.
    #[error("failed to save document `{id}` in `{collection}`")]
    SaveDocument {
        /// Collection name.
        collection: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document load failed.
    #[error("failed to load document `{id}` from `{collection}`")]
    LoadDocument {
        /// Collection name.
        collection: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A collection query failed.
    #[error("failed to query collection `{collection}`")]
    Query {
        /// Collection name.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document delete failed.
    #[error("failed to delete document `{id}` from `{collection}`")]
    DeleteDocument {
        /// Collection name.
        collection: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
