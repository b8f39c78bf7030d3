use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache '{id}' cannot copy a non-serializable value")]
    NotSerializable { id: String },
    #[error("error serializing cached value for cache '{id}': {source}")]
    Serialize {
        id: String,
        #[source]
        source: bincode::Error,
    },
    #[error("error deserializing cached value for cache '{id}': {source}")]
    Deserialize {
        id: String,
        #[source]
        source: bincode::Error,
    },
    #[error("timed out waiting for the lock on cache '{id}' key {key}")]
    LockTimeout { id: String, key: String },
}
