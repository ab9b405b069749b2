use crate::tracker::{StoreError, StoreResult};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

pub fn increment_resource_version(current: &str) -> StoreResult<String> {
    match current {
        "" => Ok("1".to_string()),
        v => {
            let num: u64 = v
                .parse()
                .map_err(|_| StoreError::Invalid(format!("invalid resourceVersion: {}", v)))?;
            Ok((num + 1).to_string())
        }
    }
}

/// Fill in the server-managed metadata a stored object always carries
pub fn ensure_metadata(meta: &mut ObjectMeta, namespace: &str) {
    if namespace.is_empty() {
        meta.namespace = None;
    } else if meta.namespace.is_none() {
        meta.namespace = Some(namespace.to_string());
    }
    if meta.creation_timestamp.is_none() {
        meta.creation_timestamp = Some(Time(chrono::Utc::now()));
    }
    if meta.uid.is_none() {
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
    }
}
