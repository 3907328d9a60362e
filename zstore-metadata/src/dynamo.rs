//! DynamoDB manifest store
//!
//! One item per logical object: partition key `prefix`, sort key
//! `file_name`, the remaining manifest fields marshalled as plain
//! attributes. `put` is a full-item replacement.

use crate::store::MetadataStore;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;
use zstore_core::error::{Result, ZstoreError};
use zstore_core::manifest::{ObjectManifest, ShardSlot};

const ATTR_PREFIX: &str = "prefix";
const ATTR_FILE_NAME: &str = "file_name";
const ATTR_ORIGINAL_SIZE: &str = "original_size";
const ATTR_SHARD_SIZE: &str = "shard_size";
const ATTR_PARITY_SHARDS: &str = "parity_shards";
const ATTR_SHARD_SLOTS: &str = "shard_slots";
const ATTR_HASH: &str = "hash";
const ATTR_BACKEND_KIND: &str = "backend_kind";
const ATTR_BUCKET_NAME: &str = "bucket_name";
const ATTR_STORAGE_KEY: &str = "storage_key";

/// Manifest index backed by a DynamoDB table.
pub struct DynamoMetadataStore {
    client: Client,
    table_name: String,
}

impl DynamoMetadataStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the manifest table if it does not already exist.
    pub async fn ensure_table(&self) -> Result<()> {
        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_PREFIX)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(|e| ZstoreError::Backend(e.to_string()))?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_FILE_NAME)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(|e| ZstoreError::Backend(e.to_string()))?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_PREFIX)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(|e| ZstoreError::Backend(e.to_string()))?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_FILE_NAME)
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(|e| ZstoreError::Backend(e.to_string()))?,
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(table = %self.table_name, "created manifest table");
                Ok(())
            }
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_resource_in_use_exception() {
                    debug!(table = %self.table_name, "manifest table already exists");
                    Ok(())
                } else {
                    Err(ZstoreError::Backend(service_err.to_string()))
                }
            }
        }
    }

    /// Drop the manifest table. Missing tables are tolerated.
    pub async fn drop_table(&self) -> Result<()> {
        let result = self
            .client
            .delete_table()
            .table_name(&self.table_name)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    Ok(())
                } else {
                    Err(ZstoreError::Backend(service_err.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl MetadataStore for DynamoMetadataStore {
    async fn put(&self, manifest: &ObjectManifest) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(marshal_manifest(manifest)))
            .send()
            .await
            .map_err(|e| ZstoreError::ManifestWrite(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, prefix: &str, file_name: &str) -> Result<ObjectManifest> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_PREFIX, AttributeValue::S(prefix.to_string()))
            .key(ATTR_FILE_NAME, AttributeValue::S(file_name.to_string()))
            .send()
            .await
            .map_err(|e| ZstoreError::Backend(e.to_string()))?;

        match result.item {
            Some(item) => unmarshal_manifest(&item),
            None => Err(ZstoreError::NotFound {
                prefix: prefix.to_string(),
                file_name: file_name.to_string(),
            }),
        }
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectManifest>> {
        let mut manifests = Vec::new();
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#p = :prefix")
                .expression_attribute_names("#p", ATTR_PREFIX)
                .expression_attribute_values(":prefix", AttributeValue::S(prefix.to_string()))
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(|e| ZstoreError::Backend(e.to_string()))?;

            for item in result.items() {
                manifests.push(unmarshal_manifest(item)?);
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(manifests)
    }

    async fn delete(&self, prefix: &str, file_name: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(ATTR_PREFIX, AttributeValue::S(prefix.to_string()))
            .key(ATTR_FILE_NAME, AttributeValue::S(file_name.to_string()))
            .send()
            .await
            .map_err(|e| ZstoreError::ManifestDelete(e.to_string()))?;
        Ok(())
    }
}

fn marshal_slot(slot: &ShardSlot) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (ATTR_HASH.to_string(), AttributeValue::S(slot.hash.clone())),
        (
            ATTR_BACKEND_KIND.to_string(),
            AttributeValue::S(slot.backend_kind.clone()),
        ),
        (
            ATTR_BUCKET_NAME.to_string(),
            AttributeValue::S(slot.bucket_name.clone()),
        ),
        (
            ATTR_STORAGE_KEY.to_string(),
            AttributeValue::S(slot.storage_key.clone()),
        ),
    ])
}

fn marshal_manifest(manifest: &ObjectManifest) -> HashMap<String, AttributeValue> {
    let slots = manifest
        .shard_slots
        .iter()
        .map(|slot| AttributeValue::M(marshal_slot(slot)))
        .collect();

    HashMap::from([
        (
            ATTR_PREFIX.to_string(),
            AttributeValue::S(manifest.prefix.clone()),
        ),
        (
            ATTR_FILE_NAME.to_string(),
            AttributeValue::S(manifest.file_name.clone()),
        ),
        (
            ATTR_ORIGINAL_SIZE.to_string(),
            AttributeValue::N(manifest.original_size.to_string()),
        ),
        (
            ATTR_SHARD_SIZE.to_string(),
            AttributeValue::N(manifest.shard_size.to_string()),
        ),
        (
            ATTR_PARITY_SHARDS.to_string(),
            AttributeValue::N(manifest.parity_shards.to_string()),
        ),
        (ATTR_SHARD_SLOTS.to_string(), AttributeValue::L(slots)),
    ])
}

fn attr_s(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| ZstoreError::Backend(format!("manifest item missing attribute: {}", name)))
}

fn attr_n<T: FromStr>(item: &HashMap<String, AttributeValue>, name: &str) -> Result<T> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| ZstoreError::Backend(format!("manifest item missing attribute: {}", name)))
}

fn unmarshal_slot(item: &HashMap<String, AttributeValue>) -> Result<ShardSlot> {
    Ok(ShardSlot {
        hash: attr_s(item, ATTR_HASH)?,
        backend_kind: attr_s(item, ATTR_BACKEND_KIND)?,
        bucket_name: attr_s(item, ATTR_BUCKET_NAME)?,
        storage_key: attr_s(item, ATTR_STORAGE_KEY)?,
    })
}

fn unmarshal_manifest(item: &HashMap<String, AttributeValue>) -> Result<ObjectManifest> {
    let slots = item
        .get(ATTR_SHARD_SLOTS)
        .and_then(|v| v.as_l().ok())
        .ok_or_else(|| {
            ZstoreError::Backend(format!("manifest item missing attribute: {}", ATTR_SHARD_SLOTS))
        })?;

    let shard_slots = slots
        .iter()
        .map(|slot| {
            slot.as_m()
                .map_err(|_| ZstoreError::Backend("shard slot is not a map".to_string()))
                .and_then(unmarshal_slot)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ObjectManifest {
        prefix: attr_s(item, ATTR_PREFIX)?,
        file_name: attr_s(item, ATTR_FILE_NAME)?,
        original_size: attr_n(item, ATTR_ORIGINAL_SIZE)?,
        shard_size: attr_n(item, ATTR_SHARD_SIZE)?,
        parity_shards: attr_n(item, ATTR_PARITY_SHARDS)?,
        shard_slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> ObjectManifest {
        ObjectManifest {
            prefix: "data/images".to_string(),
            file_name: "cat.png".to_string(),
            original_size: 123_456,
            shard_size: 30_864,
            parity_shards: 2,
            shard_slots: (0..6)
                .map(|i| ShardSlot {
                    hash: format!("{:016x}", 0xdead_beef_u64 + i),
                    backend_kind: if i % 2 == 0 { "s3" } else { "gcs" }.to_string(),
                    bucket_name: format!("bucket-{}", i % 3),
                    storage_key: format!("data/images/cat.png/{:016x}", 0xdead_beef_u64 + i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_marshal_round_trip() {
        let manifest = sample_manifest();
        let item = marshal_manifest(&manifest);
        let back = unmarshal_manifest(&item).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_marshal_key_attributes() {
        let manifest = sample_manifest();
        let item = marshal_manifest(&manifest);

        assert_eq!(
            item.get(ATTR_PREFIX).unwrap().as_s().unwrap(),
            "data/images"
        );
        assert_eq!(item.get(ATTR_FILE_NAME).unwrap().as_s().unwrap(), "cat.png");
        assert_eq!(
            item.get(ATTR_ORIGINAL_SIZE).unwrap().as_n().unwrap(),
            "123456"
        );
        assert_eq!(
            item.get(ATTR_SHARD_SLOTS).unwrap().as_l().unwrap().len(),
            6
        );
    }

    #[test]
    fn test_unmarshal_missing_attribute() {
        let manifest = sample_manifest();
        let mut item = marshal_manifest(&manifest);
        item.remove(ATTR_SHARD_SIZE);

        let result = unmarshal_manifest(&item);
        assert!(matches!(result, Err(ZstoreError::Backend(_))));
    }
}
