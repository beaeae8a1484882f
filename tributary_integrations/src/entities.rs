//! Entity definitions shipped with the built-in integrations.

use tributary_core::connectors::EntityDefinition;
use tributary_core::connectors::models::FieldType;

pub const S3_BUCKET_ENTITY: &str = "S3BucketEntity";
pub const S3_OBJECT_ENTITY: &str = "S3ObjectEntity";
pub const CHUNK_ENTITY: &str = "ChunkEntity";

pub fn s3_bucket_entity() -> EntityDefinition {
    let mut def = EntityDefinition::new(S3_BUCKET_ENTITY)
        .required("bucket_name", FieldType::String)
        .optional("location", FieldType::String);
    def.description = Some("An S3 bucket".to_string());
    def
}

pub fn s3_object_entity() -> EntityDefinition {
    let mut def = EntityDefinition::new(S3_OBJECT_ENTITY)
        .required("bucket_name", FieldType::String)
        .required("key", FieldType::String)
        .optional("size", FieldType::Integer)
        .optional("last_modified", FieldType::Timestamp)
        .optional("etag", FieldType::String)
        .optional("storage_class", FieldType::String);
    def.description = Some("An object stored in an S3 bucket".to_string());
    def
}

/// Output of the text chunker.
pub fn chunk_entity() -> EntityDefinition {
    EntityDefinition::new(CHUNK_ENTITY)
        .required("parent_entity_id", FieldType::String)
        .required("chunk_index", FieldType::Integer)
}
