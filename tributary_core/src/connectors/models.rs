use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Unit of data moving through a sync pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEntity {
    /// Stable identifier in the external system.
    pub entity_id: String,
    pub source_name: String,
    /// Entity definition name (e.g. `S3ObjectEntity`).
    pub entity_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ChunkEntity {
    pub fn new(
        entity_id: impl Into<String>,
        source_name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Result<Self> {
        let entity_id = entity_id.into();
        if entity_id.trim().is_empty() {
            return Err(Error::InvalidInput("entity_id is empty".to_string()));
        }
        Ok(Self {
            entity_id,
            source_name: source_name.into(),
            entity_type: entity_type.into(),
            content: None,
            metadata: Map::new(),
        })
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Timestamp,
    Object,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String | FieldType::Timestamp => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityField {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

/// Shape of the metadata an entity type carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<EntityField>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(EntityField {
            name: name.into(),
            field_type,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(EntityField {
            name: name.into(),
            field_type,
            required: false,
        });
        self
    }

    /// Check an entity's metadata against the declared fields. Null values
    /// count as absent.
    pub fn check(&self, entity: &ChunkEntity) -> Result<()> {
        for field in &self.fields {
            match entity.metadata.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(Error::validation(
                        field.name.clone(),
                        format!("required by {}", self.name),
                    ));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.field_type.accepts(value) => {
                    return Err(Error::validation(
                        field.name.clone(),
                        format!("expected {:?} in {}", field.field_type, self.name),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_definition() -> EntityDefinition {
        EntityDefinition::new("S3ObjectEntity")
            .required("bucket_name", FieldType::String)
            .required("key", FieldType::String)
            .optional("size", FieldType::Integer)
    }

    #[test]
    fn check_accepts_matching_metadata() {
        let entity = ChunkEntity::new("docs/a.txt", "aws_s3", "S3ObjectEntity")
            .unwrap()
            .with_metadata("bucket_name", "docs")
            .with_metadata("key", "a.txt")
            .with_metadata("size", 12);
        object_definition().check(&entity).unwrap();
    }

    #[test]
    fn check_names_missing_and_mistyped_fields() {
        let entity = ChunkEntity::new("docs/a.txt", "aws_s3", "S3ObjectEntity")
            .unwrap()
            .with_metadata("bucket_name", "docs");
        let err = object_definition().check(&entity).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "key"));

        let entity = entity
            .with_metadata("key", "a.txt")
            .with_metadata("size", "twelve");
        let err = object_definition().check(&entity).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "size"));
    }

    #[test]
    fn empty_entity_id_is_rejected() {
        assert!(ChunkEntity::new("  ", "slack", "SlackMessage").is_err());
    }
}
