pub mod models;
pub mod traits;

pub use models::{ChunkEntity, EntityDefinition, EntityField, FieldType};
pub use traits::{
    Destination, DestinationFactory, EmbeddingModel, EmbeddingModelFactory, Source, SourceFactory,
    TransformerFn,
};
