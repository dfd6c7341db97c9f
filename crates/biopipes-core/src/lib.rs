pub mod config;
pub mod derive;
pub mod emof;
pub mod error;
pub mod frame;
pub mod geospatial;
pub mod identifiers;
pub mod ingestion;
pub mod integrity;
pub mod layout;
pub mod mapping;
pub mod metadata;
pub mod outputs;
pub mod pipeline;
pub mod schema;
pub mod vocabulary;
