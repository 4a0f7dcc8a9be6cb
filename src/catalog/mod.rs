// Model catalog collaborator — metadata, declarations, config templates.

pub mod client;
pub mod types;

pub use client::{Catalog, HttpCatalog};
pub use types::{
    AccessoryDecl, ConfigDecl, Directive, ModelInfo, ModelMetadata, OutputDecl, VersionInfo,
};
