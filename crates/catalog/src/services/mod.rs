pub mod catalog_store;
pub mod tags_cache;
pub mod template_library;

pub use catalog_store::CatalogStore;
pub use tags_cache::TagsCache;
pub use template_library::TemplateLibrary;
