pub mod assets;
pub mod extractors;
pub mod hash_index;
pub mod links;
pub mod quota;
pub mod resolver;
pub mod upload;
