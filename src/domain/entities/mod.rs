pub mod asset;
pub mod links;
pub mod option_fields;
pub mod owner;
pub mod quota;
pub mod token;
pub mod upload;
