pub mod asset;
pub mod memory;
pub mod owner;
pub mod sqlx_repo;

use asset::AssetRepository;
use owner::OwnerRepository;

/// Everything the core needs from the metadata store.
pub trait MetadataStore: AssetRepository + OwnerRepository {}

impl<T> MetadataStore for T where T: AssetRepository + OwnerRepository + ?Sized {}
