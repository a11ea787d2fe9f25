mod fs_ops;
mod lock;
mod package_registry;
mod registry_store;

pub use fs_ops::write_file_atomic;
pub use lock::{read_lock_holder, repair_registry_lock, with_registry_lock, LockRepair};
pub use package_registry::PackageRegistry;
pub use registry_store::RegistryStore;
