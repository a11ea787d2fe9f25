mod fs_utils;
mod layout;
mod markers;
mod types;
mod uninstall;

pub use fs_utils::touch_stamp;
pub use layout::{default_user_prefix, PrefixLayout};
pub use markers::{
    clear_dirty_marker, read_dirty_marker, read_dirty_markers, validate_root_name,
    write_dirty_marker,
};
pub use types::{SoftUninstallResult, SoftUninstallStatus};
pub use uninstall::{missing_files, soft_uninstall};
