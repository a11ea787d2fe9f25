mod error;
mod exclusion;
mod package;
mod record;

pub use error::CoordinatorError;
pub use exclusion::ExclusionSet;
pub use package::{current_unix_timestamp, validate_package_name, Package, PackageStatus};
pub use record::{parse_package_record, serialize_package_record, validate_record_value};
