mod filesystem_access;

pub use filesystem_access::FsAccess;

pub(crate) const CROSS_MARK: &str = "❌";
