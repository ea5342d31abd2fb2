mod fetcher;
mod provisioner;

pub use fetcher::*;
pub use provisioner::*;
