pub mod issue;
pub mod page;
pub mod params;
pub mod status;

pub use issue::*;
pub use page::*;
pub use params::*;
pub use status::*;
