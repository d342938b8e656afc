pub mod approval;
pub mod decision;
pub mod intent;
pub mod policy;

pub use approval::*;
pub use decision::*;
pub use intent::*;
pub use policy::*;
