mod bounds;
pub use self::bounds::*;

mod kd_tree;
pub use self::kd_tree::*;
