mod interest_point;
pub use self::interest_point::*;

mod response_layer;
pub use self::response_layer::*;

mod fast_hessian;
pub use self::fast_hessian::*;

mod descriptor;
pub use self::descriptor::*;

mod matching;
pub use self::matching::*;

mod engine;
pub use self::engine::*;
