pub mod stage1_join;
pub mod stage2_align;
pub mod stage3_upload;

pub use stage1_join::*;
pub use stage2_align::*;
pub use stage3_upload::*;
