#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use splatcap_3d as scene;

#[doc(inline)]
pub use splatcap_depth as depth;
