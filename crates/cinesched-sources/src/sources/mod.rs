//! One extractor per cinema.

mod bfi_imax;
mod curzon;
mod everyman;
mod odeon;
mod picturehouse;

pub use bfi_imax::BfiImaxExtractor;
pub use curzon::CurzonExtractor;
pub use everyman::EverymanExtractor;
pub use odeon::OdeonExtractor;
pub use picturehouse::PicturehouseExtractor;
