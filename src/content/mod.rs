pub mod markup;

pub use markup::{strip_markup, MarkupStripper};
