pub mod charset;
pub mod decoder;
pub mod markdown;
pub mod mime;
pub mod normalizer;
pub mod sanitizer;
