pub mod external;
pub mod image;
pub mod media;
pub mod pdf;
pub mod registry;
