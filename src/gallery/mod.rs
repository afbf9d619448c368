//! Gallery access module

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteGallery;
pub use traits::{EnrollmentRecord, GalleryAccessor};
