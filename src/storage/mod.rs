pub mod firebase;

pub use firebase::{DisabledUploader, FirebaseUploader};
