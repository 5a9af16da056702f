mod api;
mod pages;

pub use api::{batch_status, download_archive, download_certificate, preview_image};
pub use pages::{generate_handler, index, view_batch};
