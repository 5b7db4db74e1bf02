pub mod status;

pub use status::{result_urls, RESULT_URL_SHAPES};
