pub mod batch;

pub use batch::{BatchLinker, LinkError, LinkRequest, create_links_in};
