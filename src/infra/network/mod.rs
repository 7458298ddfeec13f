pub mod catalog;
pub mod download;
pub mod requests;

pub use catalog::{CatalogPages, RemoteListing, SpotifyCatalog};
pub use download::HttpDownloader;
pub use requests::SpotifyApi;
