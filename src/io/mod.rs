//! I/O modules for the remote catalog, AOI files and result export

pub mod aoi;
pub mod client;
pub mod export;

pub use aoi::{read_aoi, read_geojson, AoiFeatures};
pub use client::{MosaicApi, PlanetClient};
pub use export::{write_csv, write_csv_file};
