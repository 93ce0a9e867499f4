pub mod scan;

pub use scan::VideoTextScanner;
