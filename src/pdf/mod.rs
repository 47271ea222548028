pub mod document;
pub mod merge;
pub mod outline;
pub mod toc_page;

pub use document::PdfDocument;
