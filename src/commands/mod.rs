pub mod combine;
pub mod toc;
