pub mod linkedin;

pub use linkedin::LinkedInScraper;
