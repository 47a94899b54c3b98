pub mod client;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod scrape;
pub mod session;
pub mod types;

pub use client::InstagramClient;
pub use error::ScraperError;
pub use feed::PostFeed;
pub use normalize::{extract_profile_data, normalize_post};
pub use scrape::{scrape_influencer, ScrapeOutcome, ScrapeRequest, MAX_POSTS};
pub use session::SessionData;
