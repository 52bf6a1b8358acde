mod client;

pub use client::HttpStudyClient;
