use serde::{Deserialize, Serialize};

/// Textual embed formats for one public identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Links {
    pub url: String,
    pub html: String,
    pub markdown: String,
    pub bbcode: String,
    pub markdown_with_link: String,
}

#[derive(Debug, Serialize)]
pub struct LinksResponse<T: Serialize> {
    pub image: T,
    pub links: Links,
}
