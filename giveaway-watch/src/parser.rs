use crate::types::Post;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    /// Only `t3` children are links; `more` stubs and the rest have other shapes.
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    link_flair_text: Option<String>,
}

/// Turn a `/r/<name>/new` listing body into posts, in the order reddit sent them.
pub fn parse_listing(body: &str) -> serde_json::Result<Vec<Post>> {
    let listing: Listing = serde_json::from_str(body)?;

    let posts = listing
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == "t3")
        .filter_map(|thing| match serde_json::from_value::<LinkData>(thing.data) {
            Ok(link) => Some(into_post(link)),
            Err(e) => {
                warn!("Skipping unreadable post in listing: {}", e);
                None
            }
        })
        .collect::<Vec<_>>();

    debug!("Parsed listing with {} posts", posts.len());
    Ok(posts)
}

fn into_post(link: LinkData) -> Post {
    let url = match link.url.filter(|u| !u.is_empty()) {
        Some(url) => url,
        None => format!(
            "https://www.reddit.com{}",
            link.permalink.unwrap_or_default()
        ),
    };

    Post {
        id: link.id,
        title: link.title,
        url,
        tag: link.link_flair_text.filter(|t| !t.is_empty()),
    }
}
