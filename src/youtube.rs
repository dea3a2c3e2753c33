use serde::Deserialize;
use tracing::error;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// A video found on YouTube, title plus watch URL.
#[derive(Clone, Debug, PartialEq)]
pub struct Video {
    pub name: String,
    pub url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
}

fn videos_from(response: SearchResponse) -> Vec<Video> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            Some(Video {
                name: item.snippet.title,
                url: format!("https://www.youtube.com/watch?v={}", id),
            })
        })
        .collect()
}

/// Search videos on YouTube matching the query.
pub async fn search(
    client: &reqwest::Client,
    api_key: &str,
    query: &str,
    max_results: u8,
) -> anyhow::Result<Vec<Video>> {
    let response = client
        .get(SEARCH_ENDPOINT)
        .query(&[
            ("part", "snippet"),
            ("type", "video"),
            ("q", query),
            ("maxResults", &max_results.to_string()),
            ("key", api_key),
        ])
        .send()
        .await?
        .error_for_status()
        .map_err(|e| {
            error!("YouTube search failed, the API developer key may be invalid: {}", e);
            e
        })?
        .json::<SearchResponse>()
        .await?;

    Ok(videos_from(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_parsing() {
        let json = r#"{
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" },
                    "snippet": { "title": "Some song" }
                },
                {
                    "id": { "kind": "youtube#channel" },
                    "snippet": { "title": "A channel, not a video" }
                }
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let videos = videos_from(response);
        assert_eq!(
            videos,
            vec![Video {
                name: "Some song".to_string(),
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_response_yields_no_videos() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(videos_from(response).is_empty());
    }
}
