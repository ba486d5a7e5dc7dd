use std::time::Duration;

use quarry_tools::{
    AnyWebSearch, DuckDuckGoSearch, FallbackSearch, TavilySearch, WebSearch, format_digest,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DDG_PAGE: &str = r#"<html><body>
  <a class="result__a" href="https://example.com/news">Latest News</a>
  <a class="result__snippet">Today's headlines.</a>
</body></html>"#;

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn tavily_without_key_falls_back_to_duckduckgo() {
    let ddg_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DDG_PAGE))
        .expect(1)
        .mount(&ddg_server)
        .await;

    let search = FallbackSearch::new(
        AnyWebSearch::Tavily(TavilySearch::new(None, "http://127.0.0.1:9", timeout())),
        Some(AnyWebSearch::DuckDuckGo(DuckDuckGoSearch::new(
            &ddg_server.uri(),
            timeout(),
        ))),
    );

    let results = search.search("latest news", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        format_digest(&results, 300),
        "Title: Latest News\nURL: https://example.com/news\nContent: Today's headlines...."
    );
}

#[tokio::test]
async fn tavily_outage_falls_back_to_duckduckgo() {
    let tavily_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&tavily_server)
        .await;
    let ddg_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DDG_PAGE))
        .expect(1)
        .mount(&ddg_server)
        .await;

    let search = FallbackSearch::new(
        AnyWebSearch::Tavily(TavilySearch::new(
            Some("tvly-key".into()),
            &tavily_server.uri(),
            timeout(),
        )),
        Some(AnyWebSearch::DuckDuckGo(DuckDuckGoSearch::new(
            &ddg_server.uri(),
            timeout(),
        ))),
    );

    let results = search.search("latest news", 5).await.unwrap();
    assert_eq!(results[0].title, "Latest News");
}
