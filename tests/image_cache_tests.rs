use animenews::config::ImageCacheSettings;
use animenews::storage::{ImageCache, ImageFormat};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

fn cache(max_entries: usize) -> ImageCache {
    let settings = ImageCacheSettings {
        max_entries,
        timeout: 5,
    };
    ImageCache::with_http(&settings, "animenews-tests/1.0").unwrap()
}

#[tokio::test]
async fn test_concurrent_requests_hit_the_network_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posters/frieren.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png(225, 318))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = cache(100);
    let url = format!("{}/posters/frieren.png", mock_server.uri());

    let results = futures::future::join_all((0..5).map(|_| cache.get(&url))).await;

    assert!(results.iter().all(|r| r.is_some()));
    let image = results[0].as_ref().unwrap();
    assert_eq!(image.format, ImageFormat::Png);
    assert_eq!((image.width, image.height), (225, 318));
    assert_eq!(cache.stats().coalesced, 4);

    // Served from memory afterwards.
    assert!(cache.get(&url).await.is_some());
}

#[tokio::test]
async fn test_http_errors_are_retried_on_next_get() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posters/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let cache = cache(100);
    let url = format!("{}/posters/missing.png", mock_server.uri());

    assert!(cache.get(&url).await.is_none());
    assert!(cache.get(&url).await.is_none());
    assert_eq!(cache.stats().failures, 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_non_image_body_is_not_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posters/login.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>please log in</html>"))
        .mount(&mock_server)
        .await;

    let cache = cache(100);
    let url = format!("{}/posters/login.png", mock_server.uri());

    assert!(cache.get(&url).await.is_none());
    assert!(!cache.contains(&url));
}

#[tokio::test]
async fn test_capacity_evicts_in_insertion_order() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(10, 10)))
        .mount(&mock_server)
        .await;

    let cache = cache(3);
    let urls: Vec<_> = (0..4)
        .map(|i| format!("{}/posters/{}.png", mock_server.uri(), i))
        .collect();

    for url in &urls[..3] {
        cache.get(url).await.unwrap();
    }
    // Re-reading the oldest entry does not save it.
    cache.get(&urls[0]).await.unwrap();
    cache.get(&urls[3]).await.unwrap();

    assert_eq!(cache.len(), 3);
    assert!(!cache.contains(&urls[0]));
    assert!(cache.contains(&urls[1]));
    assert!(cache.contains(&urls[3]));
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test]
async fn test_clear_aborts_pending_downloads() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png(10, 10))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let cache = cache(100);
    let url = format!("{}/posters/slow.png", mock_server.uri());

    let pending = {
        let cache = cache.clone();
        let url = url.clone();
        tokio::spawn(async move { cache.get(&url).await })
    };
    while cache.in_flight() == 0 {
        tokio::task::yield_now().await;
    }

    cache.clear();

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("cleared load should resolve promptly")
        .unwrap();
    assert!(result.is_none());
    assert!(!cache.contains(&url));
}
