//! `DeezerCatalog` against a mock Deezer API.

use std::time::Duration;

use preview_core::{CatalogError, CatalogProvider, DeezerCatalog};
use preview_proto::config::CatalogConfig;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> CatalogConfig {
    CatalogConfig {
        base_url: server.uri(),
        ..CatalogConfig::default()
    }
}

fn hit(id: u64, title: &str, preview: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "duration": 212,
        "preview": preview,
        "artist": { "id": 27, "name": "Daft Punk" },
        "album": { "id": 302127, "title": "Discovery" }
    })
}

async fn mount_search(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "artist:\"Daft Punk\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// =============================================================================
// Successful searches
// =============================================================================

mod search {
    use super::*;

    #[tokio::test]
    async fn test_hits_are_mapped_and_hydrated() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!({ "data": [
                hit(3135556, "Harder, Better, Faster, Stronger", "https://cdn.example.com/1.mp3"),
                hit(3135553, "One More Time", "https://cdn.example.com/2.mp3"),
            ], "total": 2 }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/track/3135556"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": 3135556, "release_date": "2001-03-07" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/track/3135553"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": 3135553, "release_date": "2000-11-13" })),
            )
            .mount(&server)
            .await;

        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        let records = catalog.search("Daft Punk").await.unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.title.as_deref(), Some("Harder, Better, Faster, Stronger"));
        assert_eq!(first.artist_name.as_deref(), Some("Daft Punk"));
        assert_eq!(first.album_title.as_deref(), Some("Discovery"));
        assert_eq!(first.duration_seconds, Some(212));
        assert_eq!(first.release_date.as_deref(), Some("2001-03-07"));
        assert_eq!(
            first.preview_url.as_deref(),
            Some("https://cdn.example.com/1.mp3")
        );
        assert_eq!(records[1].release_date.as_deref(), Some("2000-11-13"));
    }

    #[tokio::test]
    async fn test_failed_hydration_leaves_record_partial() {
        let server = MockServer::start().await;
        mount_search(&server, json!({ "data": [hit(1, "Voyager", "")] })).await;
        Mock::given(method("GET"))
            .and(path("/track/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        let records = catalog.search("Daft Punk").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Voyager"));
        assert!(records[0].release_date.is_none());
        assert!(records[0].preview_url.is_none());
    }

    #[tokio::test]
    async fn test_hydration_can_be_disabled() {
        let server = MockServer::start().await;
        mount_search(&server, json!({ "data": [hit(1, "Voyager", "x.mp3")] })).await;
        Mock::given(method("GET"))
            .and(path("/track/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = CatalogConfig {
            hydrate_release_dates: false,
            ..config(&server)
        };
        let catalog = DeezerCatalog::new(&config).unwrap();
        let records = catalog.search("Daft Punk").await.unwrap();
        assert!(records[0].release_date.is_none());
    }

    #[tokio::test]
    async fn test_no_data_error_is_empty_result() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!({ "error": { "type": "DataException", "message": "no data", "code": 800 } }),
        )
        .await;

        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        assert!(catalog.search("Daft Punk").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_data_is_empty_result() {
        let server = MockServer::start().await;
        mount_search(&server, json!({ "data": [], "total": 0 })).await;

        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        assert!(catalog.search("Daft Punk").await.unwrap().is_empty());
    }
}

// =============================================================================
// Error classification
// =============================================================================

mod errors {
    use super::*;

    async fn search_with_status(status: u16) -> CatalogError {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        catalog.search("Daft Punk").await.unwrap_err()
    }

    #[tokio::test]
    async fn test_gateway_errors_are_network_failures() {
        assert!(matches!(search_with_status(502).await, CatalogError::Network(_)));
        assert!(matches!(search_with_status(503).await, CatalogError::Network(_)));
    }

    #[tokio::test]
    async fn test_other_statuses_are_unexpected() {
        assert!(matches!(search_with_status(500).await, CatalogError::Unexpected(_)));
        assert!(matches!(search_with_status(404).await, CatalogError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_quota_error_payload_is_unexpected() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!({ "error": { "type": "Exception", "message": "Quota limit exceeded", "code": 4 } }),
        )
        .await;

        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        match catalog.search("Daft Punk").await {
            Err(CatalogError::Unexpected(msg)) => assert!(msg.contains("Quota")),
            other => panic!("expected Unexpected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let catalog = DeezerCatalog::new(&config(&server)).unwrap();
        assert!(matches!(
            catalog.search("Daft Punk").await,
            Err(CatalogError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        // Grab a free port and release it so nothing is listening there.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = CatalogConfig {
            base_url: format!("http://127.0.0.1:{}", port),
            ..CatalogConfig::default()
        };

        let catalog = DeezerCatalog::new(&config).unwrap();
        assert!(matches!(
            catalog.search("Daft Punk").await,
            Err(CatalogError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [] }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = CatalogConfig {
            request_timeout_secs: 1,
            ..config(&server)
        };
        let catalog = DeezerCatalog::new(&config).unwrap();
        assert!(matches!(
            catalog.search("Daft Punk").await,
            Err(CatalogError::Network(_))
        ));
    }
}
