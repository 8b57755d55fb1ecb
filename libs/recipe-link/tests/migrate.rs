//! Spreadsheet migration against a mock backend

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use recipe_link::{migrate_recipes, LinkConfig, MigrationFailure, RecipeRestClient};
use recipe_model::{import_recipes, ImportedRecipes, NewRecipe};
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rest_for(server: &MockServer) -> RecipeRestClient {
    RecipeRestClient::new(&LinkConfig::new(server.uri(), "service-key")).unwrap()
}

fn insert_mock(status: u16, body: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/rest/v1/recipes"))
        .and(header("prefer", "return=minimal"))
        .and(header("apikey", "service-key"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
}

fn rows(count: usize) -> ImportedRecipes {
    ImportedRecipes {
        recipes: (1..=count)
            .map(|i| NewRecipe {
                title: Some(format!("Tarif {}", i)),
                ..Default::default()
            })
            .collect(),
        skipped: 0,
    }
}

#[tokio::test]
async fn inserts_in_batches() {
    let server = MockServer::start().await;
    insert_mock(201, "").expect(3).mount(&server).await;

    let report = migrate_recipes(&rest_for(&server), &rows(5), 2).await.unwrap();

    assert_eq!(report.parsed, 5);
    assert_eq!(report.inserted, 5);
    assert_eq!(report.failure, None);
    assert!(report.is_complete());

    let requests = server.received_requests().await.unwrap();
    let sizes: Vec<usize> = requests
        .iter()
        .map(|r| serde_json::from_slice::<Vec<Value>>(&r.body).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    let first: Vec<Value> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first[0]["title"], "Tarif 1");
    assert_eq!(first[0]["platform"], "Instagram");
    assert!(first[0]["published_date"].is_null());
}

#[tokio::test]
async fn stops_at_first_rejected_batch() {
    let server = MockServer::start().await;
    let body = "x".repeat(300);
    insert_mock(400, &body).expect(1).mount(&server).await;

    let report = migrate_recipes(&rest_for(&server), &rows(5), 2).await.unwrap();

    assert_eq!(report.inserted, 0);
    assert!(!report.is_complete());
    assert_eq!(
        report.failure,
        Some(MigrationFailure {
            first_row: 1,
            last_row: 2,
            message: "x".repeat(200),
        })
    );
}

#[tokio::test]
async fn migrates_parsed_spreadsheet() {
    let server = MockServer::start().await;
    insert_mock(201, "").expect(1).mount(&server).await;

    let csv = "Başlık;Platform;Görsel URL;Link;Açıklama;Tarih\n\
               Focaccia;;https://img/1.jpg;https://insta/p/1;Yumuşacık;09.03.2024\n\
               ;;;;;\n";
    let imported = import_recipes(csv.as_bytes()).unwrap();

    let report = migrate_recipes(&rest_for(&server), &imported, 500).await.unwrap();
    assert_eq!(report.parsed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.inserted, 1);

    let requests = server.received_requests().await.unwrap();
    let sent: Vec<Value> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent[0]["published_date"], "2024-03-09");
    assert_eq!(sent[0]["link_url"], "https://insta/p/1");
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let server = MockServer::start().await;
    assert!(migrate_recipes(&rest_for(&server), &rows(1), 0).await.is_err());
}
