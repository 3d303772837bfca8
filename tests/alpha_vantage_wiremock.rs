use anyhow::Result;
use stockalloc::market_data::providers::alpha_vantage::AlphaVantagePriceSource;
use stockalloc::market_data::{PriceError, PriceSource};
use stockalloc::models::Ticker;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn t(symbol: &str) -> Ticker {
    Ticker::parse(symbol).unwrap()
}

fn provider(server: &MockServer) -> AlphaVantagePriceSource {
    AlphaVantagePriceSource::new("test-key").with_base_url(format!("{}/query", server.uri()))
}

#[tokio::test]
async fn alpha_vantage_global_quote_hits_mock_server() -> Result<()> {
    let server = MockServer::start().await;

    let body = r#"{
        "Global Quote": {
            "01. symbol": "IBM",
            "05. price": "168.2000",
            "07. latest trading day": "2024-05-03"
        }
    }"#;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "GLOBAL_QUOTE"))
        .and(query_param("symbol", "IBM"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let quote = provider(&server).fetch_quote(&t("IBM")).await?;
    assert_eq!(quote.price, 168.2);
    assert_eq!(quote.source, "alpha_vantage");

    Ok(())
}

#[tokio::test]
async fn alpha_vantage_empty_quote_is_not_found() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"Global Quote": {}}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let err = provider(&server).fetch_quote(&t("ZZZZ")).await.unwrap_err();
    assert_eq!(err, PriceError::TickerNotFound("ZZZZ".to_string()));

    Ok(())
}

#[tokio::test]
async fn alpha_vantage_rate_limit_is_unavailable() -> Result<()> {
    let server = MockServer::start().await;
    let body = r#"{"Information": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."}"#;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let err = provider(&server).fetch_quote(&t("IBM")).await.unwrap_err();
    match err {
        PriceError::SourceUnavailable(message) => assert!(message.contains("rate limit")),
        other => panic!("expected unavailable, got {other:?}"),
    }

    Ok(())
}
