#[cfg(test)]
mod advisor_client_tests {
    use deskserver::routing::{GeminiClient, RoutingAdvisor};
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::Regex("route this".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": {
                            "parts": [{"text": "{\"department_name\": \"IT Support\"}"}]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GeminiClient::new(
            "test-key".to_string(),
            "gemini-1.5-flash".to_string(),
            Some(server.url()),
        );

        let reply = client.generate("route this").await.unwrap();
        assert_eq!(reply, "{\"department_name\": \"IT Support\"}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_surface_as_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = GeminiClient::new(
            "k".to_string(),
            "gemini-1.5-flash".to_string(),
            Some(server.url()),
        );

        assert!(client.generate("hello").await.is_err());
    }

    #[tokio::test]
    async fn missing_candidates_yield_empty_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string())
            .create_async()
            .await;

        let client = GeminiClient::new(
            "k".to_string(),
            "gemini-1.5-flash".to_string(),
            Some(server.url()),
        );

        let reply = client.generate("hello").await.unwrap();
        assert_eq!(reply, "");
    }
}
