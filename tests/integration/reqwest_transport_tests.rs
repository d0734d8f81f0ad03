//! HTTP transport tests against a wiremock server

#[cfg(test)]
mod tests {
    use crate::common::assertions::ResponseItemAssertions;
    use crate::common::fixtures::collect_items;
    use odata_batch::{BatchClient, BatchConfig, BatchError, ODataRequest};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESPONSE_BODY: &str = "--batchresponse_1\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"CustomerID\":1,\"Name\":\"Maria Anders\"}\r\n\
--batchresponse_1\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_1\r\n\
\r\n\
--changesetresponse_1\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: 1\r\n\
\r\n\
HTTP/1.1 204 No Content\r\n\
\r\n\
\r\n\
--changesetresponse_1--\r\n\
--batchresponse_1--\r\n";

    fn client() -> BatchClient {
        BatchClient::new(BatchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_batch_over_http() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/svc/$batch"))
            .and(header("OData-Version", "4.0"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                RESPONSE_BODY,
                "multipart/mixed; boundary=batchresponse_1",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut batch = client()
            .batch_request(&format!("{}/svc", mock_server.uri()))
            .unwrap();
        batch
            .add_retrieve()
            .unwrap()
            .set_request(ODataRequest::retrieve("Customers(1)"))
            .unwrap();
        batch
            .add_changeset()
            .unwrap()
            .add_request(ODataRequest::delete("Orders(7)"))
            .unwrap();

        let response = batch.execute().await.unwrap();
        assert_eq!(response.status_code(), 200);

        let mut items = collect_items(response.body()).await;
        assert_eq!(items.len(), 2);
        let customer: serde_json::Value = items[0].assert_single(200).body_json().unwrap();
        assert_eq!(customer["Name"], "Maria Anders");

        let mut changeset = items.remove(1).assert_changeset();
        let deleted = changeset.next().unwrap();
        assert_eq!(deleted.status_code(), 204);
        assert_eq!(deleted.content_id(), Some(1));

        let received = mock_server.received_requests().await.unwrap();
        let body = String::from_utf8(received[0].body.clone()).unwrap();
        assert!(body.contains("GET Customers(1) HTTP/1.1\r\n"));
        assert!(body.contains("DELETE Orders(7) HTTP/1.1\r\n"));
        assert!(body.ends_with(&format!("--{}--\r\n", batch_boundary(&body))));
    }

    /// Outer boundary, read back from the first delimiter line
    fn batch_boundary(body: &str) -> String {
        body.lines()
            .next()
            .and_then(|line| line.strip_prefix("--"))
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_rejected_batch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/svc/$batch"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid batch boundary"))
            .mount(&mock_server)
            .await;

        let mut batch = client()
            .batch_request(&format!("{}/svc/", mock_server.uri()))
            .unwrap();
        batch
            .add_retrieve()
            .unwrap()
            .set_request(ODataRequest::retrieve("Customers(1)"))
            .unwrap();

        match batch.execute().await {
            Err(BatchError::BatchRejected {
                status,
                message,
                body,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request");
                assert_eq!(body, "Invalid batch boundary");
            }
            other => panic!("expected a rejected batch, got {:?}", other.map(|r| r.status_code())),
        }
    }

    #[tokio::test]
    async fn test_response_without_boundary_is_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let mut batch = client().batch_request(&mock_server.uri()).unwrap();
        batch
            .add_retrieve()
            .unwrap()
            .set_request(ODataRequest::retrieve("Customers(1)"))
            .unwrap();

        assert!(matches!(
            batch.execute().await,
            Err(BatchError::MalformedBatch(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_response_fails_on_read() {
        let mock_server = MockServer::start().await;
        let truncated = &RESPONSE_BODY[..RESPONSE_BODY.len() / 2];

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(truncated, "multipart/mixed; boundary=batchresponse_1"),
            )
            .mount(&mock_server)
            .await;

        let mut batch = client().batch_request(&mock_server.uri()).unwrap();
        batch
            .add_retrieve()
            .unwrap()
            .set_request(ODataRequest::retrieve("Customers(1)"))
            .unwrap();
        batch
            .add_changeset()
            .unwrap()
            .add_request(ODataRequest::delete("Orders(7)"))
            .unwrap();

        let response = batch.execute().await.unwrap();
        let items = response.body();
        // Head and first part arrive intact; the failure surfaces when the
        // cursor reaches the cut.
        assert!(items.next().await.unwrap().is_some());
        assert!(matches!(
            items.next().await,
            Err(BatchError::MalformedBatch(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let mut batch = client()
            .batch_request("http://127.0.0.1:9/svc")
            .unwrap();
        batch
            .add_retrieve()
            .unwrap()
            .set_request(ODataRequest::retrieve("Customers(1)"))
            .unwrap();

        let err = batch.execute().await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {:?}", err);
        assert!(matches!(batch.execute().await, Err(BatchError::Sequence(_))));
    }
}
