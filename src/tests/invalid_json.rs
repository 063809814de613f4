use axum::http::StatusCode;

use crate::tests::helper;

#[tokio::test]
async fn test_invalid_json() {
    let mut app = helper::setup_test_app();

    // missing data
    let body = r"{}";
    let (status_code, error) = helper::maybe_signup_with_raw_body(&mut app, body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = error.unwrap();
    assert_eq!("Name, email and password are required", error.message);
    assert_eq!(None, error.description);

    // null counts as missing
    let body = r#"{"name":null,"email":"alice@example.com","password":"secret1"}"#;
    let (status_code, error) = helper::maybe_signup_with_raw_body(&mut app, body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = error.unwrap();
    assert_eq!("Name, email and password are required", error.message);
    assert_eq!(None, error.description);

    // wrong type
    let body = r#"{"name":1,"email":"alice@example.com","password":"secret1"}"#;
    let (status_code, error) = helper::maybe_signup_with_raw_body(&mut app, body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = error.unwrap();
    assert_eq!("Data error", error.message);
    assert!(
        error
            .description
            .unwrap()
            .starts_with("Failed to deserialize the JSON body into the target type")
    );

    // syntax error
    let body = r#"{"}"#;
    let (status_code, error) = helper::maybe_signup_with_raw_body(&mut app, body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = error.unwrap();
    assert_eq!("JSON syntax error", error.message);
    assert!(
        error
            .description
            .unwrap()
            .contains("EOF while parsing a string at line 1 column 3")
    );

    // missing content type
    let body = r"{}";
    let (status_code, error) = helper::maybe_signup_with_raw_body(&mut app, body, false).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = error.unwrap();
    assert_eq!("Missing `application/json` content type", error.message);
}
