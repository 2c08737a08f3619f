//! Mock portal endpoints

use super::config::{TEST_DEVICE, TEST_PASSWORD, TEST_USERNAME};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token issued by the mocked token exchange
pub const NEGOTIATED_TOKEN: &str = "abc123";

/// `auth-token` cookie carrying [`NEGOTIATED_TOKEN`], URL-encoded JSON as the portal sends it
pub const AUTH_COOKIE_HEADER: &str = "auth-token=%7B%22token%22%3A%22abc123%22%7D; Path=/";

/// Report payload the way the Event Management API returns it
pub fn event_payload(id: &str, name: &str, type_code: u32, status_code: u32) -> Value {
    json!({
        "demoId": id,
        "demoName": name,
        "demoClassCode": type_code,
        "demoStatusCode": status_code,
        "demoDate": "2025-07-22",
        "demoLockInd": "N",
        "demoInstructions": {
            "demoPrepnTxt": "Set up table by 9am",
            "demoPortnTxt": "1 oz cups"
        },
        "itemDetails": [{
            "itemNbr": 12345,
            "gtin": "00012345678905",
            "itemDesc": "Frosted Flakes 24oz",
            "vendorNbr": "5432",
            "deptNbr": "92"
        }]
    })
}

/// Login, code request, code validation and token exchange, each expected once
pub async fn mount_handshake(server: &MockServer, code: &str) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_partial_json(
            json!({"username": TEST_USERNAME, "password": TEST_PASSWORD}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/mfa/sendCode"))
        .and(body_partial_json(json!({"credid": TEST_DEVICE})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/mfa/validateCode"))
        .and(body_partial_json(json!({"code": code})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/EventManagement/api/authenticate"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", AUTH_COOKIE_HEADER))
        .expect(1)
        .mount(server)
        .await;
}

/// Report endpoint answering `payload` for `id` when called with `token`
pub async fn mount_report(server: &MockServer, id: &str, token: &str, payload: Value) {
    Mock::given(method("GET"))
        .and(path("/EventManagement/api/edrReport"))
        .and(query_param("id", id))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(server)
        .await;
}

/// Report endpoint answering a bare status for `id`
pub async fn mount_report_status(server: &MockServer, id: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path("/EventManagement/api/edrReport"))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Nothing on the login host may be called
pub async fn forbid_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}
