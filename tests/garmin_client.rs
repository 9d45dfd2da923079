mod common;

use common::date;
use garmin_ido_sync::errors::{AuthError, DownloadError, FetchError};
use garmin_ido_sync::garmin::{ActivityId, ActivitySource, GarminConnectClient, GarminEndpoints};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/modern/proxy/activitylist-service/activities/search/activities";

fn client(server: &MockServer) -> GarminConnectClient {
    GarminConnectClient::with_endpoints(
        "rider",
        "hunter2",
        Duration::from_secs(5),
        GarminEndpoints::single_host(&server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_login_posts_credentials_and_follows_up_on_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sso/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sso/signin"))
        .and(body_string_contains("username=rider"))
        .and(body_string_contains("password=hunter2"))
        .and(body_string_contains("embed=false"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.login().await.unwrap();
    client.logout().await.unwrap();
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_rejection_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sso/signin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sso/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    let err = client(&server).login().await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 401, .. }), "{err}");
}

#[tokio::test]
async fn test_listing_decodes_envelope_and_trims_to_requested_day() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("NK", "NT"))
        .and(body_json(json!({
            "startDate": "2024-06-02",
            "endDate": "2024-06-03",
            "limit": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activityList": [
                {
                    "activityId": 101,
                    "activityName": "Morning Ride",
                    "activityType": { "typeKey": "road_biking" },
                    "startTimeLocal": "2024-06-02 07:15:00",
                    "distance": 42000.0,
                    "duration": 5400.0
                },
                {
                    "activityId": 102,
                    "activityName": null,
                    "activityType": "running",
                    "startTimeLocal": "2024-06-02 18:00:00",
                    "distance": null
                },
                {
                    "activityId": 103,
                    "activityName": "Next Day Ride",
                    "activityType": "cycling",
                    "startTimeLocal": "2024-06-03 07:00:00"
                }
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    let activities = client.list_activities(date("2024-06-02")).await.unwrap();
    let ids: Vec<&str> = activities.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["101", "102"]);
    assert_eq!(activities[0].activity_type, "road_biking");
    assert_eq!(activities[1].name, "");
    assert_eq!(activities[1].distance, 0.0);

    let bikes = client.list_bike_activities(date("2024-06-02")).await.unwrap();
    assert_eq!(bikes.len(), 1);
    assert_eq!(bikes[0].name, "Morning Ride");
}

#[tokio::test]
async fn test_listing_without_envelope_entries_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalCount": 0 })))
        .mount(&server)
        .await;

    let activities = client(&server).list_activities(date("2024-06-02")).await.unwrap();
    assert!(activities.is_empty());
}

#[tokio::test]
async fn test_listing_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server).list_activities(date("2024-06-02")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 403, .. }), "{err}");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client(&server).list_activities(date("2024-06-02")).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)), "{err}");
}

#[tokio::test]
async fn test_download_returns_raw_archive_bytes() {
    let server = MockServer::start().await;
    let archive = common::fit_zip(b"FIT");
    Mock::given(method("GET"))
        .and(path("/download-service/files/activity/101"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.clone()))
        .mount(&server)
        .await;

    let bytes = client(&server)
        .download_activity(&ActivityId::from(101))
        .await
        .unwrap();
    assert_eq!(bytes, archive);
}

#[tokio::test]
async fn test_download_non_200_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download-service/files/activity/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .download_activity(&ActivityId::from(999))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Status(404)));
}
