use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::services::directions_api::{DirectionsApi, TravelTime, TravelTimeRequest};

const DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteJson>,
}

#[derive(Deserialize)]
struct RouteJson {
    #[serde(default)]
    legs: Vec<LegJson>,
}

#[derive(Deserialize)]
struct LegJson {
    duration: ValueJson,
    duration_in_traffic: Option<ValueJson>,
}

#[derive(Deserialize)]
struct ValueJson {
    value: u32,
}

/// Google Directions API client. The API key travels as the `key` query
/// parameter via [`UrlParam`].
pub struct GoogleDirectionsClient<C> {
    http: C,
    base_url: String,
}

impl GoogleDirectionsClient<UrlParam<BasicClient>> {
    pub fn with_api_key(api_key: String) -> Self {
        Self::new(UrlParam::new(BasicClient::new(), "key", api_key))
    }
}

impl<C: HttpClient> GoogleDirectionsClient<C> {
    pub fn new(http: C) -> Self {
        Self {
            http,
            base_url: DIRECTIONS_URL.to_string(),
        }
    }

    /// Points the client at a different Directions endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Builds the request URL. Departures not in the future are sent as
    /// `now`, which the API requires for live traffic.
    fn request_url(&self, request: &TravelTimeRequest, now: DateTime<Utc>) -> Result<reqwest::Url> {
        let departure = if request.departure <= now {
            "now".to_string()
        } else {
            request.departure.timestamp().to_string()
        };

        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("origin", request.origin.as_str()),
                ("destination", request.destination.as_str()),
                ("departure_time", departure.as_str()),
                ("traffic_model", request.traffic_model.as_str()),
                ("mode", "driving"),
            ],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl<C: HttpClient> DirectionsApi for GoogleDirectionsClient<C> {
    async fn travel_time(&self, request: &TravelTimeRequest) -> Result<TravelTime> {
        let url = self.request_url(request, Utc::now())?;
        debug!(
            origin = %request.origin,
            destination = %request.destination,
            traffic_model = %request.traffic_model,
            "Requesting directions"
        );

        let bytes = fetch_bytes(&self.http, url.as_str())
            .await
            .context("directions request failed")?;
        parse_directions(&bytes)
    }
}

/// Extracts the first leg's durations from a Directions API response body.
pub(crate) fn parse_directions(bytes: &[u8]) -> Result<TravelTime> {
    let response: DirectionsResponse =
        serde_json::from_slice(bytes).context("failed to parse directions response")?;

    if response.status != "OK" {
        return Err(anyhow!(
            "directions API returned status {}: {}",
            response.status,
            response.error_message.unwrap_or_default()
        ));
    }

    let leg = response
        .routes
        .first()
        .and_then(|r| r.legs.first())
        .ok_or_else(|| anyhow!("directions response has no route legs"))?;

    let duration_seconds = leg.duration.value;
    let duration_in_traffic_seconds = leg
        .duration_in_traffic
        .as_ref()
        .map_or(duration_seconds, |d| d.value);

    Ok(TravelTime {
        duration_seconds,
        duration_in_traffic_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrafficModel;
    use chrono::{TimeDelta, TimeZone};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single HTTP request with `body` and returns the request line.
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..read]).to_string();
            head.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{addr}/maps/api/directions/json"), handle)
    }

    fn request(departure: DateTime<Utc>) -> TravelTimeRequest {
        TravelTimeRequest {
            origin: "1 Main St, Springfield".to_string(),
            destination: "Office Park".to_string(),
            departure,
            traffic_model: TrafficModel::Pessimistic,
        }
    }

    #[test]
    fn test_parse_ok_response() {
        let body = br#"{
            "status": "OK",
            "routes": [{"legs": [{
                "duration": {"value": 1500, "text": "25 mins"},
                "duration_in_traffic": {"value": 1980, "text": "33 mins"}
            }]}]
        }"#;

        let t = parse_directions(body).unwrap();
        assert_eq!(t.duration_seconds, 1500);
        assert_eq!(t.duration_in_traffic_seconds, 1980);
    }

    #[test]
    fn test_parse_falls_back_to_duration() {
        let body = br#"{"status": "OK", "routes": [{"legs": [{"duration": {"value": 900}}]}]}"#;
        let t = parse_directions(body).unwrap();
        assert_eq!(t.duration_in_traffic_seconds, 900);
    }

    #[test]
    fn test_parse_error_status() {
        let body = br#"{"status": "REQUEST_DENIED", "error_message": "bad key", "routes": []}"#;
        let err = parse_directions(body).unwrap_err();
        assert!(err.to_string().contains("REQUEST_DENIED"));
    }

    #[test]
    fn test_parse_no_legs() {
        let body = br#"{"status": "OK", "routes": []}"#;
        assert!(parse_directions(body).is_err());
    }

    #[test]
    fn test_request_url_future_departure() {
        let client = GoogleDirectionsClient::new(BasicClient::new());
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 15, 0, 0).unwrap();
        let departure = now + TimeDelta::hours(2);

        let url = client.request_url(&request(departure), now).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("departure_time".to_string(), departure.timestamp().to_string())));
        assert!(pairs.contains(&("traffic_model".to_string(), "pessimistic".to_string())));
        assert!(pairs.contains(&("origin".to_string(), "1 Main St, Springfield".to_string())));
    }

    #[test]
    fn test_request_url_past_departure_uses_now() {
        let client = GoogleDirectionsClient::new(BasicClient::new());
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 15, 0, 0).unwrap();

        let url = client.request_url(&request(now), now).unwrap();
        assert!(url.as_str().contains("departure_time=now"));
    }

    #[tokio::test]
    async fn test_travel_time_against_custom_endpoint() {
        let (url, server) = serve_once(
            r#"{"status": "OK", "routes": [{"legs": [{
                "duration": {"value": 1200},
                "duration_in_traffic": {"value": 1620}
            }]}]}"#,
        )
        .await;
        let client = GoogleDirectionsClient::new(UrlParam::new(
            BasicClient::new(),
            "key",
            "test-key".to_string(),
        ))
        .with_base_url(&url);

        let t = client
            .travel_time(&request(Utc::now() + TimeDelta::hours(1)))
            .await
            .unwrap();
        assert_eq!(t.duration_seconds, 1200);
        assert_eq!(t.duration_in_traffic_seconds, 1620);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /maps/api/directions/json?"));
        assert!(request_line.contains("key=test-key"));
        assert!(request_line.contains("traffic_model=pessimistic"));
    }
}
