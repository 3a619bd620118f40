//! Posted speed limit lookups keyed by coordinates.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

pub const HERE_REVGEOCODE_URL: &str = "https://revgeocode.search.hereapi.com/v1/revgeocode";
const SEARCH_RADIUS_METRES: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("speed limit service request failed: {0}")]
    Transport(String),
    #[error("speed limit service returned status {0}")]
    Status(u16),
    #[error("speed limit service response could not be decoded: {0}")]
    Decode(String),
}

/// Resolves the lowest posted limit (km/h) near a point. `Ok(None)` means the
/// service has no limit data for the location.
pub trait SpeedLimitLookup: Debug + Send + Sync {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<Option<u32>, LookupError>;
}

/// HERE reverse geocoding client requesting navigation speed limit attributes.
pub struct HereSpeedLimitClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HereSpeedLimitClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LookupError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

impl Debug for HereSpeedLimitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HereSpeedLimitClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SpeedLimitLookup for HereSpeedLimitClient {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<Option<u32>, LookupError> {
        debug!(latitude, longitude, "requesting posted speed limit");

        let at = format!("{latitude},{longitude},{SEARCH_RADIUS_METRES}");
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("at", at.as_str()),
                ("maxResults", "1"),
                ("apiKey", self.api_key.as_str()),
                ("showNavAttributes", "speedLimits"),
                ("types", "street"),
            ])
            .send()
            .map_err(|err| LookupError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let body: RevGeocodeResponse = response
            .json()
            .map_err(|err| LookupError::Decode(err.to_string()))?;
        Ok(body.lowest_speed_limit())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RevGeocodeResponse {
    #[serde(default)]
    items: Vec<RevGeocodeItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevGeocodeItem {
    #[serde(default)]
    navigation_attributes: Option<NavigationAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavigationAttributes {
    #[serde(default)]
    speed_limits: Vec<SpeedLimitAttribute>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeedLimitAttribute {
    max_speed: Option<u32>,
}

impl RevGeocodeResponse {
    fn lowest_speed_limit(&self) -> Option<u32> {
        self.items
            .first()?
            .navigation_attributes
            .as_ref()?
            .speed_limits
            .iter()
            .filter_map(|limit| limit.max_speed)
            .min()
    }
}

/// Returns the same limit everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpeedLimit(pub u32);

impl SpeedLimitLookup for FixedSpeedLimit {
    fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Option<u32>, LookupError> {
        Ok(Some(self.0))
    }
}

/// In-memory limits keyed by coordinates rounded to five decimals.
#[derive(Debug, Default, Clone)]
pub struct StaticSpeedLimits {
    limits: HashMap<(i64, i64), u32>,
}

impl StaticSpeedLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, latitude: f64, longitude: f64, limit: u32) -> Self {
        self.limits.insert(coordinate_key(latitude, longitude), limit);
        self
    }
}

impl SpeedLimitLookup for StaticSpeedLimits {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<Option<u32>, LookupError> {
        Ok(self
            .limits
            .get(&coordinate_key(latitude, longitude))
            .copied())
    }
}

fn coordinate_key(latitude: f64, longitude: f64) -> (i64, i64) {
    (
        (latitude * 100_000.0).round() as i64,
        (longitude * 100_000.0).round() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    #[test]
    fn lowest_limit_is_selected_from_first_item() {
        let body: RevGeocodeResponse = serde_json::from_str(
            r#"{
                "items": [
                    {
                        "title": "Main Road",
                        "navigationAttributes": {
                            "speedLimits": [
                                { "maxSpeed": 80, "direction": "N" },
                                { "maxSpeed": 60, "direction": "S" },
                                { "direction": "E" }
                            ]
                        }
                    },
                    { "navigationAttributes": { "speedLimits": [ { "maxSpeed": 40 } ] } }
                ]
            }"#,
        )
        .expect("response decodes");
        assert_eq!(body.lowest_speed_limit(), Some(60));
    }

    #[test]
    fn missing_attributes_mean_no_limit() {
        let empty: RevGeocodeResponse =
            serde_json::from_str(r#"{ "items": [] }"#).expect("decodes");
        assert_eq!(empty.lowest_speed_limit(), None);

        let no_nav: RevGeocodeResponse =
            serde_json::from_str(r#"{ "items": [ { "title": "Dirt Road" } ] }"#).expect("decodes");
        assert_eq!(no_nav.lowest_speed_limit(), None);

        let no_max: RevGeocodeResponse = serde_json::from_str(
            r#"{ "items": [ { "navigationAttributes": { "speedLimits": [ {} ] } } ] }"#,
        )
        .expect("decodes");
        assert_eq!(no_max.lowest_speed_limit(), None);
    }

    #[test]
    fn static_limits_match_rounded_coordinates() {
        let limits = StaticSpeedLimits::new().with_limit(-26.20411, 28.04731, 80);
        assert_eq!(limits.lookup(-26.204110001, 28.04731).expect("lookup"), Some(80));
        assert_eq!(limits.lookup(-26.3, 28.0).expect("lookup"), None);
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        let client = HereSpeedLimitClient::new(
            "key",
            "http://127.0.0.1:9/v1/revgeocode",
            Duration::from_millis(200),
        )
        .expect("client builds");
        let error = client.lookup(-26.2, 28.0).expect_err("expected failure");
        assert!(matches!(error, LookupError::Transport(_)));
    }

    /// Answers a single request with `status` and `body`, returning the
    /// request line it received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().expect("stub address");

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept request");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("read request line");
            loop {
                let mut header = String::new();
                let read = reader.read_line(&mut header).expect("read header");
                if read == 0 || header == "\r\n" {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            request_line
        });

        (format!("http://{addr}/v1/revgeocode"), handle)
    }

    fn client_for(base_url: String) -> HereSpeedLimitClient {
        HereSpeedLimitClient::new("secret", base_url, Duration::from_secs(5))
            .expect("client builds")
    }

    #[test]
    fn lookup_sends_reverse_geocoding_query() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"items": [{"navigationAttributes": {
                "speedLimits": [{"maxSpeed": 80}, {"maxSpeed": 60}]
            }}]}"#,
        );

        let limit = client_for(base_url).lookup(-26.2, 28.05).expect("lookup succeeds");
        assert_eq!(limit, Some(60));

        let request_line = server.join().expect("stub server finishes");
        assert!(request_line.starts_with("GET /v1/revgeocode?"));
        for param in [
            "at=-26.2%2C28.05%2C50",
            "maxResults=1",
            "types=street",
            "showNavAttributes=speedLimits",
            "apiKey=secret",
        ] {
            assert!(request_line.contains(param), "{param} missing from {request_line}");
        }
    }

    #[test]
    fn lookup_reports_error_statuses() {
        let (base_url, server) = serve_once("503 Service Unavailable", "");

        let error = client_for(base_url).lookup(-26.2, 28.05).expect_err("expected failure");
        assert!(matches!(error, LookupError::Status(503)));
        server.join().expect("stub server finishes");
    }

    #[test]
    fn lookup_reports_undecodable_bodies() {
        let (base_url, server) = serve_once("200 OK", "<html>maintenance</html>");

        let error = client_for(base_url).lookup(-26.2, 28.05).expect_err("expected failure");
        assert!(matches!(error, LookupError::Decode(_)));
        server.join().expect("stub server finishes");
    }
}
