//! Thin REST client for the amplifier's IP-control surface. Talks JSON over
//! `hyper`, to an already-resolved `(address, port, base_path)` target.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(2500);

#[derive(Debug)]
pub enum AmplifierError {
    /// Connectivity failure: refused connection, DNS, timeout, etc.
    Transport(String),
    /// The amplifier answered but the payload/status was not what we expected.
    Protocol(String),
}

impl std::fmt::Display for AmplifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmplifierError::Transport(msg) => write!(f, "amplifier transport error: {msg}"),
            AmplifierError::Protocol(msg) => write!(f, "amplifier protocol error: {msg}"),
        }
    }
}

impl std::error::Error for AmplifierError {}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmplifierClient: Sync + Send {
    async fn get_volume(&self) -> Result<u8, AmplifierError>;
    async fn set_volume(&self, volume: u8) -> Result<(), AmplifierError>;
    async fn volume_up(&self) -> Result<(), AmplifierError>;
    async fn volume_down(&self) -> Result<(), AmplifierError>;
    async fn get_muted(&self) -> Result<bool, AmplifierError>;
    async fn mute_toggle(&self) -> Result<(), AmplifierError>;
    async fn get_systems(&self) -> Result<serde_json::Value, AmplifierError>;
}

pub struct Target {
    pub address: String,
    pub port: u16,
    pub base_path: String,
}

/// REST client for the amplifier's `{base}/systems/current/...` surface.
pub struct HttpAmplifierClient {
    authority: String,
    base_path: String,
}

impl HttpAmplifierClient {
    pub fn new(target: &Target) -> HttpAmplifierClient {
        HttpAmplifierClient {
            authority: format!("{}:{}", target.address, target.port),
            base_path: target.base_path.clone(),
        }
    }

    fn uri(&self, path: &str) -> hyper::Uri {
        hyper::Uri::builder()
            .scheme("http")
            .authority(self.authority.as_str())
            .path_and_query(format!("{}{}", self.base_path, path))
            .build()
            .expect("amplifier base path and target authority build a valid uri")
    }

    async fn get(&self, path: &str) -> Result<(hyper::StatusCode, Vec<u8>), AmplifierError> {
        let request = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(self.uri(path))
            .body(hyper::body::Body::empty())
            .unwrap();
        self.exec(request, path).await
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), AmplifierError> {
        let request = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(self.uri(path))
            .header("content-type", "application/json")
            .body(hyper::body::Body::from(body.to_string()))
            .unwrap();
        self.exec(request, path).await?;
        Ok(())
    }

    async fn exec(
        &self,
        request: hyper::Request<hyper::body::Body>,
        path: &str,
    ) -> Result<(hyper::StatusCode, Vec<u8>), AmplifierError> {
        let fut = hyper::Client::new().request(request);
        let mut response = tokio::time::timeout(DEFAULT_TIMEOUT, fut)
            .await
            .map_err(|_| Self::error("timed out calling", path, "deadline exceeded"))?
            .map_err(|err| Self::error("transport error calling", path, err))?;

        let status = response.status();
        let bytes = hyper::body::to_bytes(response.body_mut())
            .await
            .map_err(|err| Self::error("could not read response body from", path, err))?
            .to_vec();
        Ok((status, bytes))
    }

    fn error<T: std::fmt::Display>(msg: &str, path: &str, err: T) -> AmplifierError {
        let text = format!("{msg} '{path}': [{err}]");
        log::debug!("{text}");
        AmplifierError::Transport(text)
    }

    fn protocol_error<T: std::fmt::Display>(msg: &str, path: &str, err: T) -> AmplifierError {
        let text = format!("{msg} '{path}': [{err}]");
        log::debug!("{text}");
        AmplifierError::Protocol(text)
    }
}

#[derive(Debug, Deserialize)]
struct VolumeBody {
    volume: u8,
}

#[derive(Debug, Deserialize)]
struct GroupSourceBody {
    #[serde(rename = "muteState")]
    mute_state: Option<String>,
}

#[async_trait]
impl AmplifierClient for HttpAmplifierClient {
    async fn get_volume(&self) -> Result<u8, AmplifierError> {
        let path = "/systems/current/sources/current/soundControl/volume";
        let (_, bytes) = self.get(path).await?;
        let body: VolumeBody = serde_json::from_slice(&bytes)
            .map_err(|e| Self::protocol_error("missing volume key in", path, e))?;
        Ok(body.volume)
    }

    async fn set_volume(&self, volume: u8) -> Result<(), AmplifierError> {
        let path = "/systems/current/sources/current/soundControl/volume";
        self.post(path, json!({ "volume": volume.min(100) })).await
    }

    async fn volume_up(&self) -> Result<(), AmplifierError> {
        self.post(
            "/systems/current/sources/current/soundControl/volumeUp",
            json!({}),
        )
        .await
    }

    async fn volume_down(&self) -> Result<(), AmplifierError> {
        self.post(
            "/systems/current/sources/current/soundControl/volumeDown",
            json!({}),
        )
        .await
    }

    async fn get_muted(&self) -> Result<bool, AmplifierError> {
        let path = "/groups/current/sources/current";
        let (_, bytes) = self.get(path).await?;
        let body: GroupSourceBody = serde_json::from_slice(&bytes)
            .map_err(|e| Self::protocol_error("unexpected payload shape from", path, e))?;
        Ok(body
            .mute_state
            .map(|s| s.eq_ignore_ascii_case("muted"))
            .unwrap_or(false))
    }

    async fn mute_toggle(&self) -> Result<(), AmplifierError> {
        let path = if self.get_muted().await? {
            "/groups/current/sources/current/playback/unmute"
        } else {
            "/groups/current/sources/current/playback/mute"
        };
        self.post(path, json!({})).await
    }

    async fn get_systems(&self) -> Result<serde_json::Value, AmplifierError> {
        let (status, bytes) = self.get("/systems").await?;
        let (status, bytes) = if status == hyper::StatusCode::NOT_FOUND {
            self.get("/systems/current").await?
        } else {
            (status, bytes)
        };
        if !status.is_success() {
            return Err(Self::protocol_error(
                "unexpected status from",
                "/systems",
                status,
            ));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| Self::protocol_error("invalid json from", "/systems", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn client(mock_server: &wiremock::MockServer) -> HttpAmplifierClient {
        let uri: hyper::Uri = mock_server.uri().parse().unwrap();
        HttpAmplifierClient::new(&Target {
            address: uri.host().unwrap().to_string(),
            port: uri.port_u16().unwrap_or(80),
            base_path: String::from("/ipcontrol/v1"),
        })
    }

    #[test(tokio::test)]
    async fn it_gets_volume() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(
                "/ipcontrol/v1/systems/current/sources/current/soundControl/volume",
            ))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(json!({ "volume": 42 })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        assert_eq!(42, client(&mock_server).get_volume().await.unwrap());
    }

    #[test(tokio::test)]
    async fn it_fails_protocol_on_missing_volume_key() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(
                "/ipcontrol/v1/systems/current/sources/current/soundControl/volume",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client(&mock_server).get_volume().await,
            Err(AmplifierError::Protocol(_))
        ));
    }

    #[test(tokio::test)]
    async fn it_sets_volume_clamped() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/ipcontrol/v1/systems/current/sources/current/soundControl/volume",
            ))
            .and(wiremock::matchers::body_json(json!({ "volume": 100 })))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server).set_volume(250).await.unwrap();
    }

    #[test(tokio::test)]
    async fn it_reads_muted_case_insensitively() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(
                "/ipcontrol/v1/groups/current/sources/current",
            ))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({ "muteState": "Muted" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(client(&mock_server).get_muted().await.unwrap());
    }

    #[test(tokio::test)]
    async fn mute_toggle_unmutes_when_currently_muted() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(
                "/ipcontrol/v1/groups/current/sources/current",
            ))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({ "muteState": "muted" })),
            )
            .mount(&mock_server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/ipcontrol/v1/groups/current/sources/current/playback/unmute",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server).mute_toggle().await.unwrap();
    }

    #[test(tokio::test)]
    async fn get_systems_falls_back_on_404() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/ipcontrol/v1/systems"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/ipcontrol/v1/systems/current"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(json!({ "id": "current" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let systems = client(&mock_server).get_systems().await.unwrap();
        assert_eq!(systems["id"], "current");
    }
}
