//! SMS alerts through the Twilio Messages API.

use crate::config::TwilioConfig;
use base64::Engine;
use std::time::Duration;
use warden_core::{Notifier, NotifyError};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioNotifier {
    agent: ureq::Agent,
    url: String,
    authorization: String,
    from: String,
    to: String,
}

impl TwilioNotifier {
    /// Every request (connect, send and read) is bounded by `timeout`.
    pub fn new(config: &TwilioConfig, timeout: Duration) -> Self {
        Self::with_api_base(config, timeout, TWILIO_API_BASE)
    }

    fn with_api_base(config: &TwilioConfig, timeout: Duration, api_base: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let credentials = format!("{}:{}", config.account_sid, config.auth_token);
        Self {
            agent,
            url: format!("{api_base}/Accounts/{}/Messages.json", config.account_sid),
            authorization: format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(credentials)
            ),
            from: config.from_number.clone(),
            to: config.to_number.clone(),
        }
    }
}

impl Notifier for TwilioNotifier {
    fn send(&self, message: &str) -> Result<String, NotifyError> {
        let response = self
            .agent
            .post(&self.url)
            .set("Authorization", &self.authorization)
            .send_form(&[("To", self.to.as_str()), ("From", self.from.as_str()), ("Body", message)]);

        match response {
            Ok(resp) => {
                let reply: serde_json::Value = resp
                    .into_json()
                    .map_err(|e| NotifyError::MalformedReply(e.to_string()))?;
                reply
                    .get("sid")
                    .and_then(|sid| sid.as_str())
                    .map(str::to_owned)
                    .ok_or_else(|| NotifyError::MalformedReply(format!("no message sid in {reply}")))
            }
            Err(ureq::Error::Status(status, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                Err(NotifyError::Rejected {
                    status,
                    detail: rejection_detail(&text),
                })
            }
            Err(err) => Err(NotifyError::Transport(err.to_string())),
        }
    }
}

/// Twilio error bodies carry a human-readable `message`; fall back to the raw body.
fn rejection_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread::JoinHandle;
    use tiny_http::{Header, Response, Server};

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_number: "+15550001111".into(),
            to_number: "+15552223333".into(),
        }
    }

    #[derive(Debug)]
    struct Received {
        method: String,
        url: String,
        authorization: Option<String>,
        body: String,
    }

    /// Answers one request with a canned JSON reply and hands back what it received.
    fn serve_once(status: u16, reply: &'static str) -> (String, JoinHandle<Received>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let base = format!("http://{addr}");

        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_string());
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            let received = Received {
                method: request.method().to_string(),
                url: request.url().to_string(),
                authorization,
                body,
            };

            let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(reply)
                .with_status_code(status)
                .with_header(content_type);
            request.respond(response).unwrap();
            received
        });

        (base, handle)
    }

    #[test]
    fn test_send_posts_form_and_returns_sid() {
        let (base, server) = serve_once(201, r#"{"sid":"SM42","status":"queued"}"#);
        let notifier = TwilioNotifier::with_api_base(&config(), Duration::from_secs(5), &base);

        assert_eq!(notifier.send("Alert: test").unwrap(), "SM42");

        let request = server.join().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "/Accounts/AC123/Messages.json");
        // base64("AC123:secret")
        assert_eq!(request.authorization.as_deref(), Some("Basic QUMxMjM6c2VjcmV0"));
        assert!(request.body.contains("To=%2B15552223333"));
        assert!(request.body.contains("From=%2B15550001111"));
        assert!(request.body.contains("Body=Alert%3A+test") || request.body.contains("Body=Alert%3A%20test"));
    }

    #[test]
    fn test_rejection_carries_status_and_message() {
        let (base, server) = serve_once(401, r#"{"code":20003,"message":"Authenticate","status":401}"#);
        let notifier = TwilioNotifier::with_api_base(&config(), Duration::from_secs(5), &base);

        match notifier.send("hi") {
            Err(NotifyError::Rejected { status, detail }) => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Authenticate");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_reply_without_sid_is_malformed() {
        let (base, server) = serve_once(201, r#"{"status":"queued"}"#);
        let notifier = TwilioNotifier::with_api_base(&config(), Duration::from_secs(5), &base);
        assert!(matches!(notifier.send("hi"), Err(NotifyError::MalformedReply(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let base = format!("http://{}", server.server_addr().to_ip().unwrap());
        drop(server);

        let notifier = TwilioNotifier::with_api_base(&config(), Duration::from_secs(2), &base);
        assert!(matches!(notifier.send("hi"), Err(NotifyError::Transport(_))));
    }

    #[test]
    fn test_rejection_detail_falls_back_to_body() {
        assert_eq!(rejection_detail("  gateway down \n"), "gateway down");
    }
}
