use std::path::PathBuf;
use std::time::Duration;

/// Same-person pairs of unit-length ArcFace embeddings usually sit between
/// 0.7 and 1.1 apart.
const STRICT_TOLERANCE_BELOW: f32 = 0.7;

/// Twilio credentials and the alert recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enrollment images, one sub-directory per person (default: known_faces).
    pub known_faces_dir: PathBuf,
    /// Where evidence recordings are written (default: unknown_videos).
    pub output_dir: PathBuf,
    /// Maximum embedding distance for a match.
    pub tolerance: f32,
    /// Faces narrower than this many pixels are ignored.
    pub min_size: u32,
    /// Minimum interval between successful alerts.
    pub alert_cooldown: Duration,
    /// How long recording continues after the last unknown face.
    pub record_buffer: Duration,
    /// Frame rate written into evidence files.
    pub record_fps: f64,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Annotated frames are published here when set.
    pub snapshot_path: Option<PathBuf>,
    /// TTF font for overlay labels.
    pub font_path: Option<PathBuf>,
    /// Upper bound on one alert HTTP exchange.
    pub alert_timeout: Duration,
    /// `None` leaves alerting unconfigured.
    pub twilio: Option<TwilioConfig>,
}

impl Config {
    /// Load configuration from `WARDEN_*` and `TWILIO_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = var("WARDEN_MODEL_DIR").map(PathBuf::from).unwrap_or_else(|| {
            var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                    PathBuf::from(home).join(".local/share")
                })
                .join("warden/models")
        });

        Self {
            known_faces_dir: var("WARDEN_KNOWN_FACES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("known_faces")),
            output_dir: var("WARDEN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("unknown_videos")),
            tolerance: positive_or(&var, "WARDEN_TOLERANCE", warden_core::matcher::DEFAULT_TOLERANCE),
            min_size: parse_or(&var, "WARDEN_MIN_SIZE", warden_core::matcher::DEFAULT_MIN_SIZE),
            alert_cooldown: secs_or(&var, "WARDEN_SMS_COOLDOWN_SECS", warden_core::throttle::DEFAULT_ALERT_COOLDOWN),
            record_buffer: secs_or(&var, "WARDEN_RECORD_BUFFER_SECS", warden_core::recording::DEFAULT_RECORD_BUFFER),
            record_fps: positive_or(&var, "WARDEN_RECORD_FPS", warden_core::recording::DEFAULT_RECORD_FPS),
            camera_device: var("WARDEN_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            camera_width: parse_or(&var, "WARDEN_CAMERA_WIDTH", 640),
            camera_height: parse_or(&var, "WARDEN_CAMERA_HEIGHT", 480),
            model_dir,
            snapshot_path: var("WARDEN_SNAPSHOT_PATH").map(PathBuf::from),
            font_path: var("WARDEN_FONT_PATH").map(PathBuf::from),
            alert_timeout: secs_or(&var, "WARDEN_ALERT_TIMEOUT_SECS", Duration::from_secs(10)),
            twilio: twilio_from_lookup(&var),
        }
    }

    /// Whether the tolerance is below the distance typical of two photos of
    /// one person under unit-length ArcFace embeddings.
    pub fn tolerance_is_strict(&self) -> bool {
        self.tolerance < STRICT_TOLERANCE_BELOW
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(warden_core::SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join(warden_core::ARCFACE_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn twilio_from_lookup(var: &impl Fn(&str) -> Option<String>) -> Option<TwilioConfig> {
    let keys = [
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_FROM_NUMBER",
        "WARDEN_ALERT_RECIPIENT",
    ];
    let values: Vec<Option<String>> = keys.iter().map(|k| var(k).filter(|v| !v.is_empty())).collect();

    match values.as_slice() {
        [Some(sid), Some(token), Some(from), Some(to)] => Some(TwilioConfig {
            account_sid: sid.clone(),
            auth_token: token.clone(),
            from_number: from.clone(),
            to_number: to.clone(),
        }),
        _ => {
            let missing: Vec<&str> = keys
                .iter()
                .zip(&values)
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| *k)
                .collect();
            if missing.len() < keys.len() {
                tracing::warn!(?missing, "Twilio settings incomplete; alerts disabled");
            }
            None
        }
    }
}

fn parse_or<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Like [`parse_or`], but only finite values above zero are accepted.
fn positive_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Into<f64> + Copy,
{
    match var(key).and_then(|v| v.parse::<T>().ok()) {
        Some(value) => {
            let v: f64 = value.into();
            if v.is_finite() && v > 0.0 {
                value
            } else {
                let fallback: f64 = default.into();
                tracing::warn!(key, value = v, default = fallback, "must be a positive number; using default");
                default
            }
        }
        None => default,
    }
}

fn secs_or(var: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_or(var, key, default.as_secs()))
}
