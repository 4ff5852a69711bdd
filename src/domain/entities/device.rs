use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Longitud máxima de `device_id` (columna `VARCHAR(255)`)
pub const MAX_DEVICE_ID_LENGTH: usize = 255;

/// Datos del dispositivo que presenta las credenciales
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl DeviceInfo {
    pub fn new(
        device_id: Option<String>,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            device_id: device_id.map(|id| truncate_chars(id, MAX_DEVICE_ID_LENGTH)),
            user_agent,
            ip_address: ip_address.as_deref().and_then(normalize_ip),
        }
    }

    /// Huella estable del dispositivo: SHA-256 (hex) de sus tres atributos.
    ///
    /// Missing attributes hash as `"unknown"` so two anonymous clients share
    /// a fingerprint.
    pub fn fingerprint(&self) -> String {
        let payload = json!({
            "deviceId": self.device_id.as_deref().unwrap_or("unknown"),
            "userAgent": self.user_agent.as_deref().unwrap_or("unknown"),
            "ipAddress": self.ip_address.as_deref().unwrap_or("unknown"),
        });

        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn classify(&self) -> DeviceClassification {
        self.user_agent
            .as_deref()
            .map(DeviceClassification::from_user_agent)
            .unwrap_or_default()
    }
}

/// Client-supplied addresses are kept only when they parse; an `ip:port` pair keeps the ip
fn normalize_ip(raw: &str) -> Option<String> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .or_else(|_| raw.parse::<SocketAddr>().map(|addr| addr.ip()))
        .ok()
        .map(|ip| ip.to_string())
}

fn truncate_chars(value: String, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Bot => "bot",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "desktop" => DeviceType::Desktop,
            "mobile" => DeviceType::Mobile,
            "tablet" => DeviceType::Tablet,
            "bot" => DeviceType::Bot,
            _ => DeviceType::Unknown,
        })
    }
}

/// Clasificación aproximada a partir del User-Agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClassification {
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub os: Option<String>,
}

impl DeviceClassification {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();

        let device_type = if ["bot", "crawler", "spider", "curl/", "wget/"]
            .iter()
            .any(|marker| ua.contains(marker))
        {
            DeviceType::Bot
        } else if ua.contains("ipad")
            || ua.contains("tablet")
            || (ua.contains("android") && !ua.contains("mobile"))
        {
            DeviceType::Tablet
        } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
            DeviceType::Mobile
        } else if ua.contains("windows")
            || ua.contains("macintosh")
            || ua.contains("x11")
            || ua.contains("linux")
        {
            DeviceType::Desktop
        } else {
            DeviceType::Unknown
        };

        // Edge and Opera also advertise Chrome, and Chrome advertises Safari
        let browser = if ua.contains("edg/") {
            Some("Edge")
        } else if ua.contains("opr/") || ua.contains("opera") {
            Some("Opera")
        } else if ua.contains("firefox/") {
            Some("Firefox")
        } else if ua.contains("chrome/") || ua.contains("crios/") {
            Some("Chrome")
        } else if ua.contains("safari/") {
            Some("Safari")
        } else {
            None
        };

        let os = if ua.contains("windows") {
            Some("Windows")
        } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ios") {
            Some("iOS")
        } else if ua.contains("android") {
            Some("Android")
        } else if ua.contains("mac os x") || ua.contains("macintosh") {
            Some("macOS")
        } else if ua.contains("linux") {
            Some("Linux")
        } else {
            None
        };

        Self {
            device_type,
            browser: browser.map(str::to_string),
            os: os.map(str::to_string),
        }
    }
}
