//! Connection-config document and quick-connect link.
//!
//! The produced formats are the voice client's native ones: an XML host
//! entry (the downloadable config file) and a `tt://` URI with the same
//! fields percent-encoded. Both must round-trip: parsing what we produce
//! reconstructs the identical connection tuple.

use crate::error::ArtifactError;

/// Static server-side connection facts, from configuration.
#[derive(Debug, Clone)]
pub struct ServerProfile {
    /// Display name shown in the client's server list.
    pub server_name: String,
    /// Host the bot itself connects to.
    pub host: String,
    /// Hostname handed out to end users, when it differs from `host`.
    pub public_host: Option<String>,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub encrypted: bool,
}

impl ServerProfile {
    /// The hostname end users should connect to.
    pub fn effective_host(&self) -> &str {
        self.public_host.as_deref().unwrap_or(&self.host)
    }
}

/// One user's complete connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub server_name: String,
    pub host: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub encrypted: bool,
    pub username: String,
    pub password: String,
    pub nickname: String,
}

impl ConnectionProfile {
    pub fn new(server: &ServerProfile, username: &str, password: &str, nickname: &str) -> Self {
        Self {
            server_name: server.server_name.clone(),
            host: server.effective_host().to_string(),
            tcp_port: server.tcp_port,
            udp_port: server.udp_port,
            encrypted: server.encrypted,
            username: username.to_string(),
            password: password.to_string(),
            nickname: nickname.to_string(),
        }
    }

    /// Render the downloadable connection file.
    pub fn render_document(&self) -> String {
        let encrypted = if self.encrypted { "true" } else { "false" };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE teamtalk>
<teamtalk version="5.0">
 <host>
  <name>{name}</name>
  <address>{address}</address>
  <tcpport>{tcpport}</tcpport>
  <udpport>{udpport}</udpport>
  <encrypted>{encrypted}</encrypted>
  <trusted-certificate>
   <certificate-authority-pem></certificate-authority-pem>
   <client-certificate-pem></client-certificate-pem>
   <client-private-key-pem></client-private-key-pem>
   <verify-peer>false</verify-peer>
  </trusted-certificate>
  <auth>
   <username>{username}</username>
   <password>{password}</password>
   <nickname>{nickname}</nickname>
  </auth>
 </host>
</teamtalk>"#,
            name = xml_escape(&self.server_name),
            address = xml_escape(&self.host),
            tcpport = self.tcp_port,
            udpport = self.udp_port,
            encrypted = encrypted,
            username = xml_escape(&self.username),
            password = xml_escape(&self.password),
            nickname = xml_escape(&self.nickname),
        )
    }

    /// Parse a connection file produced by [`render_document`].
    ///
    /// [`render_document`]: ConnectionProfile::render_document
    pub fn parse_document(document: &str) -> Result<Self, ArtifactError> {
        let field = |tag: &str| -> Result<String, ArtifactError> {
            extract_tag(document, tag)
                .map(|raw| xml_unescape(&raw))
                .ok_or_else(|| ArtifactError::Parse(format!("missing <{tag}> element")))
        };
        let port = |tag: &str| -> Result<u16, ArtifactError> {
            field(tag)?
                .parse()
                .map_err(|_| ArtifactError::Parse(format!("invalid <{tag}> value")))
        };

        Ok(Self {
            server_name: field("name")?,
            host: field("address")?,
            tcp_port: port("tcpport")?,
            udp_port: port("udpport")?,
            encrypted: field("encrypted")? == "true",
            username: field("username")?,
            password: field("password")?,
            nickname: field("nickname")?,
        })
    }

    /// Render the single-line quick-connect link.
    pub fn quick_connect_link(&self) -> String {
        let encrypted = if self.encrypted { "1" } else { "0" };
        format!(
            "tt://{host}?tcpport={tcpport}&udpport={udpport}&encrypted={encrypted}&username={username}&password={password}&nickname={nickname}&channel=/&chanpasswd=",
            host = self.host,
            tcpport = self.tcp_port,
            udpport = self.udp_port,
            encrypted = encrypted,
            username = urlencoding::encode(&self.username),
            password = urlencoding::encode(&self.password),
            nickname = urlencoding::encode(&self.nickname),
        )
    }

    /// Parse a link produced by [`quick_connect_link`].
    ///
    /// The link carries no display name, so `server_name` comes back equal
    /// to the host.
    ///
    /// [`quick_connect_link`]: ConnectionProfile::quick_connect_link
    pub fn parse_quick_connect(link: &str) -> Result<Self, ArtifactError> {
        let rest = link
            .strip_prefix("tt://")
            .ok_or_else(|| ArtifactError::Parse("missing tt:// scheme".into()))?;
        let (host, query) = rest
            .split_once('?')
            .ok_or_else(|| ArtifactError::Parse("missing query string".into()))?;

        let mut tcp_port = None;
        let mut udp_port = None;
        let mut encrypted = false;
        let mut username = String::new();
        let mut password = String::new();
        let mut nickname = String::new();

        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(value)
                .map_err(|_| ArtifactError::Parse(format!("bad encoding in '{key}'")))?
                .into_owned();
            match key {
                "tcpport" => tcp_port = value.parse().ok(),
                "udpport" => udp_port = value.parse().ok(),
                "encrypted" => encrypted = value == "1",
                "username" => username = value,
                "password" => password = value,
                "nickname" => nickname = value,
                _ => {}
            }
        }

        Ok(Self {
            server_name: host.to_string(),
            host: host.to_string(),
            tcp_port: tcp_port.ok_or_else(|| ArtifactError::Parse("missing tcpport".into()))?,
            udp_port: udp_port.ok_or_else(|| ArtifactError::Parse("missing udpport".into()))?,
            encrypted,
            username,
            password,
            nickname,
        })
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

fn extract_tag(document: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = document.find(&open)? + open.len();
    let end = document[start..].find(&close)? + start;
    Some(document[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionProfile {
        ConnectionProfile {
            server_name: "Voice & Friends".into(),
            host: "voice.example.org".into(),
            tcp_port: 10333,
            udp_port: 10333,
            encrypted: true,
            username: "alice<3".into(),
            password: "p@ss word&\"quotes\"".into(),
            nickname: "Alice A.".into(),
        }
    }

    #[test]
    fn test_document_round_trip() {
        let profile = sample();
        let document = profile.render_document();
        let parsed = ConnectionProfile::parse_document(&document).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_quick_connect_round_trip() {
        let profile = sample();
        let link = profile.quick_connect_link();
        let parsed = ConnectionProfile::parse_quick_connect(&link).unwrap();

        assert_eq!(parsed.host, profile.host);
        assert_eq!(parsed.tcp_port, profile.tcp_port);
        assert_eq!(parsed.udp_port, profile.udp_port);
        assert_eq!(parsed.encrypted, profile.encrypted);
        assert_eq!(parsed.username, profile.username);
        assert_eq!(parsed.password, profile.password);
        assert_eq!(parsed.nickname, profile.nickname);
    }

    #[test]
    fn test_unencrypted_flag_round_trips() {
        let mut profile = sample();
        profile.encrypted = false;

        let document = profile.render_document();
        assert!(document.contains("<encrypted>false</encrypted>"));
        assert!(!ConnectionProfile::parse_document(&document).unwrap().encrypted);

        let link = profile.quick_connect_link();
        assert!(link.contains("encrypted=0"));
        assert!(!ConnectionProfile::parse_quick_connect(&link).unwrap().encrypted);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ConnectionProfile::parse_document("<teamtalk></teamtalk>").is_err());
        assert!(ConnectionProfile::parse_quick_connect("http://example.org").is_err());
        assert!(ConnectionProfile::parse_quick_connect("tt://host-without-query").is_err());
    }

    #[test]
    fn test_effective_host_prefers_public_hostname() {
        let server = ServerProfile {
            server_name: "Test".into(),
            host: "10.0.0.5".into(),
            public_host: Some("voice.example.org".into()),
            tcp_port: 10333,
            udp_port: 10333,
            encrypted: false,
        };
        assert_eq!(server.effective_host(), "voice.example.org");

        let bare = ServerProfile {
            public_host: None,
            ..server
        };
        assert_eq!(bare.effective_host(), "10.0.0.5");
    }
}
