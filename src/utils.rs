use crate::config::ServerConfig;
use rand::Rng;

/// Случайный hex-идентификатор из `bytes` байт
pub fn random_id(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill(&mut buf[..]);
    hex::encode(buf)
}

/// Идентификатор новой комнаты (UUID v4)
pub fn new_room_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// Добавляет схему протокола к URL ICE сервера, если она отсутствует
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:") || config.url.starts_with("stun:") {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_have_expected_length_and_differ() {
        let a = random_id(16);
        let b = random_id(16);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn scheme_is_added_by_server_type() {
        let mut cfg = ServerConfig {
            id: "x".into(),
            r#type: "turn".into(),
            url: "relay.example:3478".into(),
            username: Some("u".into()),
            credential: Some("p".into()),
        };
        assert_eq!(add_ice_url_scheme(&cfg), "turn:relay.example:3478");

        cfg.url = "stun:stun.example:19302".into();
        assert_eq!(add_ice_url_scheme(&cfg), "stun:stun.example:19302");
    }
}
