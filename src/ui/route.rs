use crate::utils::new_room_id;
use serde::Serialize;

/// Экраны клиента: лендинг и комната
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "room", rename_all = "lowercase")]
pub enum Route {
    Landing,
    Room(String),
}

impl Route {
    /// Parses a full URL or a bare hash. Unknown paths go to the landing page.
    pub fn parse(url: &str) -> Route {
        let hash = match url.find('#') {
            Some(pos) => &url[pos + 1..],
            None => url,
        };
        let path = hash.trim_start_matches('/');
        match path.split_once('/') {
            Some(("room", id)) => {
                let id = id.trim_end_matches('/');
                if id.is_empty() || id.contains('/') {
                    Route::Landing
                } else {
                    Route::Room(id.to_string())
                }
            }
            _ => Route::Landing,
        }
    }

    /// «Start New Meeting»: новая комната со случайным id
    pub fn new_room() -> Route {
        Route::Room(new_room_id())
    }

    pub fn room_id(&self) -> Option<&str> {
        match self {
            Route::Room(id) => Some(id),
            Route::Landing => None,
        }
    }

    pub fn to_hash(&self) -> String {
        match self {
            Route::Landing => "#/".to_string(),
            Route::Room(id) => format!("#/room/{id}"),
        }
    }
}

/// Ссылка, которой делятся со вторым участником
pub fn invite_link(base_url: &str, room: &str) -> String {
    let base = match base_url.find('#') {
        Some(pos) => &base_url[..pos],
        None => base_url,
    };
    format!("{}{}", base, Route::Room(room.to_string()).to_hash())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_urls_round_trip_through_the_hash() {
        let link = invite_link("https://meet.example/#/", "room-123");
        assert_eq!(link, "https://meet.example/#/room/room-123");
        assert_eq!(Route::parse(&link), Route::Room("room-123".into()));
    }

    #[test]
    fn unknown_or_empty_paths_redirect_to_landing() {
        assert_eq!(Route::parse("https://meet.example/"), Route::Landing);
        assert_eq!(Route::parse("#/room/"), Route::Landing);
        assert_eq!(Route::parse("#/settings"), Route::Landing);
        assert_eq!(Route::parse("#/room/a/b"), Route::Landing);
    }

    #[test]
    fn new_rooms_are_unique() {
        let a = Route::new_room();
        let b = Route::new_room();
        assert_ne!(a, b);
        assert_eq!(a.room_id().map(str::len), Some(36));
    }
}
