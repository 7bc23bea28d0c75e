//! Представление: маршруты, вид комнаты, панель управления.
//! Чистые функции поверх снимка сессии.

pub mod control_bar;
pub mod room_view;
pub mod route;

pub use control_bar::{control_bar, dispatch, Action, Button, Outcome};
pub use room_view::{render, Overlay, RoomView, Tile};
pub use route::{invite_link, Route};
