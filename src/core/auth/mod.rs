//! Authentication against distributor identity servers and the game server.
//!
//! Every login ends the same way: a channel uid and access token are traded
//! for a player uid and u8 token, which are traded for a session secret.
//! Each request to the game server then carries `secret`, `seqnum` and `uid`.
//!
//! [`Auth`] holds one private session. [`GuestAuth`] holds many guest
//! sessions and is limited to public data.

pub mod bilibili;
pub mod guest;
pub mod hypergryph;
pub mod session;
pub mod sign;
pub mod single;
pub mod yostar;

pub use bilibili::{BilibiliAuth, BilibiliCipher};
pub use guest::{GuestAuth, GuestCache};
pub use hypergryph::HypergryphAuth;
pub use session::{AuthSession, ChannelCredentials, DeviceIds, SharedSession};
pub use sign::generate_u8_sign;
pub use single::Auth;
pub use yostar::YostarAuth;
