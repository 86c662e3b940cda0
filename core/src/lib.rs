mod channel;
mod device;
mod identity;
mod location;
mod reading;
mod window;

pub use channel::*;
pub use device::*;
pub use identity::*;
pub use location::*;
pub use reading::*;
pub use window::*;

pub static CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provider tag stored on every device indexed from the flower power cloud
pub static PROVIDER: &str = "parrot";
