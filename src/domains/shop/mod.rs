pub mod models;
pub mod repository;
pub mod service;

pub use models::{Shop, ShopError, ShopUpdate};
pub use repository::{InMemoryShopRepository, PgShopRepository, ShopRepository};
pub use service::ShopService;
