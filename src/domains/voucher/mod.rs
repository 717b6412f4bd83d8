pub mod admission;
pub mod models;
pub mod order_processor;
pub mod repository;
pub mod service;

pub use admission::AdmissionController;
pub use models::{
    OrderIntent, PersistOutcome, PublishSeckillVoucher, SeckillError, SeckillVoucher, VoucherOrder,
};
pub use order_processor::{order_channel, OrderProcessor, OrderQueue, OrderReceiver, ProcessOutcome};
pub use repository::{InMemoryVoucherRepository, PgVoucherRepository, VoucherRepository};
pub use service::SeckillService;
