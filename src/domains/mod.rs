// Domain modules: each owns its models, repository seam and service.
pub mod shop;
pub mod voucher;
