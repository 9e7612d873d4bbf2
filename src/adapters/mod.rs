// Adapters layer: concrete implementations for external systems (storage, sheet codec, notification channels).

pub mod channel;
pub mod sheet_codec;
pub mod storage;
