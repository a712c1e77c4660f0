pub mod receiver;

pub use receiver::Receiver;
