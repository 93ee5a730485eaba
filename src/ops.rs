pub mod delegate;
pub mod fold;
pub mod inspect;
pub mod last_value;
pub mod log;
pub mod map;
pub mod publish_on;
pub mod subscribe_on;
pub mod take;

pub use delegate::{Delegate, DelegateSubscriber, Forward, Link};
pub use fold::FoldOp;
pub use inspect::InspectOp;
pub use last_value::LastValue;
pub use log::LogOp;
pub use map::{MapOp, TryMapOp};
pub use publish_on::PublishOnOp;
pub use subscribe_on::SubscribeOnOp;
pub use take::TakeOp;

/// Type of [`PublisherExt::sum`](crate::publisher::PublisherExt::sum).
pub type SumOp<Source, Item> = FoldOp<Source, Item, fn(Item, Item) -> Item>;
