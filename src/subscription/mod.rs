// Feed subscription management

mod registry;

pub use registry::{Subscription, SubscriptionRegistry};

#[cfg(test)]
mod tests;
