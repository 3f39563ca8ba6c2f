// Poll planning: which chats are due, and how they are spread over
// anonymity buckets before the relay sees a request.

pub mod planner;
pub mod subscription;

pub use planner::PollPlanner;
pub use subscription::{partition, partition_with, Subscription};
