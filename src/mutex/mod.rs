mod distributed;

pub use distributed::DistributedMutex;
pub use distributed::LockError;
