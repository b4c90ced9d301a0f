//! Backend-independent logic: expiry policy, content inspection and the
//! expiry sweeper.

pub mod expiry;
pub mod inspect;
pub mod sweeper;
