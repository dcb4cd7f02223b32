// ABOUTME: Seal for the runtime capability traits.
// ABOUTME: BollardRuntime and the test fake are the only implementors.

pub trait Sealed {}
