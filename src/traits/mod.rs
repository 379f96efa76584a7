pub mod interfaces;
pub mod store;

pub use interfaces::{
    FixedUniform, KeyValueStore, ManualClock, SeededUniform, SystemClock, ThreadRngSource,
    TimeProvider, UniformSource, ValueSource,
};
pub use store::{FnSource, MemoryStore};
