// Small building blocks shared by the higher-level primitives

mod flag;
mod signal;
mod synchronized;

pub use flag::{DoneFlag, Flag};
pub use signal::{OneTimeFutureValue, OneTimeSignal, PanicPayload};
pub use synchronized::{SynchronizedValue, Updater};
