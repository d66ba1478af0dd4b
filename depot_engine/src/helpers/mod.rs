mod economy;

pub use economy::{keys, EconomyTuning};
